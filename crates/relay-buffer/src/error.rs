/// Alias for `Result<T, BufferError>`.
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors raised when building or exchanging buffers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// A buffer must hold at least one record.
    #[error("buffer capacity must be at least one record")]
    ZeroCapacity,

    /// Slot indices are stored as `i32` in the collision words.
    #[error("buffer capacity {0} does not fit in a collision slot index")]
    CapacityTooLarge(usize),

    /// The buffer does not match the configured capacity.
    #[error("buffer holds {actual} records, expected {expected}")]
    CapacityMismatch {
        /// Records the worker was configured for.
        expected: usize,
        /// Records the buffer actually holds.
        actual: usize,
    },

    /// Raw words do not split into whole records.
    #[error("{words} words is not a whole number of {stride}-word records")]
    RaggedRecords {
        /// Number of words received.
        words: usize,
        /// Words per record.
        stride: usize,
    },
}
