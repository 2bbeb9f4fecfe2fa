use relay_buffer::BufferError;
use relay_core::{BodyId, BodyType, CoreError, ShapeKind};
use relay_engine::EngineError;

/// Alias for `Result<T, WorkerError>`.
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors raised by the worker and its host handle.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// Every slot is bound.
    #[error("body capacity of {0} reached")]
    CapacityExceeded(usize),

    /// No live body has this id.
    #[error("unknown body: {0}")]
    UnknownIdentifier(BodyId),

    /// A live body already has this id.
    #[error("body already exists: {0}")]
    DuplicateIdentifier(BodyId),

    /// A message other than INIT arrived before INIT.
    #[error("world is not initialized")]
    UninitializedWorld,

    /// The host still holds the buffer.
    #[error("buffer is held by the consumer")]
    BufferUnavailable,

    /// The shape kind cannot be attached to this kind of body.
    #[error("{kind} shapes are not supported on {body_type} bodies")]
    UnsupportedShape {
        /// Requested shape kind.
        kind: ShapeKind,
        /// Type of the receiving body.
        body_type: BodyType,
    },

    /// Host-supplied options failed validation.
    #[error("invalid options: {0}")]
    Validation(#[from] CoreError),

    /// The worker config is unusable.
    #[error("invalid config: {0}")]
    Config(String),

    /// The engine refused to start or to take a body.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// The host's buffer does not fit the config.
    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),

    /// INIT did not complete; carries the reason the worker reported.
    #[error("worker failed to start: {0}")]
    InitFailed(String),

    /// The worker thread could not be started.
    #[error("could not spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The other end of the control channel is gone.
    #[error("control channel disconnected")]
    Disconnected,
}
