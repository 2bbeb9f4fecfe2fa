use crate::engine::BodyHandle;

/// Alias for `Result<T, EngineError>`.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by an engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// The world config cannot be simulated.
    #[error("invalid world config: {0}")]
    InvalidConfig(String),

    /// The handle does not name a live body.
    #[error("no body with handle {0:?}")]
    UnknownBody(BodyHandle),

    /// The engine has released its resources.
    #[error("engine is torn down")]
    TornDown,
}
