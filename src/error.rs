use thiserror::Error;

/// Engine-level error kinds (propagation-level, per the error handling design).
///
/// Node-local failures (spawn_failed, nonzero_exit, timeout, cancelled) are
/// never raised through this type — they are recorded on `NodeResult`
/// instead. Only failures that abort the whole call land here.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Maps an engine-level error to the process exit code documented in
    /// the external interfaces section.
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::InvalidInput(_) => 4,
            EngineError::IndexUnavailable(_) => 2,
            EngineError::Internal(_) => 2,
        }
    }
}
