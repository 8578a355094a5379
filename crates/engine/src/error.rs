use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that abort a run before any action is attempted
#[derive(Error, Debug)]
pub enum EngineError {
    /// Artifact index could not be built
    #[error("Index error: {0}")]
    Indexer(#[from] reconcile_indexer::IndexerError),

    /// Configuration file could not be read or is invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Project layout is unusable
    #[error("Invalid project path: {0}")]
    InvalidPath(String),
}

impl EngineError {
    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
