use thiserror::Error;

/// Top-level error type for the dv-core crate and dependents.
#[derive(Debug, Error)]
pub enum DvError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// One operand of a comparison exceeds the configured unit bound.
    #[error("input too large: {units} units exceeds limit of {limit}")]
    InputTooLarge { units: usize, limit: usize },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, DvError>;
