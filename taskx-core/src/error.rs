//! Error types for taskx.

use thiserror::Error;

/// Errors that can occur in taskx operations.
#[derive(Error, Debug)]
pub enum TaskxError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Google Calendar not connected")]
    IntegrationNotConnected,

    #[error("Authentication expired: {0}")]
    AuthExpired(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TaskxError {
    /// Whether the caller has to run the calendar connect flow again.
    pub fn needs_integration(&self) -> bool {
        matches!(
            self,
            TaskxError::IntegrationNotConnected | TaskxError::AuthExpired(_)
        )
    }
}

impl From<serde_json::Error> for TaskxError {
    fn from(err: serde_json::Error) -> Self {
        TaskxError::Serialization(err.to_string())
    }
}

/// Result type alias for taskx operations.
pub type TaskxResult<T> = Result<T, TaskxError>;
