//! Error types for the datasource layer.

use thiserror::Error;

/// Result type alias for datasource operations
pub type DaoResult<T> = Result<T, DaoError>;

/// Error type for connector and datasource operations
#[derive(Debug, Clone, Error)]
pub enum DaoError {
    /// The backing store reported a failure
    #[error("Backend error: {0}")]
    Backend(String),
    /// The connector does not implement the requested feature
    #[error("{0}")]
    Unsupported(String),
    /// Record (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for DaoError {
    fn from(err: serde_json::Error) -> Self {
        DaoError::Serialization(err.to_string())
    }
}

// Connector implementations are free to carry `anyhow` errors internally.
impl From<anyhow::Error> for DaoError {
    fn from(err: anyhow::Error) -> Self {
        DaoError::Backend(err.to_string())
    }
}
