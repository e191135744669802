//! Error types for Roots & Routes

use thiserror::Error;

/// Core error type for warehouse operations
#[derive(Error, Debug)]
pub enum RootsError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl RootsError {
    /// Whether the error means the underlying session is gone and a new
    /// connection is required.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            RootsError::Connection(_) | RootsError::Io(_) | RootsError::Timeout(_)
        )
    }
}

/// Result type alias for warehouse operations
pub type Result<T> = std::result::Result<T, RootsError>;
