use roots_core::RootsError;
use thiserror::Error;

/// Errors surfaced by the connection manager and the catalog helpers
#[derive(Error, Debug)]
pub enum ManagerError {
    /// Every connection attempt failed. Pages render this as "no data".
    #[error("warehouse unavailable after {attempts} attempt(s): {last_error}")]
    ConnectionUnavailable { attempts: u32, last_error: String },

    /// The statement failed on a fresh connection after one reconnect
    #[error("statement failed after reconnect: {statement}")]
    QueryFailed {
        statement: String,
        #[source]
        source: RootsError,
    },

    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),
}

impl ManagerError {
    /// True when no connection could be obtained at all
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ManagerError::ConnectionUnavailable { .. })
    }
}

pub type Result<T, E = ManagerError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_unavailable_display() {
        let err = ManagerError::ConnectionUnavailable {
            attempts: 3,
            last_error: "login timeout".into(),
        };
        assert!(err.is_unavailable());
        assert_eq!(
            err.to_string(),
            "warehouse unavailable after 3 attempt(s): login timeout"
        );
    }

    #[test]
    fn test_query_failed_keeps_source() {
        let err = ManagerError::QueryFailed {
            statement: "SELECT * FROM visits".into(),
            source: RootsError::Query("object does not exist".into()),
        };
        assert!(!err.is_unavailable());
        let source = err.source().map(|s| s.to_string());
        assert_eq!(
            source.as_deref(),
            Some("Query error: object does not exist")
        );
    }
}
