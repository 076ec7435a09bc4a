//! Error types for query execution and result caching
//!
//! Every failure names the stage it came from (remote execution, cache read,
//! cache write) so the CLI can report which step went wrong.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for trinoq operations
#[derive(Error, Debug)]
pub enum TrinoqError {
    /// The engine accepted the request but the query itself failed
    #[error("Query failed: {message}{}", .name.as_deref().map(|n| format!(" ({n})")).unwrap_or_default())]
    Execution {
        message: String,
        name: Option<String>,
    },

    /// Network or HTTP-level failure talking to the coordinator
    #[error("Connection error: {0}")]
    Connection(String),

    /// Credentials were rejected
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The coordinator answered with something we could not interpret
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No cache entry at the expected path
    #[error("Cache entry not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A cache file exists but is not a readable table
    #[error("Corrupt cache entry {}: {reason}", .path.display())]
    CorruptEntry { path: PathBuf, reason: String },

    /// The cache entry could not be persisted
    #[error("Failed to write cache entry {}: {reason}", .path.display())]
    WriteFailure { path: PathBuf, reason: String },

    /// Arrow-level failure while building or combining tables
    #[error("Table error: {0}")]
    Table(#[from] arrow_schema::ArrowError),

    /// Reqwest transport error (wrapper)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Filesystem error outside of entry reads and writes
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for trinoq operations
pub type Result<T> = std::result::Result<T, TrinoqError>;

impl TrinoqError {
    /// Shorthand for an execution failure without an engine error name
    pub fn execution(message: impl Into<String>) -> Self {
        TrinoqError::Execution {
            message: message.into(),
            name: None,
        }
    }

    /// True for failures that originate in the local result cache
    pub fn is_cache_error(&self) -> bool {
        matches!(
            self,
            TrinoqError::NotFound(_)
                | TrinoqError::CorruptEntry { .. }
                | TrinoqError::WriteFailure { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = TrinoqError::Connection("Failed to connect".to_string());
        assert_eq!(error.to_string(), "Connection error: Failed to connect");

        let error = TrinoqError::Execution {
            message: "line 1:8: Column 'x' cannot be resolved".to_string(),
            name: Some("COLUMN_NOT_FOUND".to_string()),
        };
        assert_eq!(
            error.to_string(),
            "Query failed: line 1:8: Column 'x' cannot be resolved (COLUMN_NOT_FOUND)"
        );

        let error = TrinoqError::execution("boom");
        assert_eq!(error.to_string(), "Query failed: boom");

        let corrupt = TrinoqError::CorruptEntry {
            path: PathBuf::from("/tmp/druidq/abc.parquet"),
            reason: "bad magic".to_string(),
        };
        assert!(corrupt.to_string().contains("/tmp/druidq/abc.parquet"));
        assert!(corrupt.to_string().contains("bad magic"));
    }

    #[test]
    fn test_cache_error_classification() {
        assert!(TrinoqError::NotFound(PathBuf::from("x")).is_cache_error());
        assert!(TrinoqError::WriteFailure {
            path: PathBuf::from("x"),
            reason: "disk full".to_string(),
        }
        .is_cache_error());
        assert!(!TrinoqError::execution("boom").is_cache_error());
        assert!(!TrinoqError::Config("bad".to_string()).is_cache_error());
    }
}
