//! Error types for the search application boundary
//!
//! The vector engine reports [`VectorError`]; callers behind the
//! [`VectorIndex`](crate::ports::VectorIndex) port only ever see
//! [`SearchError`], which carries stable status codes and recovery hints.

use std::path::PathBuf;

use thiserror::Error;

use crate::vector::{ErrorKind, VectorError};

/// Main error type for search operations
#[derive(Error, Debug)]
pub enum SearchError {
    /// Caller supplied a bad argument
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// The index has been closed
    #[error("Vector index is not available: {reason}")]
    Unavailable { reason: String },

    /// File system errors
    #[error("Storage operation failed at '{path}': {source}")]
    Storage {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Persisted data could not be decoded
    #[error("Index appears to be corrupted at '{path}': {reason}")]
    Corrupted { path: PathBuf, reason: String },

    /// Configuration errors
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    /// Everything the caller cannot act on directly
    #[error("{0}")]
    Internal(String),
}

impl SearchError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::Unavailable { .. } => "INDEX_UNAVAILABLE",
            Self::Storage { .. } => "STORAGE_ERROR",
            Self::Corrupted { .. } => "INDEX_CORRUPTED",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
        .to_string()
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::InvalidInput { .. } => vec![
                "Check that the embedding dimension matches the configured index",
                "Request at least one result",
            ],
            Self::Unavailable { .. } => {
                vec!["Reopen the vector index before issuing further requests"]
            }
            Self::Storage { .. } => vec![
                "Check disk space and permissions in the index directory",
                "Ensure the index directory exists and is not on a read-only mount",
            ],
            Self::Corrupted { .. } => vec![
                "Delete the index directory and re-index your sources",
                "Check for disk errors or filesystem corruption",
            ],
            Self::Config { .. } => vec!["Run 'sercha-vector config' to inspect the effective settings"],
            Self::Internal(_) => vec![],
        }
    }
}

impl From<VectorError> for SearchError {
    fn from(error: VectorError) -> Self {
        match (error.kind(), error) {
            (_, VectorError::Io { path, source }) => Self::Storage { path, source },
            (_, VectorError::MissingFile { path }) => Self::Storage {
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
                path,
            },
            (_, VectorError::Corrupted { path, reason }) => Self::Corrupted { path, reason },
            (ErrorKind::Validation, error) => Self::InvalidInput {
                reason: error.to_string(),
            },
            (ErrorKind::Closed, error) => Self::Unavailable {
                reason: error.to_string(),
            },
            (ErrorKind::Corruption, error) => Self::Corrupted {
                path: PathBuf::new(),
                reason: error.to_string(),
            },
            (ErrorKind::Io | ErrorKind::Internal, error) => Self::Internal(error.to_string()),
        }
    }
}

/// Result type alias for search operations
pub type SearchResult<T> = Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_errors_map_to_search_errors() {
        let mismatch: SearchError = VectorError::DimensionMismatch {
            expected: 4,
            actual: 3,
        }
        .into();
        assert_eq!(mismatch.status_code(), "INVALID_INPUT");

        let closed: SearchError = VectorError::Closed.into();
        assert!(matches!(closed, SearchError::Unavailable { .. }));

        let missing: SearchError = VectorError::MissingFile {
            path: PathBuf::from("/tmp/idx/id_mapping.bin"),
        }
        .into();
        assert_eq!(missing.status_code(), "STORAGE_ERROR");

        let corrupted: SearchError = VectorError::corrupted("index.bin", "bad magic").into();
        match corrupted {
            SearchError::Corrupted { path, reason } => {
                assert_eq!(path, PathBuf::from("index.bin"));
                assert_eq!(reason, "bad magic");
            }
            other => panic!("Expected Corrupted, got {other:?}"),
        }
    }

    #[test]
    fn test_recovery_suggestions() {
        let error = SearchError::Corrupted {
            path: PathBuf::from("x"),
            reason: "truncated".to_string(),
        };
        assert!(!error.recovery_suggestions().is_empty());
        assert!(SearchError::Internal("x".into()).recovery_suggestions().is_empty());
    }
}
