//! Error types for session storage
//!
//! Storage failures are never swallowed: every variant here crosses the
//! pipeline boundary and reaches the caller.

use dossier_model::SessionId;
use std::path::PathBuf;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No session stored under this id
    #[error("session not found: {0}")]
    NotFound(SessionId),

    /// Filesystem failure
    #[error("io error on {path}: {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Record could not be encoded or decoded
    #[error("serialization error for session {id}: {source}")]
    Serialization {
        /// Session key
        id: String,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// Record refused by the store (non-terminal, broken references, id mismatch)
    #[error("invalid session record: {0}")]
    InvalidRecord(String),

    /// Blocking task was cancelled or panicked
    #[error("storage task failed: {0}")]
    Task(String),
}

impl StoreError {
    /// Create IO error for path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error means "no such session"
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_classification() {
        let err = StoreError::NotFound(SessionId::new());
        assert!(err.is_not_found());
        assert!(err.to_string().contains("session not found"));

        let io = StoreError::io("/tmp/x", std::io::Error::other("disk full"));
        assert!(!io.is_not_found());
        assert!(io.to_string().contains("disk full"));
    }
}
