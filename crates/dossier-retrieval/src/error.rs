//! Retrieval errors

use dossier_store::StoreError;
use thiserror::Error;

/// Follow-up retrieval failure
///
/// A question that matches nothing is not an error; it yields a
/// zero-confidence [`Answer`](dossier_model::Answer).
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// No session with this id (includes ids that do not parse)
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// The store failed while loading the session
    #[error("store error: {0}")]
    Store(#[source] StoreError),
}

impl RetrievalError {
    /// Map a store error, folding `NotFound` into `SessionNotFound`
    #[must_use]
    pub fn from_store(session_id: &str, err: StoreError) -> Self {
        if err.is_not_found() {
            Self::SessionNotFound(session_id.to_string())
        } else {
            Self::Store(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_model::SessionId;

    #[test]
    fn not_found_folds_into_session_not_found() {
        let err = RetrievalError::from_store("abc", StoreError::NotFound(SessionId::new()));
        assert!(matches!(err, RetrievalError::SessionNotFound(ref id) if id == "abc"));
    }

    #[test]
    fn other_store_errors_are_kept() {
        let err = RetrievalError::from_store("abc", StoreError::InvalidRecord("bad".into()));
        assert!(matches!(err, RetrievalError::Store(StoreError::InvalidRecord(_))));
    }
}
