//! Session store contract

use crate::error::StoreError;
use async_trait::async_trait;
use dossier_model::{Session, SessionId, SessionSummary};

/// Durable keyed storage for sessions
///
/// Implementations must guarantee:
/// - `put` is an idempotent overwrite keyed by `session.id`
/// - once `put` returns `Ok`, the session survives process restart
///   (for durable backends) and every later `get` observes it
/// - concurrent `put`s for the same id never lose an update; different
///   ids never contend
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store (or overwrite) a terminal session
    async fn put(&self, session: &Session) -> Result<(), StoreError>;

    /// Fetch a session by id
    async fn get(&self, id: &SessionId) -> Result<Session, StoreError>;

    /// List lightweight summaries, newest first
    async fn list(&self) -> Result<Vec<SessionSummary>, StoreError>;
}

/// Reject records the store must never hold
///
/// # Errors
/// `StoreError::InvalidRecord` for non-terminal sessions or broken references.
pub fn validate_record(session: &Session) -> Result<(), StoreError> {
    if !session.status.is_terminal() {
        return Err(StoreError::InvalidRecord(format!(
            "session {} is still {:?}",
            session.id, session.status
        )));
    }

    session
        .check_integrity()
        .map_err(|e| StoreError::InvalidRecord(format!("session {}: {e}", session.id)))
}

/// Sort summaries newest first, ties by id
pub(crate) fn sort_newest_first(summaries: &mut [SessionSummary]) {
    summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}
