//! In-memory session store
//!
//! Same contract as the file store without durability. Used by tests and
//! by callers that embed the pipeline for a single process lifetime.

use crate::error::StoreError;
use crate::store::{sort_newest_first, validate_record, SessionStore};
use async_trait::async_trait;
use dashmap::DashMap;
use dossier_model::{Session, SessionId, SessionSummary};

/// `DashMap`-backed store
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: DashMap<SessionId, Session>,
}

impl MemorySessionStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the store is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(&self, session: &Session) -> Result<(), StoreError> {
        validate_record(session)?;
        self.sessions.insert(session.id, session.clone());
        tracing::debug!(session_id = %session.id, "session stored in memory");
        Ok(())
    }

    async fn get(&self, id: &SessionId) -> Result<Session, StoreError> {
        self.sessions
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound(*id))
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, StoreError> {
        let mut summaries: Vec<SessionSummary> =
            self.sessions.iter().map(|entry| entry.value().summary()).collect();
        sort_newest_first(&mut summaries);
        Ok(summaries)
    }
}
