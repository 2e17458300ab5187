//! File-backed session store
//!
//! One JSON document per session under a root directory. Writes go through
//! a temp file in the same directory which is fsynced and then renamed over
//! the target, so readers only ever see a complete record.

use crate::error::StoreError;
use crate::store::{sort_newest_first, validate_record, SessionStore};
use async_trait::async_trait;
use dashmap::DashMap;
use dossier_model::{Session, SessionId, SessionSummary};
use moka::future::Cache;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

const RECORD_EXTENSION: &str = "json";

/// Durable store writing one file per session
#[derive(Debug)]
pub struct FileSessionStore {
    /// Directory holding `<id>.json` records
    root: PathBuf,
    /// Per-id write locks
    locks: DashMap<SessionId, Arc<Mutex<()>>>,
    /// Read cache, refreshed on every successful write
    cache: Cache<SessionId, Arc<Session>>,
}

impl FileSessionStore {
    /// Default number of cached sessions
    pub const DEFAULT_CACHE_CAPACITY: u64 = 256;

    /// Open (and create if needed) a store rooted at `root`
    ///
    /// # Errors
    /// `StoreError::Io` if the directory cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::with_cache_capacity(root, Self::DEFAULT_CACHE_CAPACITY).await
    }

    /// Open with a custom cache capacity
    ///
    /// # Errors
    /// `StoreError::Io` if the directory cannot be created.
    pub async fn with_cache_capacity(
        root: impl Into<PathBuf>,
        capacity: u64,
    ) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::io(&root, e))?;

        tracing::debug!(root = %root.display(), "opened file session store");

        Ok(Self {
            root,
            locks: DashMap::new(),
            cache: Cache::new(capacity),
        })
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the record for `id`
    #[must_use]
    pub fn record_path(&self, id: &SessionId) -> PathBuf {
        self.root.join(format!("{id}.{RECORD_EXTENSION}"))
    }

    fn lock_for(&self, id: SessionId) -> Arc<Mutex<()>> {
        self.locks.entry(id).or_default().clone()
    }

    /// Drop the map entry for `id` once no task holds its lock
    fn release(&self, id: &SessionId, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.locks.remove_if(id, |_, l| Arc::strong_count(l) == 1);
    }

    /// Number of live per-id locks
    #[must_use]
    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    async fn read_record(&self, id: &SessionId) -> Result<Session, StoreError> {
        let path = self.record_path(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(*id));
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        let session: Session =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Serialization {
                id: id.to_string(),
                source,
            })?;

        if session.id != *id {
            return Err(StoreError::InvalidRecord(format!(
                "{} holds session {}",
                path.display(),
                session.id
            )));
        }

        Ok(session)
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn put(&self, session: &Session) -> Result<(), StoreError> {
        validate_record(session)?;

        let bytes =
            serde_json::to_vec_pretty(session).map_err(|source| StoreError::Serialization {
                id: session.id.to_string(),
                source,
            })?;

        let lock = self.lock_for(session.id);
        let written = {
            let _guard = lock.lock().await;

            let root = self.root.clone();
            let target = self.record_path(&session.id);
            let written = tokio::task::spawn_blocking(move || write_atomic(&root, &target, &bytes))
                .await
                .map_err(|e| StoreError::Task(e.to_string()))
                .and_then(|result| result);

            if written.is_ok() {
                self.cache
                    .insert(session.id, Arc::new(session.clone()))
                    .await;
            }
            written
        };
        self.release(&session.id, lock);
        written?;

        tracing::info!(session_id = %session.id, status = ?session.status, "session stored");
        Ok(())
    }

    async fn get(&self, id: &SessionId) -> Result<Session, StoreError> {
        if let Some(cached) = self.cache.get(id).await {
            return Ok(cached.as_ref().clone());
        }

        // Read and fill under the write lock so a stale read never
        // overwrites a newer cached put
        let lock = self.lock_for(*id);
        let loaded = {
            let _guard = lock.lock().await;
            match self.cache.get(id).await {
                Some(cached) => Ok(cached.as_ref().clone()),
                None => {
                    let read = self.read_record(id).await;
                    if let Ok(session) = &read {
                        self.cache.insert(*id, Arc::new(session.clone())).await;
                    }
                    read
                }
            }
        };
        self.release(id, lock);
        loaded
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, StoreError> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| StoreError::io(&self.root, e))?;

        let mut summaries = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.root, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<SessionId>().ok())
            else {
                continue;
            };

            match self.get(&id).await {
                Ok(session) => summaries.push(session.summary()),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable session record");
                }
            }
        }

        sort_newest_first(&mut summaries);
        Ok(summaries)
    }
}

/// Write `bytes` to `target` via temp file + fsync + rename
fn write_atomic(dir: &Path, target: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    tmp.write_all(bytes)
        .map_err(|e| StoreError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| StoreError::io(tmp.path(), e))?;
    tmp.persist(target)
        .map_err(|e| StoreError::io(target, e.error))?;

    #[cfg(unix)]
    {
        std::fs::File::open(dir)
            .and_then(|d| d.sync_all())
            .map_err(|e| StoreError::io(dir, e))?;
    }

    Ok(())
}
