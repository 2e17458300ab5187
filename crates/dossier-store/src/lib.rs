//! Dossier session store
//!
//! Durable keyed storage for research sessions. The store is the single
//! source of truth for follow-up retrieval.
//!
//! # Backends
//!
//! - [`FileSessionStore`]: one JSON record per session, atomic
//!   temp-file-and-rename writes, per-id write locks, `moka` read cache
//! - [`MemorySessionStore`]: `DashMap`-backed, no durability
//!
//! # Example
//!
//! ```rust,ignore
//! use dossier_store::{FileSessionStore, SessionStore};
//!
//! # async fn example(session: dossier_model::Session) -> Result<(), dossier_store::StoreError> {
//! let store = FileSessionStore::open("./sessions").await?;
//! store.put(&session).await?;
//! let loaded = store.get(&session.id).await?;
//! assert_eq!(loaded, session);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod error;
pub mod export;
pub mod file;
pub mod memory;
pub mod store;

pub use error::StoreError;
pub use export::{export_report, ExportedReport};
pub use file::FileSessionStore;
pub use memory::MemorySessionStore;
pub use store::{validate_record, SessionStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
