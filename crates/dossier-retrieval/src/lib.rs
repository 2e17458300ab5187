//! Dossier follow-up retrieval
//!
//! Answers questions about a completed research session from its stored
//! report, falling back to its findings, without re-running any research.
//!
//! # Scoring
//!
//! - Report split into heading sections (pulldown-cmark)
//! - Question tokenized, stop-words dropped, synonyms expanded
//! - Score = query-term density × heading-match multiplier
//! - Ties keep document order; scoring is pure and deterministic
//!
//! # Example
//!
//! ```rust,ignore
//! use dossier_retrieval::RetrievalEngine;
//!
//! let engine = RetrievalEngine::new(store);
//! let answer = engine.answer(&session_id, "what are the risks?").await?;
//! println!("{} ({:?}, {:.2})", answer.text, answer.source, answer.confidence);
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod engine;
pub mod error;
pub mod scoring;
pub mod sections;
pub mod terms;

pub use config::RetrievalConfig;
pub use engine::{answer_from_session, FollowupRecord, RetrievalEngine};
pub use error::RetrievalError;
pub use sections::{split_sections, Section};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
