//! Dossier Core - research pipeline
//!
//! Turns a topic into a cited research report in four stages:
//! - Plan: decompose the topic into 4-6 bounded sub-questions
//! - Scout: search, extract, clean and rank sources per sub-question
//! - Analyze: synthesize evidence-backed findings and correlate sources
//! - Write: produce a Markdown + JSON report with validated citations
//!
//! Every stage has a fallback, so a run always ends with a stored session
//! whose status says how complete it is. Search engines, scrapers and
//! language models plug in through the traits in [`capability`].
//!
//! # Example
//!
//! ```rust,ignore
//! use dossier_core::prelude::*;
//! use dossier_store::FileSessionStore;
//!
//! # async fn example(capabilities: Capabilities) -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(FileSessionStore::open("./sessions").await?);
//! let pipeline = PipelineOrchestrator::new(capabilities, store, PipelineConfig::new())?;
//!
//! let session = pipeline.run("renewable energy storage", Expertise::Intermediate).await?;
//! println!("{:?}: {} sources, {} findings", session.status, session.sources.len(), session.findings.len());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod capability;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod relevance;
pub mod report;
pub mod stages;
pub mod telemetry;

pub use capability::{
    Capabilities, ContentExtractor, DraftReport, Extraction, FindingSynthesizer, QueryGenerator,
    ReportWriter, SearchBackend, SearchHit, WriteRequest,
};
pub use config::{DepthProfile, PipelineConfig};
pub use error::{CapabilityError, CoreError, StageError};
pub use orchestrator::{PipelineOrchestrator, CANCELLED_REASON};
pub use report::ReportStats;
pub use stages::{StageExecutor, StageOutcome};
pub use telemetry::LogFormat;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running the pipeline
    pub use crate::{
        Capabilities, CapabilityError, CoreError, DraftReport, Extraction, PipelineConfig,
        PipelineOrchestrator, SearchHit, WriteRequest,
    };
    pub use dossier_model::{Expertise, Session, SessionStatus};
    pub use std::sync::Arc;
    pub use tokio_util::sync::CancellationToken;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
