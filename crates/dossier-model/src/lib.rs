//! Dossier data model
//!
//! Typed records shared by every Dossier crate:
//! - [`Session`]: one research run and its artifacts
//! - [`Source`]: one retrieved web document
//! - [`Finding`]: one evidence-backed insight
//! - [`Report`]: the structured final report
//! - [`Answer`]: a follow-up answer
//!
//! Invariants (absolute source URLs, non-empty evidence, ordered status
//! transitions, referential integrity) are enforced by constructors and
//! by [`Session::check_integrity`].

#![warn(unreachable_pub)]

pub mod answer;
pub mod error;
pub mod finding;
pub mod report;
pub mod session;
pub mod source;
pub mod text;

pub use answer::{Answer, AnswerSource};
pub use error::{IntegrityError, ModelError};
pub use finding::{Category, Confidence, Finding, Impact, Timeline};
pub use report::{aggregate_confidence, ExecutiveSummary, Report, ReportArtifacts, ReportMetadata, ReportSource};
pub use session::{
    Expertise, Session, SessionId, SessionStatus, SessionSummary, Stage, StageGap,
};
pub use source::{domain_of, merge_sources, parse_source_url, Source};

/// Re-exported so downstream crates name URLs without a direct dependency
pub use url::Url;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
