//! Error types for the data model
//!
//! Raised when a record would violate one of the model invariants:
//! - Malformed or relative source URLs
//! - Findings without supporting evidence
//! - Out-of-order lifecycle transitions
//! - Broken references between findings and sources

use crate::session::SessionStatus;

/// Model invariant violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// URL could not be parsed or is not absolute
    #[error("invalid source url '{url}': {reason}")]
    InvalidUrl {
        /// Offending input
        url: String,
        /// Parser message
        reason: String,
    },

    /// A finding was created without any evidence
    #[error("finding '{0}' has no supporting evidence")]
    EmptyEvidence(String),

    /// A finding title was blank
    #[error("finding title must not be empty")]
    EmptyTitle,

    /// Expertise value outside the supported set
    #[error("unsupported expertise level: '{0}'")]
    InvalidExpertise(String),

    /// Lifecycle transition not allowed by the run state machine
    #[error("illegal status transition {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current status
        from: SessionStatus,
        /// Requested status
        to: SessionStatus,
    },

    /// Referential integrity violation inside a session
    #[error("integrity violation: {0}")]
    Integrity(#[from] IntegrityError),
}

/// Broken references inside a session record
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    /// Finding evidence points at a source the session does not hold
    #[error("finding '{finding}' cites unknown source {url}")]
    UnknownEvidence {
        /// Finding title
        finding: String,
        /// Unresolved URL
        url: String,
    },

    /// Coverage map points at a source the session does not hold
    #[error("sub-question '{question}' maps to unknown source {url}")]
    UnknownCoverage {
        /// Sub-question text
        question: String,
        /// Unresolved URL
        url: String,
    },

    /// Same URL stored twice
    #[error("duplicate source url {0}")]
    DuplicateSource(String),

    /// Report copy diverged from the session artifacts
    #[error("report does not match session artifacts: {0}")]
    ReportMismatch(String),
}
