//! External capability seams
//!
//! The pipeline never talks to a search engine, scraper or language model
//! directly. Each concern is an async trait, and a [`Capabilities`] bundle
//! holds one implementation of each. Adapters report failures as
//! [`CapabilityError`]; stages turn those into fallbacks.

use crate::error::CapabilityError;
use async_trait::async_trait;
use dossier_model::{Expertise, Finding, Report, Source};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// One search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Result URL (validated by the scout stage)
    pub url: String,
    /// Result title
    pub title: String,
    /// Result snippet
    pub snippet: String,
}

impl SearchHit {
    /// Create new hit
    #[inline]
    #[must_use]
    pub fn new(url: impl Into<String>, title: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
        }
    }
}

/// Content extraction result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Main text of the page
    Content(String),
    /// Page could not be fetched or had no usable text
    Unavailable,
}

/// Everything the report writer needs
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    /// Research topic
    pub topic: String,
    /// Reader expertise
    pub expertise: Expertise,
    /// Style guidance for this expertise
    pub guidance: String,
    /// Session findings
    pub findings: Vec<Finding>,
    /// Session sources, in citation order
    pub sources: Vec<Source>,
}

/// Writer output before citation validation
#[derive(Debug, Clone, PartialEq)]
pub struct DraftReport {
    /// Markdown with inline or numbered citations
    pub markdown: String,
    /// Structured report; findings and sources are replaced by session copies
    pub report: Report,
}

/// Decomposes a topic into sub-questions
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    /// Produce candidate sub-questions for `topic`
    async fn generate_subquestions(
        &self,
        topic: &str,
        expertise: Expertise,
    ) -> Result<Vec<String>, CapabilityError>;
}

/// Web search
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Search for `query`
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, CapabilityError>;
}

/// Page content extraction
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Extract the main text at `url`
    async fn extract_content(&self, url: &str) -> Result<Extraction, CapabilityError>;
}

/// Finding synthesis over collected sources
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FindingSynthesizer: Send + Sync {
    /// Synthesize findings; evidence must reference `sources`
    async fn synthesize_findings(&self, sources: &[Source]) -> Result<Vec<Finding>, CapabilityError>;
}

/// Report writing
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReportWriter: Send + Sync {
    /// Write a report for `request`
    async fn write_report(&self, request: &WriteRequest) -> Result<DraftReport, CapabilityError>;
}

/// One implementation of each capability
#[derive(Clone)]
pub struct Capabilities {
    /// Sub-question generation
    pub query_generator: Arc<dyn QueryGenerator>,
    /// Web search
    pub search: Arc<dyn SearchBackend>,
    /// Content extraction
    pub extractor: Arc<dyn ContentExtractor>,
    /// Finding synthesis
    pub synthesizer: Arc<dyn FindingSynthesizer>,
    /// Report writing
    pub writer: Arc<dyn ReportWriter>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}

/// Run a capability call under a time budget
///
/// # Errors
/// The call's own error, or `CapabilityError::Timeout`.
pub async fn with_timeout<T>(
    operation: &'static str,
    budget: Duration,
    call: impl Future<Output = Result<T, CapabilityError>>,
) -> Result<T, CapabilityError> {
    match tokio::time::timeout(budget, call).await {
        Ok(result) => result,
        Err(_) => Err(CapabilityError::Timeout {
            operation,
            secs: budget.as_secs(),
        }),
    }
}
