//! Analyze: synthesize findings, check their evidence, correlate sources

use super::{StageExecutor, StageOutcome};
use crate::capability::{with_timeout, FindingSynthesizer};
use crate::config::PipelineConfig;
use crate::error::StageError;
use async_trait::async_trait;
use dossier_model::text::{normalize_phrase, truncate_at_word_boundary};
use dossier_model::{
    domain_of, Category, Confidence, Finding, Impact, IntegrityError, Source, Stage, StageGap,
    Timeline,
};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

/// Titles listed in the fallback finding
const FALLBACK_TITLE_SOURCES: usize = 5;
/// Maximum fallback finding title length
const FALLBACK_TITLE_CHARS: usize = 300;

/// Analyze stage input
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeInput {
    /// Research topic
    pub topic: String,
    /// All session sources
    pub sources: Vec<Source>,
}

/// Analyze stage executor
pub struct AnalyzeStage {
    synthesizer: Arc<dyn FindingSynthesizer>,
    config: Arc<PipelineConfig>,
}

impl AnalyzeStage {
    /// Create new analyze stage
    #[must_use]
    pub fn new(synthesizer: Arc<dyn FindingSynthesizer>, config: Arc<PipelineConfig>) -> Self {
        Self {
            synthesizer,
            config,
        }
    }

    async fn synthesize(&self, sources: &[Source]) -> Result<Vec<Finding>, StageError> {
        let findings = with_timeout(
            "synthesize_findings",
            self.config.capability_timeout(),
            self.synthesizer.synthesize_findings(sources),
        )
        .await?;

        if findings.is_empty() {
            return Err(StageError::InvalidOutput(
                "no findings for a non-empty source set".to_string(),
            ));
        }
        check_evidence(&findings, sources)?;
        Ok(correlate(findings))
    }
}

#[async_trait]
impl StageExecutor for AnalyzeStage {
    type Input = AnalyzeInput;
    type Output = Vec<Finding>;

    fn stage(&self) -> Stage {
        Stage::Analyze
    }

    async fn execute(&self, input: AnalyzeInput) -> StageOutcome<Vec<Finding>> {
        if input.sources.is_empty() {
            tracing::warn!("no sources to analyze");
            return StageOutcome::degraded(
                Vec::new(),
                StageGap::new(Stage::Analyze, "no sources to analyze"),
            );
        }

        match self.synthesize(&input.sources).await {
            Ok(findings) => {
                tracing::info!(count = findings.len(), "analysis produced findings");
                StageOutcome::ok(findings)
            }
            Err(e) => {
                tracing::warn!(error = %e, "analysis fell back to source summary");
                let findings = fallback_finding(&input.topic, &input.sources)
                    .into_iter()
                    .collect();
                StageOutcome::degraded(findings, StageGap::new(Stage::Analyze, e.to_string()))
            }
        }
    }
}

/// Every evidence URL must name a session source
///
/// # Errors
/// `StageError::Integrity` for the first unknown URL.
pub fn check_evidence(findings: &[Finding], sources: &[Source]) -> Result<(), StageError> {
    let known: HashSet<&Url> = sources.iter().map(|s| &s.url).collect();
    for finding in findings {
        if let Some(url) = finding.evidence().iter().find(|u| !known.contains(u)) {
            return Err(IntegrityError::UnknownEvidence {
                finding: finding.title.clone(),
                url: url.to_string(),
            }
            .into());
        }
    }
    Ok(())
}

/// Merge restated findings and adjust confidence by corroboration
///
/// Findings with the same normalized title and category merge into the
/// first one (evidence union, highest confidence). Evidence from two or
/// more domains raises confidence one level; single-domain findings are
/// capped at `Medium`. The result is ordered by confidence, highest first,
/// otherwise in first-seen order.
#[must_use]
pub fn correlate(findings: Vec<Finding>) -> Vec<Finding> {
    let mut merged: IndexMap<(String, Category), Finding> = IndexMap::new();
    for finding in findings {
        let key = (normalize_phrase(&finding.title), finding.category);
        match merged.get_mut(&key) {
            Some(existing) => {
                existing.absorb_evidence(&finding);
                existing.confidence = existing.confidence.max(finding.confidence);
            }
            None => {
                merged.insert(key, finding);
            }
        }
    }

    let mut correlated: Vec<Finding> = merged
        .into_values()
        .map(|finding| {
            let domains: HashSet<String> = finding.evidence().iter().map(domain_of).collect();
            let confidence = if domains.len() >= 2 {
                finding.confidence.raised()
            } else {
                finding.confidence.min(Confidence::Medium)
            };
            finding.with_confidence(confidence)
        })
        .collect();

    // stable: equal confidence keeps first-seen order
    correlated.sort_by(|a, b| b.confidence.cmp(&a.confidence));
    correlated
}

/// Single low-confidence insight listing what was collected
///
/// `None` when there are no sources to cite.
#[must_use]
pub fn fallback_finding(topic: &str, sources: &[Source]) -> Option<Finding> {
    let titles: Vec<String> = sources
        .iter()
        .take(FALLBACK_TITLE_SOURCES)
        .map(Source::display_title)
        .collect();
    let more = sources.len().saturating_sub(FALLBACK_TITLE_SOURCES);
    let mut title = format!("Collected sources on {topic} include {}", titles.join("; "));
    if more > 0 {
        title.push_str(&format!(" and {more} more"));
    }
    let title = truncate_at_word_boundary(&title, FALLBACK_TITLE_CHARS)
        .unwrap_or("Collected sources")
        .to_string();

    Finding::new(
        Category::Insight,
        title,
        Impact::Low,
        Timeline::Ongoing,
        sources.iter().map(|s| s.url.clone()),
        Confidence::Low,
    )
    .ok()
}
