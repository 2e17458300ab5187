//! Final report records
//!
//! A [`Report`] is derived from a session's findings and sources and is
//! immutable once built. [`ReportArtifacts`] pairs it with the rendered
//! Markdown so both are stored or neither is.

use crate::finding::{Confidence, Finding};
use crate::source::Source;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Report header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Research topic
    pub topic: String,
    /// Generation time
    pub generated_at: DateTime<Utc>,
    /// Aggregate confidence over all findings
    pub confidence_level: Confidence,
}

/// Executive summary block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutiveSummary {
    /// Bullet points
    pub key_points: Vec<String>,
    /// One-paragraph verdict
    pub overall_assessment: String,
}

/// Source entry as listed in a report (no extracted body)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSource {
    /// Source URL
    pub url: Url,
    /// Source title
    pub title: String,
    /// Reliability in `0.0..=1.0`
    pub reliability_score: f64,
    /// Access time
    pub date_accessed: DateTime<Utc>,
}

impl From<&Source> for ReportSource {
    fn from(source: &Source) -> Self {
        Self {
            url: source.url.clone(),
            title: source.title.clone(),
            reliability_score: source.reliability_score,
            date_accessed: source.date_accessed,
        }
    }
}

/// Structured report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Header
    pub metadata: ReportMetadata,
    /// Summary
    pub executive_summary: ExecutiveSummary,
    /// Copy of the session findings
    pub findings: Vec<Finding>,
    /// Copy of the session sources
    pub sources: Vec<ReportSource>,
}

impl Report {
    /// Build a report from session artifacts
    ///
    /// The confidence level is the bucketed mean of finding confidences,
    /// `Low` when there are no findings.
    #[must_use]
    pub fn new(
        topic: impl Into<String>,
        executive_summary: ExecutiveSummary,
        findings: &[Finding],
        sources: &[Source],
    ) -> Self {
        Self {
            metadata: ReportMetadata {
                topic: topic.into(),
                generated_at: Utc::now(),
                confidence_level: aggregate_confidence(findings),
            },
            executive_summary,
            findings: findings.to_vec(),
            sources: sources.iter().map(ReportSource::from).collect(),
        }
    }
}

/// Mean confidence of `findings`, bucketed
#[must_use]
pub fn aggregate_confidence(findings: &[Finding]) -> Confidence {
    if findings.is_empty() {
        return Confidence::Low;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = findings.iter().map(|f| f.confidence.weight()).sum::<f64>() / findings.len() as f64;
    Confidence::from_weight(mean)
}

/// Rendered Markdown plus structured report, stored atomically
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportArtifacts {
    /// Markdown rendering with inline citations
    pub markdown: String,
    /// Structured report
    pub json: Report,
    /// Whether the templated fallback produced this report
    #[serde(default)]
    pub templated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{Category, Impact, Timeline};

    fn finding(confidence: Confidence) -> Finding {
        Finding::new(
            Category::Insight,
            "x",
            Impact::Low,
            Timeline::Ongoing,
            vec![Url::parse("https://a.example").unwrap()],
            confidence,
        )
        .unwrap()
    }

    #[test]
    fn aggregate_confidence_buckets_mean() {
        assert_eq!(aggregate_confidence(&[]), Confidence::Low);
        assert_eq!(
            aggregate_confidence(&[finding(Confidence::High), finding(Confidence::High)]),
            Confidence::High
        );
        assert_eq!(
            aggregate_confidence(&[finding(Confidence::High), finding(Confidence::Low)]),
            Confidence::Medium
        );
    }

    #[test]
    fn report_copies_sources_without_content() {
        let source = Source::new("https://a.example/doc", "Doc", "long body", 0.7).unwrap();
        let report = Report::new("topic", ExecutiveSummary::default(), &[], &[source.clone()]);

        assert_eq!(report.sources.len(), 1);
        assert_eq!(report.sources[0].url, source.url);
        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("long body"));
    }
}
