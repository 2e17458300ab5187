//! Synthesized, evidence-backed insights
//!
//! A [`Finding`] must cite at least one source. The invariant is enforced
//! at construction and again when a finding is deserialized, so a stored
//! session can never contain an unsupported claim.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use url::Url;

/// Finding category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Downside or threat
    Risk,
    /// Upside or opening
    Opportunity,
    /// Direction of change
    Trend,
    /// General observation
    Insight,
}

impl Category {
    /// Lowercase label
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Risk => "risk",
            Category::Opportunity => "opportunity",
            Category::Trend => "trend",
            Category::Insight => "insight",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expected impact of a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    /// High impact
    High,
    /// Medium impact
    Medium,
    /// Low impact
    Low,
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Impact::High => "high",
            Impact::Medium => "medium",
            Impact::Low => "low",
        })
    }
}

/// Time horizon of a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeline {
    /// Within a year
    ShortTerm,
    /// One to five years
    MediumTerm,
    /// Beyond five years
    LongTerm,
    /// Already happening
    Ongoing,
}

impl fmt::Display for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Timeline::ShortTerm => "short-term",
            Timeline::MediumTerm => "medium-term",
            Timeline::LongTerm => "long-term",
            Timeline::Ongoing => "ongoing",
        })
    }
}

/// Confidence level, ordered `Low < Medium < High`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Weak support
    Low,
    /// Moderate support
    Medium,
    /// Strong support
    High,
}

impl Confidence {
    /// One level higher, saturating at `High`
    #[inline]
    #[must_use]
    pub fn raised(self) -> Self {
        match self {
            Confidence::Low => Confidence::Medium,
            Confidence::Medium | Confidence::High => Confidence::High,
        }
    }

    /// Numeric weight used when averaging confidence
    #[inline]
    #[must_use]
    pub fn weight(self) -> f64 {
        match self {
            Confidence::Low => 0.3,
            Confidence::Medium => 0.6,
            Confidence::High => 0.9,
        }
    }

    /// Bucket an averaged weight back into a level
    #[must_use]
    pub fn from_weight(weight: f64) -> Self {
        if weight >= 0.75 {
            Confidence::High
        } else if weight >= 0.45 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Confidence::Low
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        })
    }
}

/// One synthesized insight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FindingRecord")]
pub struct Finding {
    /// Category
    pub category: Category,
    /// Short statement of the claim
    pub title: String,
    /// Expected impact
    pub impact: Impact,
    /// Time horizon
    pub timeline: Timeline,
    /// Supporting source URLs (never empty)
    evidence: BTreeSet<Url>,
    /// Confidence level
    pub confidence: Confidence,
}

impl Finding {
    /// Create new finding
    ///
    /// # Errors
    /// - `ModelError::EmptyTitle` if the title is blank
    /// - `ModelError::EmptyEvidence` if no evidence URL is given
    pub fn new(
        category: Category,
        title: impl Into<String>,
        impact: Impact,
        timeline: Timeline,
        evidence: impl IntoIterator<Item = Url>,
        confidence: Confidence,
    ) -> Result<Self, ModelError> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return Err(ModelError::EmptyTitle);
        }

        let evidence: BTreeSet<Url> = evidence.into_iter().collect();
        if evidence.is_empty() {
            return Err(ModelError::EmptyEvidence(title));
        }

        Ok(Self {
            category,
            title,
            impact,
            timeline,
            evidence,
            confidence,
        })
    }

    /// Supporting source URLs
    #[inline]
    #[must_use]
    pub fn evidence(&self) -> &BTreeSet<Url> {
        &self.evidence
    }

    /// Add evidence from another finding describing the same claim
    pub fn absorb_evidence(&mut self, other: &Finding) {
        self.evidence.extend(other.evidence.iter().cloned());
    }

    /// With confidence
    #[inline]
    #[must_use]
    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }
}

#[derive(Deserialize)]
struct FindingRecord {
    category: Category,
    title: String,
    impact: Impact,
    timeline: Timeline,
    evidence: Vec<Url>,
    confidence: Confidence,
}

impl TryFrom<FindingRecord> for Finding {
    type Error = ModelError;

    fn try_from(record: FindingRecord) -> Result<Self, Self::Error> {
        Finding::new(
            record.category,
            record.title,
            record.impact,
            record.timeline,
            record.evidence,
            record.confidence,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn finding_requires_evidence() {
        let err = Finding::new(
            Category::Risk,
            "Thermal runaway",
            Impact::High,
            Timeline::Ongoing,
            Vec::new(),
            Confidence::Medium,
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::EmptyEvidence(_)));
    }

    #[test]
    fn finding_requires_title() {
        let err = Finding::new(
            Category::Risk,
            "   ",
            Impact::High,
            Timeline::Ongoing,
            vec![url("https://a.example")],
            Confidence::Medium,
        )
        .unwrap_err();
        assert_eq!(err, ModelError::EmptyTitle);
    }

    #[test]
    fn deserialize_rejects_empty_evidence() {
        let json = r#"{"category":"risk","title":"x","impact":"low","timeline":"ongoing","evidence":[],"confidence":"low"}"#;
        assert!(serde_json::from_str::<Finding>(json).is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let finding = Finding::new(
            Category::Trend,
            "Falling cell prices",
            Impact::Medium,
            Timeline::MediumTerm,
            vec![url("https://a.example/1"), url("https://b.example/2")],
            Confidence::High,
        )
        .unwrap();

        let json = serde_json::to_string(&finding).unwrap();
        assert!(json.contains("\"medium_term\""));
        let back: Finding = serde_json::from_str(&json).unwrap();
        assert_eq!(back, finding);
    }

    #[test]
    fn confidence_ordering_and_raise() {
        assert!(Confidence::Low < Confidence::Medium);
        assert_eq!(Confidence::Low.raised(), Confidence::Medium);
        assert_eq!(Confidence::High.raised(), Confidence::High);
        assert_eq!(Confidence::from_weight(Confidence::Medium.weight()), Confidence::Medium);
    }
}
