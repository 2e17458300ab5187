//! Follow-up answers

use serde::{Deserialize, Serialize};

/// Where an answer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    /// Excerpt of the stored report
    Report,
    /// Synthesized from findings because no report section matched
    AnalysisFallback,
}

/// Follow-up answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// Excerpt or synthesized text
    pub text: String,
    /// Origin of `text`
    pub source: AnswerSource,
    /// Winning relevance score
    pub confidence: f64,
}

impl Answer {
    /// Create new answer
    #[inline]
    #[must_use]
    pub fn new(text: impl Into<String>, source: AnswerSource, confidence: f64) -> Self {
        Self {
            text: text.into(),
            source,
            confidence,
        }
    }

    /// Whether anything relevant was found
    #[inline]
    #[must_use]
    pub fn is_match(&self) -> bool {
        self.confidence > 0.0
    }
}
