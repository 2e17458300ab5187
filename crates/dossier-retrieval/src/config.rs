//! Retrieval tuning

use serde::{Deserialize, Serialize};

/// Retrieval engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Minimum section score for a report answer
    pub min_relevance: f64,
    /// Multiplier weight for query terms found in a section heading
    pub heading_bonus: f64,
    /// Maximum characters of a returned section excerpt
    pub max_excerpt_chars: usize,
    /// Maximum findings combined into a fallback answer
    pub max_fallback_findings: usize,
    /// Follow-up records kept in memory; the oldest are dropped first
    pub max_history: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            min_relevance: 0.005,
            heading_bonus: 0.5,
            max_excerpt_chars: 1500,
            max_fallback_findings: 2,
            max_history: 256,
        }
    }
}

impl RetrievalConfig {
    /// Create new config with defaults
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With minimum relevance
    #[inline]
    #[must_use]
    pub fn with_min_relevance(mut self, min_relevance: f64) -> Self {
        self.min_relevance = min_relevance;
        self
    }

    /// With heading bonus
    #[inline]
    #[must_use]
    pub fn with_heading_bonus(mut self, heading_bonus: f64) -> Self {
        self.heading_bonus = heading_bonus;
        self
    }

    /// With excerpt length cap
    #[inline]
    #[must_use]
    pub fn with_max_excerpt_chars(mut self, max: usize) -> Self {
        self.max_excerpt_chars = max;
        self
    }

    /// With fallback finding cap
    #[inline]
    #[must_use]
    pub fn with_max_fallback_findings(mut self, max: usize) -> Self {
        self.max_fallback_findings = max;
        self
    }

    /// With follow-up history cap
    #[inline]
    #[must_use]
    pub fn with_max_history(mut self, max: usize) -> Self {
        self.max_history = max;
        self
    }
}
