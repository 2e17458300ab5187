//! Pipeline configuration
//!
//! [`PipelineConfig`] holds concurrency limits, timeouts and validation
//! bounds. Every field has a default, so a TOML file only needs the keys
//! it overrides. [`DepthProfile`] holds per-expertise research depth.

use crate::error::CoreError;
use dossier_model::Expertise;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Sub-questions searched concurrently
    pub max_concurrent_searches: usize,
    /// Sources extracted concurrently per sub-question
    pub extraction_concurrency: usize,
    /// Search call budget in seconds
    pub search_timeout_secs: u64,
    /// Content extraction budget per source in seconds
    pub extraction_timeout_secs: u64,
    /// Budget for generation, synthesis and writing calls in seconds
    pub capability_timeout_secs: u64,
    /// Primary results below this trigger one broadened search
    pub min_sources_threshold: usize,
    /// Maximum sub-question length in characters
    pub max_subquestion_chars: usize,
    /// Minimum valid sub-questions before Plan falls back
    pub min_subquestions: usize,
    /// Sub-questions kept at most
    pub max_subquestions: usize,
    /// Appended to a query for the broadened search
    pub broadened_query_suffix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_searches: 4,
            extraction_concurrency: 5,
            search_timeout_secs: 15,
            extraction_timeout_secs: 10,
            capability_timeout_secs: 120,
            min_sources_threshold: 3,
            max_subquestion_chars: 120,
            min_subquestions: 4,
            max_subquestions: 6,
            broadened_query_suffix: "overview guide".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML; missing keys take defaults
    ///
    /// # Errors
    /// `CoreError::Config` on malformed TOML or invalid values.
    pub fn from_toml_str(raw: &str) -> Result<Self, CoreError> {
        let config: Self =
            toml::from_str(raw).map_err(|e| CoreError::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// `CoreError::Config` if the file cannot be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    /// Check limits and bounds
    ///
    /// # Errors
    /// `CoreError::Config` naming the first invalid field.
    pub fn validate(&self) -> Result<(), CoreError> {
        let nonzero = [
            ("max_concurrent_searches", self.max_concurrent_searches as u64),
            ("extraction_concurrency", self.extraction_concurrency as u64),
            ("search_timeout_secs", self.search_timeout_secs),
            ("extraction_timeout_secs", self.extraction_timeout_secs),
            ("capability_timeout_secs", self.capability_timeout_secs),
            ("max_subquestion_chars", self.max_subquestion_chars as u64),
            ("min_subquestions", self.min_subquestions as u64),
        ];
        if let Some((name, _)) = nonzero.iter().find(|(_, v)| *v == 0) {
            return Err(CoreError::Config(format!("{name} must be greater than zero")));
        }

        if self.min_subquestions > self.max_subquestions {
            return Err(CoreError::Config(format!(
                "min_subquestions ({}) exceeds max_subquestions ({})",
                self.min_subquestions, self.max_subquestions
            )));
        }

        Ok(())
    }

    /// With search concurrency
    #[inline]
    #[must_use]
    pub fn with_max_concurrent_searches(mut self, max: usize) -> Self {
        self.max_concurrent_searches = max;
        self
    }

    /// With extraction concurrency
    #[inline]
    #[must_use]
    pub fn with_extraction_concurrency(mut self, max: usize) -> Self {
        self.extraction_concurrency = max;
        self
    }

    /// With search timeout
    #[inline]
    #[must_use]
    pub fn with_search_timeout_secs(mut self, secs: u64) -> Self {
        self.search_timeout_secs = secs;
        self
    }

    /// With extraction timeout
    #[inline]
    #[must_use]
    pub fn with_extraction_timeout_secs(mut self, secs: u64) -> Self {
        self.extraction_timeout_secs = secs;
        self
    }

    /// With capability timeout
    #[inline]
    #[must_use]
    pub fn with_capability_timeout_secs(mut self, secs: u64) -> Self {
        self.capability_timeout_secs = secs;
        self
    }

    /// Search timeout
    #[inline]
    #[must_use]
    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    /// Extraction timeout
    #[inline]
    #[must_use]
    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }

    /// Generation, synthesis and writing timeout
    #[inline]
    #[must_use]
    pub fn capability_timeout(&self) -> Duration {
        Duration::from_secs(self.capability_timeout_secs)
    }
}

/// Research depth for one expertise level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthProfile {
    /// Sources kept per sub-question
    pub sources_per_query: usize,
    /// Characters of extracted content kept per source
    pub content_length: usize,
    /// Sub-questions produced by the Plan fallback
    pub fallback_questions: usize,
    /// Style guidance handed to the report writer
    pub writing_guidance: &'static str,
}

impl DepthProfile {
    /// Profile for `expertise`
    #[must_use]
    pub fn for_expertise(expertise: Expertise) -> Self {
        match expertise {
            Expertise::Beginner => Self {
                sources_per_query: 5,
                content_length: 600,
                fallback_questions: 4,
                writing_guidance: "Use plain language, define technical terms when they first \
                                   appear, and favour practical examples over theory.",
            },
            Expertise::Intermediate => Self {
                sources_per_query: 6,
                content_length: 800,
                fallback_questions: 6,
                writing_guidance: "Balance technical detail with readability and place \
                                   findings in their industry context.",
            },
            Expertise::Expert => Self {
                sources_per_query: 7,
                content_length: 1000,
                fallback_questions: 6,
                writing_guidance: "Use precise technical language, name methodologies and \
                                   quantify claims wherever the sources allow.",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.max_concurrent_searches, 4);
        assert_eq!(config.max_subquestion_chars, 120);
        assert_eq!(config.search_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn toml_overrides_only_given_keys() {
        let config = PipelineConfig::from_toml_str(
            r#"
            max_concurrent_searches = 2
            broadened_query_suffix = "explained"
            "#,
        )
        .unwrap();

        assert_eq!(config.max_concurrent_searches, 2);
        assert_eq!(config.broadened_query_suffix, "explained");
        assert_eq!(config.extraction_concurrency, 5);
    }

    #[test]
    fn rejects_zero_concurrency() {
        let err = PipelineConfig::from_toml_str("extraction_concurrency = 0").unwrap_err();
        assert!(matches!(err, CoreError::Config(ref m) if m.contains("extraction_concurrency")));
    }

    #[test]
    fn rejects_inverted_bounds() {
        let config = PipelineConfig {
            min_subquestions: 7,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            PipelineConfig::from_toml_str("max_concurrent_searches = ["),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dossier.toml");
        std::fs::write(&path, "search_timeout_secs = 3\n").unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.search_timeout_secs, 3);
        assert!(PipelineConfig::load(dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn depth_profiles_scale_with_expertise() {
        let beginner = DepthProfile::for_expertise(Expertise::Beginner);
        let expert = DepthProfile::for_expertise(Expertise::Expert);
        assert_eq!(beginner.sources_per_query, 5);
        assert_eq!(beginner.fallback_questions, 4);
        assert_eq!(expert.content_length, 1000);
        assert!(expert.sources_per_query > beginner.sources_per_query);
    }
}
