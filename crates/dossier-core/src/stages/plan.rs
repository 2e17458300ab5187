//! Plan: decompose a topic into bounded, distinct sub-questions

use super::{StageExecutor, StageOutcome};
use crate::capability::{with_timeout, QueryGenerator};
use crate::config::{DepthProfile, PipelineConfig};
use crate::error::StageError;
use async_trait::async_trait;
use dossier_model::text::{normalize_phrase, truncate_at_word_boundary, truncate_chars};
use dossier_model::{Expertise, Stage, StageGap};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;

/// Leading list markers such as `1.`, `2)`, `-` or `*`
static LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:\d+[.)]|[-*•])\s*").expect("valid list marker pattern"));

/// Characters reserved for the template text around the topic
const FALLBACK_TEMPLATE_CHARS: usize = 40;

/// Plan stage input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanInput {
    /// Research topic
    pub topic: String,
    /// Reader expertise
    pub expertise: Expertise,
}

/// Plan stage executor
pub struct PlanStage {
    generator: Arc<dyn QueryGenerator>,
    config: Arc<PipelineConfig>,
}

impl PlanStage {
    /// Create new plan stage
    #[must_use]
    pub fn new(generator: Arc<dyn QueryGenerator>, config: Arc<PipelineConfig>) -> Self {
        Self { generator, config }
    }

    async fn generate(&self, input: &PlanInput) -> Result<Vec<String>, StageError> {
        let raw = with_timeout(
            "generate_subquestions",
            self.config.capability_timeout(),
            self.generator
                .generate_subquestions(&input.topic, input.expertise),
        )
        .await?;

        let questions = normalize_questions(raw, self.config.max_subquestion_chars);
        if questions.len() < self.config.min_subquestions {
            return Err(StageError::InvalidOutput(format!(
                "{} valid sub-questions, need at least {}",
                questions.len(),
                self.config.min_subquestions
            )));
        }

        Ok(questions
            .into_iter()
            .take(self.config.max_subquestions)
            .collect())
    }
}

#[async_trait]
impl StageExecutor for PlanStage {
    type Input = PlanInput;
    type Output = Vec<String>;

    fn stage(&self) -> Stage {
        Stage::Plan
    }

    async fn execute(&self, input: PlanInput) -> StageOutcome<Vec<String>> {
        match self.generate(&input).await {
            Ok(questions) => {
                tracing::info!(count = questions.len(), "plan produced sub-questions");
                StageOutcome::ok(questions)
            }
            Err(e) => {
                tracing::warn!(error = %e, "plan fell back to generic sub-questions");
                let questions = fallback_questions(
                    &input.topic,
                    input.expertise,
                    self.config.max_subquestion_chars,
                );
                StageOutcome::degraded(questions, StageGap::new(Stage::Plan, e.to_string()))
            }
        }
    }
}

/// Trim, strip list markers, bound length and drop near-duplicates
///
/// Questions longer than `max_chars` are cut at a word boundary; a question
/// whose first word alone is too long is dropped. Order is preserved and
/// the first of any near-duplicates wins.
#[must_use]
pub fn normalize_questions(raw: Vec<String>, max_chars: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .filter_map(|q| {
            let stripped = LIST_MARKER.replace(q.trim(), "");
            truncate_at_word_boundary(&stripped, max_chars).map(str::to_string)
        })
        .filter(|q| !q.is_empty())
        .filter(|q| seen.insert(normalize_phrase(q)))
        .collect()
}

/// Generic decomposition used when generation fails
///
/// Four questions for beginners, six otherwise, every one within
/// `max_chars`.
#[must_use]
pub fn fallback_questions(topic: &str, expertise: Expertise, max_chars: usize) -> Vec<String> {
    let budget = max_chars.saturating_sub(FALLBACK_TEMPLATE_CHARS).max(1);
    let topic = topic.split_whitespace().collect::<Vec<_>>().join(" ");
    let topic = truncate_at_word_boundary(&topic, budget)
        .unwrap_or_else(|| truncate_chars(&topic, budget))
        .to_string();

    let mut templates = vec![
        format!("What is {topic}: definition and overview"),
        format!("How does {topic} work"),
        format!("{topic} applications and examples"),
        format!("Benefits and advantages of {topic}"),
        format!("Challenges and limitations of {topic}"),
    ];
    match expertise {
        Expertise::Beginner => {}
        Expertise::Intermediate => templates.push(format!("{topic} best practices and guidelines")),
        Expertise::Expert => templates.push(format!("{topic} technical implementation details")),
    }

    let count = DepthProfile::for_expertise(expertise).fallback_questions;
    templates
        .into_iter()
        .map(|q| {
            truncate_at_word_boundary(&q, max_chars)
                .unwrap_or_else(|| truncate_chars(&q, max_chars))
                .to_string()
        })
        .take(count)
        .collect()
}
