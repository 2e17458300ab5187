//! Follow-up retrieval engine
//!
//! Answers a question about a stored session without re-running research:
//! 1. Split the stored report into sections and score each section by
//!    query-term density, boosted by heading matches
//! 2. Below `min_relevance` (or with no report) fall back to scoring the
//!    session findings over title and category
//! 3. When nothing scores above zero, answer that nothing relevant was found
//!
//! The engine is read-only with respect to the store.

use crate::config::RetrievalConfig;
use crate::error::RetrievalError;
use crate::scoring::{density, rank, section_score, Scored};
use crate::sections::{split_sections, Section};
use crate::terms::{expand_query, term_set, TermSet};
use chrono::{DateTime, Utc};
use dossier_model::text::truncate_at_word_boundary;
use dossier_model::{Answer, AnswerSource, Finding, Session, SessionId};
use dossier_store::SessionStore;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::Arc;

/// One answered follow-up question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowupRecord {
    /// Session the question was asked about
    pub session_id: SessionId,
    /// Question text
    pub question: String,
    /// Origin of the answer
    pub source: AnswerSource,
    /// Answer confidence
    pub confidence: f64,
    /// When the question was answered
    pub asked_at: DateTime<Utc>,
}

/// Follow-up question answering over a [`SessionStore`]
pub struct RetrievalEngine {
    store: Arc<dyn SessionStore>,
    config: RetrievalConfig,
    history: Mutex<VecDeque<FollowupRecord>>,
}

impl std::fmt::Debug for RetrievalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalEngine")
            .field("config", &self.config)
            .field("history_len", &self.history.lock().len())
            .finish_non_exhaustive()
    }
}

impl RetrievalEngine {
    /// Create new engine with default configuration
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self::with_config(store, RetrievalConfig::default())
    }

    /// Create new engine with explicit configuration
    #[must_use]
    pub fn with_config(store: Arc<dyn SessionStore>, config: RetrievalConfig) -> Self {
        Self {
            store,
            config,
            history: Mutex::new(VecDeque::new()),
        }
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Answer `question` about session `session_id`
    ///
    /// # Errors
    /// - `RetrievalError::SessionNotFound` if the id is malformed or unknown
    /// - `RetrievalError::Store` if the store fails to load the session
    #[tracing::instrument(skip(self), fields(answer_source, confidence))]
    pub async fn answer(&self, session_id: &str, question: &str) -> Result<Answer, RetrievalError> {
        let id: SessionId = session_id
            .trim()
            .parse()
            .map_err(|_| RetrievalError::SessionNotFound(session_id.to_string()))?;

        let session = self
            .store
            .get(&id)
            .await
            .map_err(|e| RetrievalError::from_store(session_id, e))?;

        let answer = answer_from_session(&session, question, &self.config);

        let span = tracing::Span::current();
        span.record("answer_source", tracing::field::debug(answer.source));
        span.record("confidence", answer.confidence);
        tracing::info!("follow-up answered");

        self.remember(FollowupRecord {
            session_id: id,
            question: question.to_string(),
            source: answer.source,
            confidence: answer.confidence,
            asked_at: Utc::now(),
        });

        Ok(answer)
    }

    fn remember(&self, record: FollowupRecord) {
        let cap = self.config.max_history;
        if cap == 0 {
            return;
        }
        let mut history = self.history.lock();
        while history.len() >= cap {
            history.pop_front();
        }
        history.push_back(record);
    }

    /// Follow-up questions answered for `session_id`, oldest first
    ///
    /// Only the most recent `max_history` records (across all sessions)
    /// are kept.
    #[must_use]
    pub fn history(&self, session_id: &SessionId) -> Vec<FollowupRecord> {
        self.history
            .lock()
            .iter()
            .filter(|r| r.session_id == *session_id)
            .cloned()
            .collect()
    }
}

/// Answer `question` from an already loaded session
///
/// Pure: the same session, question and configuration always produce the
/// same answer.
#[must_use]
pub fn answer_from_session(session: &Session, question: &str, config: &RetrievalConfig) -> Answer {
    let query = expand_query(question);
    if query.is_empty() {
        tracing::debug!("question has no content terms");
        return nothing_found(question);
    }

    let sections = session
        .report_markdown()
        .map(split_sections)
        .unwrap_or_default();
    let best_section = best_section(&query, &sections, config.heading_bonus);

    if let Some((section, scored)) = best_section {
        if scored.score >= config.min_relevance {
            return Answer::new(
                excerpt(section, config.max_excerpt_chars),
                AnswerSource::Report,
                scored.score,
            );
        }
    }

    let ranked = rank_findings(&query, &session.findings);
    let top: Vec<(&Finding, f64)> = ranked
        .iter()
        .take_while(|s| s.score > 0.0)
        .take(config.max_fallback_findings)
        .map(|s| (&session.findings[s.index], s.score))
        .collect();

    if let Some(&(_, score)) = top.first() {
        return Answer::new(
            synthesize(session, &top),
            AnswerSource::AnalysisFallback,
            score,
        );
    }

    // A weak section match beats nothing
    if let Some((section, scored)) = best_section {
        if scored.score > 0.0 {
            return Answer::new(
                excerpt(section, config.max_excerpt_chars),
                AnswerSource::Report,
                scored.score,
            );
        }
    }

    nothing_found(question)
}

fn best_section<'a>(
    query: &TermSet,
    sections: &'a [Section],
    heading_bonus: f64,
) -> Option<(&'a Section, Scored)> {
    let scores = sections.iter().map(|section| {
        let heading_terms = term_set(&section.heading);
        let mut terms = term_set(&section.text);
        terms.extend(heading_terms.iter().cloned());
        section_score(query, &terms, &heading_terms, heading_bonus)
    });

    rank(scores)
        .into_iter()
        .next()
        .map(|scored| (&sections[scored.index], scored))
}

fn rank_findings(query: &TermSet, findings: &[Finding]) -> Vec<Scored> {
    rank(findings.iter().map(|finding| {
        let terms = term_set(&format!("{} {}", finding.title, finding.category));
        density(query, &terms)
    }))
}

fn excerpt(section: &Section, max_chars: usize) -> String {
    let text = section.markdown.as_str();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut = truncate_at_word_boundary(text, max_chars)
        .unwrap_or_else(|| dossier_model::text::truncate_chars(text, max_chars));
    format!("{cut}…")
}

fn synthesize(session: &Session, findings: &[(&Finding, f64)]) -> String {
    let mut text = format!(
        "No report section answers this directly. Based on the analysis of \"{}\":\n",
        session.topic
    );

    for (finding, _) in findings {
        let _ = write!(
            text,
            "\n- **{}** ({}; impact: {}; timeline: {}; confidence: {})",
            finding.title, finding.category, finding.impact, finding.timeline, finding.confidence
        );

        let citations: Vec<String> = finding
            .evidence()
            .iter()
            .take(2)
            .map(|url| match session.source(url) {
                Some(source) => format!("[{}]({url})", source.display_title()),
                None => format!("<{url}>"),
            })
            .collect();
        if !citations.is_empty() {
            let _ = write!(text, "\n  Sources: {}", citations.join(", "));
        }
    }

    text
}

fn nothing_found(question: &str) -> Answer {
    Answer::new(
        format!(
            "Nothing relevant to \"{}\" was found in this research session.",
            question.trim()
        ),
        AnswerSource::AnalysisFallback,
        0.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_model::{
        Category, Confidence, ExecutiveSummary, Expertise, Impact, Report, ReportArtifacts,
        SessionStatus, Source, Timeline,
    };
    use dossier_store::MemorySessionStore;
    use pretty_assertions::assert_eq;

    const REPORT: &str = "\
# Executive Summary

Grid storage capacity is expanding quickly.

## Key Findings

Falling cell prices drive adoption.

## Risks

Thermal runaway and fire hazards remain a safety concern for lithium systems.

## Conclusion

Storage will matter.
";

    fn finding(title: &str, category: Category) -> Finding {
        Finding::new(
            category,
            title,
            Impact::High,
            Timeline::Ongoing,
            vec![dossier_model::Url::parse("https://nrel.gov/a").unwrap()],
            Confidence::Medium,
        )
        .unwrap()
    }

    fn session(report: Option<&str>) -> Session {
        let mut session = Session::new("renewable energy storage", Expertise::Intermediate);
        session.sources = vec![Source::new("https://nrel.gov/a", "NREL study", "body", 0.8).unwrap()];
        session.findings = vec![
            finding("Fire hazards in lithium systems", Category::Risk),
            finding("Falling cell prices", Category::Trend),
        ];
        if let Some(markdown) = report {
            session.set_report(ReportArtifacts {
                markdown: markdown.to_string(),
                json: Report::new(
                    &session.topic,
                    ExecutiveSummary::default(),
                    &session.findings,
                    &session.sources,
                ),
                templated: false,
            });
        }
        session.transition(SessionStatus::CompletedWithGaps).unwrap();
        session
    }

    #[test]
    fn risk_question_hits_risk_section() {
        let answer = answer_from_session(&session(Some(REPORT)), "What are the risks?", &RetrievalConfig::default());
        assert_eq!(answer.source, AnswerSource::Report);
        assert!(answer.confidence > 0.0);
        assert!(answer.text.starts_with("## Risks"));
    }

    #[test]
    fn falls_back_to_findings_without_report() {
        let answer = answer_from_session(&session(None), "what are the risks?", &RetrievalConfig::default());
        assert_eq!(answer.source, AnswerSource::AnalysisFallback);
        assert!(answer.confidence > 0.0);
        assert!(answer.text.contains("Fire hazards in lithium systems"));
        assert!(answer.text.contains("[NREL study](https://nrel.gov/a)"));
        assert!(!answer.text.contains("Falling cell prices"));
    }

    #[test]
    fn weak_section_beats_nothing() {
        let config = RetrievalConfig::default().with_min_relevance(0.99);
        let answer = answer_from_session(&session(Some(REPORT)), "storage capacity", &config);
        assert_eq!(answer.source, AnswerSource::Report);
        assert!(answer.confidence > 0.0 && answer.confidence < 0.99);
    }

    #[test]
    fn unrelated_question_finds_nothing() {
        let answer = answer_from_session(&session(Some(REPORT)), "quantum chromodynamics", &RetrievalConfig::default());
        assert_eq!(answer.confidence, 0.0);
        assert!(!answer.is_match());
        assert!(answer.text.contains("Nothing relevant"));
    }

    #[test]
    fn excerpt_is_capped() {
        let config = RetrievalConfig::default().with_max_excerpt_chars(20);
        let answer = answer_from_session(&session(Some(REPORT)), "thermal runaway", &config);
        assert!(answer.text.ends_with('…'));
        assert!(answer.text.chars().count() <= 21);
    }

    #[test]
    fn answers_are_deterministic() {
        let s = session(Some(REPORT));
        let config = RetrievalConfig::default();
        let first = answer_from_session(&s, "benefits and costs", &config);
        for _ in 0..5 {
            assert_eq!(answer_from_session(&s, "benefits and costs", &config), first);
        }
    }

    #[tokio::test]
    async fn unknown_and_malformed_ids_are_not_found() {
        let store = Arc::new(MemorySessionStore::new());
        let engine = RetrievalEngine::new(store.clone());

        let err = engine.answer("nonexistent-id", "risks?").await.unwrap_err();
        assert!(matches!(err, RetrievalError::SessionNotFound(ref id) if id == "nonexistent-id"));

        let err = engine
            .answer(&SessionId::new().to_string(), "risks?")
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::SessionNotFound(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn history_records_answers_per_session() {
        let store = Arc::new(MemorySessionStore::new());
        let s = session(Some(REPORT));
        store.put(&s).await.unwrap();
        let engine = RetrievalEngine::new(store);

        engine.answer(&s.id.to_string(), "what are the risks?").await.unwrap();
        engine.answer(&s.id.to_string(), "quantum chromodynamics").await.unwrap();

        let history = engine.history(&s.id);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].question, "what are the risks?");
        assert_eq!(history[0].source, AnswerSource::Report);
        assert_eq!(history[1].confidence, 0.0);
        assert!(engine.history(&SessionId::new()).is_empty());
    }

    #[tokio::test]
    async fn history_drops_oldest_beyond_cap() {
        let store = Arc::new(MemorySessionStore::new());
        let s = session(Some(REPORT));
        store.put(&s).await.unwrap();
        let engine =
            RetrievalEngine::with_config(store, RetrievalConfig::default().with_max_history(2));

        for question in ["risks?", "benefits?", "costs?"] {
            engine.answer(&s.id.to_string(), question).await.unwrap();
        }

        let questions: Vec<String> = engine.history(&s.id).into_iter().map(|r| r.question).collect();
        assert_eq!(questions, vec!["benefits?".to_string(), "costs?".to_string()]);
    }
}
