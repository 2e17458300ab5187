//! Research sessions
//!
//! A [`Session`] is the durable record of one pipeline run. It is created
//! when a run starts, filled in stage by stage, moved to a terminal status,
//! and then stored once.

use crate::error::{IntegrityError, ModelError};
use crate::finding::Finding;
use crate::report::{ReportArtifacts, ReportSource};
use crate::source::Source;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;
use url::Url;

/// Unique session identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Ulid);

impl SessionId {
    /// Generate new session ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s.trim()).map(Self)
    }
}

/// Reader expertise, drives question count, source depth and writing style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expertise {
    /// Simple explanations, basic concepts
    Beginner,
    /// Balanced detail, some technical terms
    #[default]
    Intermediate,
    /// Technical depth
    Expert,
}

impl Expertise {
    /// Lowercase label
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Expertise::Beginner => "beginner",
            Expertise::Intermediate => "intermediate",
            Expertise::Expert => "expert",
        }
    }
}

impl fmt::Display for Expertise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Expertise {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Expertise::Beginner),
            "intermediate" => Ok(Expertise::Intermediate),
            "expert" => Ok(Expertise::Expert),
            _ => Err(ModelError::InvalidExpertise(s.to_string())),
        }
    }
}

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Topic decomposition
    Plan,
    /// Search and extraction
    Scout,
    /// Finding synthesis
    Analyze,
    /// Report writing
    Write,
}

impl Stage {
    /// All stages in execution order
    pub const ALL: [Stage; 4] = [Stage::Plan, Stage::Scout, Stage::Analyze, Stage::Write];

    /// Status the run is in while this stage executes
    #[inline]
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        match self {
            Stage::Plan => SessionStatus::Planning,
            Stage::Scout => SessionStatus::Scouting,
            Stage::Analyze => SessionStatus::Analyzing,
            Stage::Write => SessionStatus::Writing,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Plan => "plan",
            Stage::Scout => "scout",
            Stage::Analyze => "analyze",
            Stage::Write => "write",
        })
    }
}

/// Run status (state machine)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session allocated, nothing ran yet
    Created,
    /// Plan stage running
    Planning,
    /// Scout stage running
    Scouting,
    /// Analyze stage running
    Analyzing,
    /// Write stage running
    Writing,
    /// Every stage succeeded
    Completed,
    /// Finished, at least one stage fell back
    CompletedWithGaps,
    /// Every stage failed
    Failed,
}

impl SessionStatus {
    /// Whether no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::CompletedWithGaps | SessionStatus::Failed
        )
    }

    /// Validate a transition
    ///
    /// Stages advance strictly in order. A running session may end early
    /// in `CompletedWithGaps` or `Failed` (cancellation); only `Writing`
    /// may end in `Completed`.
    ///
    /// # Errors
    /// `ModelError::IllegalTransition` for any other move.
    pub fn advance(self, to: SessionStatus) -> Result<SessionStatus, ModelError> {
        use SessionStatus::{
            Analyzing, Completed, CompletedWithGaps, Created, Failed, Planning, Scouting, Writing,
        };

        let allowed = match (self, to) {
            (Created, Planning)
            | (Planning, Scouting)
            | (Scouting, Analyzing)
            | (Analyzing, Writing)
            | (Writing, Completed) => true,
            (from, CompletedWithGaps | Failed) => !from.is_terminal(),
            _ => false,
        };

        if allowed {
            Ok(to)
        } else {
            Err(ModelError::IllegalTransition { from: self, to })
        }
    }
}

/// A stage that fell back, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageGap {
    /// Stage that degraded
    pub stage: Stage,
    /// Human-readable cause
    pub reason: String,
    /// Sub-question the gap is scoped to (scout only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_question: Option<String>,
}

impl StageGap {
    /// Create new gap
    #[inline]
    #[must_use]
    pub fn new(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            reason: reason.into(),
            sub_question: None,
        }
    }

    /// Scope gap to a sub-question
    #[inline]
    #[must_use]
    pub fn for_question(mut self, question: impl Into<String>) -> Self {
        self.sub_question = Some(question.into());
        self
    }
}

/// One research run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session ID
    pub id: SessionId,
    /// Research topic
    pub topic: String,
    /// Reader expertise
    pub expertise: Expertise,
    /// Current status
    pub status: SessionStatus,
    /// Ordered sub-questions
    pub sub_questions: Vec<String>,
    /// Source URLs gathered per sub-question
    pub coverage: IndexMap<String, Vec<Url>>,
    /// Deduplicated sources
    pub sources: Vec<Source>,
    /// Synthesized findings
    pub findings: Vec<Finding>,
    /// Markdown + structured report, set together
    pub report: Option<ReportArtifacts>,
    /// Stages that fell back
    pub gaps: Vec<StageGap>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create new session in `Created` status
    #[must_use]
    pub fn new(topic: impl Into<String>, expertise: Expertise) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            topic: topic.into(),
            expertise,
            status: SessionStatus::Created,
            sub_questions: Vec::new(),
            coverage: IndexMap::new(),
            sources: Vec::new(),
            findings: Vec::new(),
            report: None,
            gaps: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `status`, enforcing the state machine
    ///
    /// # Errors
    /// `ModelError::IllegalTransition` if the move is not allowed.
    pub fn transition(&mut self, status: SessionStatus) -> Result<(), ModelError> {
        self.status = self.status.advance(status)?;
        self.touch();
        Ok(())
    }

    /// Record a degraded stage
    pub fn record_gap(&mut self, gap: StageGap) {
        self.gaps.push(gap);
        self.touch();
    }

    /// Attach the final report
    pub fn set_report(&mut self, report: ReportArtifacts) {
        self.report = Some(report);
        self.touch();
    }

    /// Drop report artifacts (used for failed runs)
    pub fn clear_report(&mut self) {
        self.report = None;
        self.touch();
    }

    /// Rendered Markdown, if Write completed
    #[inline]
    #[must_use]
    pub fn report_markdown(&self) -> Option<&str> {
        self.report.as_ref().map(|r| r.markdown.as_str())
    }

    /// Whether any stage fell back
    #[inline]
    #[must_use]
    pub fn has_gaps(&self) -> bool {
        !self.gaps.is_empty()
    }

    /// Whether `stage` recorded at least one gap
    #[must_use]
    pub fn stage_degraded(&self, stage: Stage) -> bool {
        self.gaps.iter().any(|g| g.stage == stage)
    }

    /// Look up a source by URL
    #[must_use]
    pub fn source(&self, url: &Url) -> Option<&Source> {
        self.sources.iter().find(|s| &s.url == url)
    }

    /// Sources gathered for a sub-question (empty if none or unknown)
    #[must_use]
    pub fn sources_for(&self, question: &str) -> Vec<&Source> {
        self.coverage
            .get(question)
            .map(|urls| urls.iter().filter_map(|u| self.source(u)).collect())
            .unwrap_or_default()
    }

    /// Verify referential integrity
    ///
    /// # Errors
    /// The first violation found.
    pub fn check_integrity(&self) -> Result<(), IntegrityError> {
        let mut known: HashSet<&Url> = HashSet::with_capacity(self.sources.len());
        for source in &self.sources {
            if !known.insert(&source.url) {
                return Err(IntegrityError::DuplicateSource(source.url.to_string()));
            }
        }

        for finding in &self.findings {
            if let Some(url) = finding.evidence().iter().find(|u| !known.contains(u)) {
                return Err(IntegrityError::UnknownEvidence {
                    finding: finding.title.clone(),
                    url: url.to_string(),
                });
            }
        }

        for (question, urls) in &self.coverage {
            if let Some(url) = urls.iter().find(|u| !known.contains(u)) {
                return Err(IntegrityError::UnknownCoverage {
                    question: question.clone(),
                    url: url.to_string(),
                });
            }
        }

        if let Some(report) = &self.report {
            if report.json.findings != self.findings {
                return Err(IntegrityError::ReportMismatch("findings differ".to_string()));
            }
            let expected: Vec<ReportSource> = self.sources.iter().map(ReportSource::from).collect();
            if report.json.sources != expected {
                return Err(IntegrityError::ReportMismatch("sources differ".to_string()));
            }
        }

        Ok(())
    }

    /// Lightweight listing record
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            topic: self.topic.clone(),
            expertise: self.expertise,
            status: self.status,
            sub_question_count: self.sub_questions.len(),
            source_count: self.sources.len(),
            finding_count: self.findings.len(),
            gap_count: self.gaps.len(),
            has_report: self.report.is_some(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Session listing record (excludes report bodies)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session ID
    pub id: SessionId,
    /// Research topic
    pub topic: String,
    /// Reader expertise
    pub expertise: Expertise,
    /// Terminal status
    pub status: SessionStatus,
    /// Number of sub-questions
    pub sub_question_count: usize,
    /// Number of sources
    pub source_count: usize,
    /// Number of findings
    pub finding_count: usize,
    /// Number of recorded gaps
    pub gap_count: usize,
    /// Whether a report is attached
    pub has_report: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{Category, Confidence, Impact, Timeline};
    use crate::report::{ExecutiveSummary, Report};

    fn sample_source(url: &str) -> Source {
        Source::new(url, "Title", "body", 0.5).unwrap()
    }

    fn sample_finding(url: &str) -> Finding {
        Finding::new(
            Category::Risk,
            "Fire hazard",
            Impact::High,
            Timeline::Ongoing,
            vec![Url::parse(url).unwrap()],
            Confidence::Medium,
        )
        .unwrap()
    }

    #[test]
    fn session_id_roundtrip() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("nonexistent-id".parse::<SessionId>().is_err());
    }

    #[test]
    fn expertise_parsing() {
        assert_eq!("Expert".parse::<Expertise>().unwrap(), Expertise::Expert);
        assert_eq!(" beginner ".parse::<Expertise>().unwrap(), Expertise::Beginner);
        assert!(matches!(
            "guru".parse::<Expertise>(),
            Err(ModelError::InvalidExpertise(_))
        ));
        assert_eq!(Expertise::default(), Expertise::Intermediate);
    }

    #[test]
    fn happy_path_transitions() {
        let mut session = Session::new("t", Expertise::default());
        for stage in Stage::ALL {
            session.transition(stage.status()).unwrap();
        }
        session.transition(SessionStatus::Completed).unwrap();
        assert!(session.status.is_terminal());
    }

    #[test]
    fn skipping_a_stage_is_rejected() {
        let mut session = Session::new("t", Expertise::default());
        session.transition(SessionStatus::Planning).unwrap();
        let err = session.transition(SessionStatus::Analyzing).unwrap_err();
        assert!(matches!(err, ModelError::IllegalTransition { .. }));
        assert_eq!(session.status, SessionStatus::Planning);
    }

    #[test]
    fn completed_only_from_writing() {
        assert!(SessionStatus::Scouting.advance(SessionStatus::Completed).is_err());
        assert!(SessionStatus::Scouting.advance(SessionStatus::CompletedWithGaps).is_ok());
        assert!(SessionStatus::Completed.advance(SessionStatus::Failed).is_err());
    }

    #[test]
    fn integrity_detects_unknown_evidence() {
        let mut session = Session::new("t", Expertise::Expert);
        session.sources.push(sample_source("https://a.example/1"));
        session.findings.push(sample_finding("https://b.example/2"));

        assert!(matches!(
            session.check_integrity(),
            Err(IntegrityError::UnknownEvidence { .. })
        ));
    }

    #[test]
    fn integrity_detects_duplicate_sources_and_coverage() {
        let mut session = Session::new("t", Expertise::Expert);
        session.sources.push(sample_source("https://a.example/1"));
        session
            .coverage
            .insert("q".into(), vec![Url::parse("https://c.example").unwrap()]);
        assert!(matches!(
            session.check_integrity(),
            Err(IntegrityError::UnknownCoverage { .. })
        ));

        session.coverage.clear();
        session.sources.push(sample_source("https://a.example/1"));
        assert!(matches!(
            session.check_integrity(),
            Err(IntegrityError::DuplicateSource(_))
        ));
    }

    #[test]
    fn integrity_checks_report_copy() {
        let mut session = Session::new("t", Expertise::Expert);
        session.sources.push(sample_source("https://a.example/1"));
        session.findings.push(sample_finding("https://a.example/1"));
        let report = Report::new("t", ExecutiveSummary::default(), &session.findings, &session.sources);
        session.set_report(ReportArtifacts {
            markdown: "# t".into(),
            json: report,
            templated: false,
        });
        assert!(session.check_integrity().is_ok());

        session.findings.clear();
        assert!(matches!(
            session.check_integrity(),
            Err(IntegrityError::ReportMismatch(_))
        ));
    }

    #[test]
    fn sources_for_unknown_question_is_empty() {
        let session = Session::new("t", Expertise::Expert);
        assert!(session.sources_for("missing").is_empty());
    }

    #[test]
    fn summary_counts() {
        let mut session = Session::new("storage", Expertise::Beginner);
        session.sub_questions = vec!["a".into(), "b".into()];
        session.record_gap(StageGap::new(Stage::Scout, "timeout").for_question("a"));
        let summary = session.summary();
        assert_eq!(summary.sub_question_count, 2);
        assert_eq!(summary.gap_count, 1);
        assert!(!summary.has_report);
    }
}
