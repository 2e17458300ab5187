//! Pipeline orchestrator
//!
//! Runs Plan → Scout → Analyze → Write for one topic, folds every stage
//! outcome into a [`Session`], and stores the session exactly once:
//! - every stage succeeded: `Completed`
//! - some stage fell back or a sub-question failed: `CompletedWithGaps`
//! - every stage fell back: `Failed` (stored, then reported as an error)
//!
//! Cancellation is checked between stages. A cancelled run is stored with
//! a gap for each skipped stage and reported as [`CoreError::Cancelled`].

use crate::capability::{Capabilities, WriteRequest};
use crate::config::{DepthProfile, PipelineConfig};
use crate::error::CoreError;
use crate::stages::{
    AnalyzeInput, AnalyzeStage, PlanInput, PlanStage, ScoutInput, ScoutStage, StageExecutor,
    StageOutcome, WriteStage,
};
use dossier_model::text::normalize_phrase;
use dossier_model::{
    merge_sources, Expertise, Session, SessionStatus, SessionSummary, Stage, StageGap,
};
use dossier_store::SessionStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Gap reason recorded for stages skipped by cancellation
pub const CANCELLED_REASON: &str = "cancelled";

/// Research pipeline over pluggable capabilities and a session store
pub struct PipelineOrchestrator {
    config: Arc<PipelineConfig>,
    store: Arc<dyn SessionStore>,
    plan: PlanStage,
    scout: ScoutStage,
    analyze: AnalyzeStage,
    write: WriteStage,
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Per-run bookkeeping: which stages fell back
#[derive(Debug, Default)]
struct RunTally {
    fell_back: Vec<Stage>,
    completed: Vec<Stage>,
}

impl RunTally {
    fn record<T>(&mut self, stage: Stage, session: &mut Session, outcome: &StageOutcome<T>) {
        if outcome.fell_back {
            self.fell_back.push(stage);
        } else {
            self.completed.push(stage);
        }
        for gap in &outcome.gaps {
            session.record_gap(gap.clone());
        }
    }

    fn all_failed(&self) -> bool {
        self.completed.is_empty()
    }
}

impl PipelineOrchestrator {
    /// Create new orchestrator
    ///
    /// # Errors
    /// `CoreError::Config` if `config` fails validation.
    pub fn new(
        capabilities: Capabilities,
        store: Arc<dyn SessionStore>,
        config: PipelineConfig,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let config = Arc::new(config);

        Ok(Self {
            plan: PlanStage::new(capabilities.query_generator, Arc::clone(&config)),
            scout: ScoutStage::new(
                capabilities.search,
                capabilities.extractor,
                Arc::clone(&config),
            ),
            analyze: AnalyzeStage::new(capabilities.synthesizer, Arc::clone(&config)),
            write: WriteStage::new(capabilities.writer, Arc::clone(&config)),
            store,
            config,
        })
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Session store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Research `topic` end to end
    ///
    /// # Errors
    /// - `CoreError::Validation` if the topic is blank (nothing is stored)
    /// - `CoreError::AllStagesFailed` if every stage fell back (stored)
    /// - `CoreError::Store` if the session could not be stored
    pub async fn run(&self, topic: &str, expertise: Expertise) -> Result<Session, CoreError> {
        self.run_with_cancel(topic, expertise, CancellationToken::new())
            .await
    }

    /// Research `topic`, stopping between stages once `cancel` fires
    ///
    /// # Errors
    /// As [`run`](Self::run), plus `CoreError::Cancelled` (stored).
    pub async fn run_with_cancel(
        &self,
        topic: &str,
        expertise: Expertise,
        cancel: CancellationToken,
    ) -> Result<Session, CoreError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(CoreError::Validation("topic must not be empty".to_string()));
        }

        let mut session = Session::new(topic, expertise);
        let span = tracing::info_span!("research", session_id = %session.id, %expertise);

        async move {
            tracing::info!(topic = %session.topic, "research started");
            let mut tally = RunTally::default();

            let cancelled = self.execute_stages(&mut session, &mut tally, &cancel).await?;
            self.finish(session, &tally, cancelled).await
        }
        .instrument(span)
        .await
    }

    /// Run the stages in order; returns whether the run was cancelled
    async fn execute_stages(
        &self,
        session: &mut Session,
        tally: &mut RunTally,
        cancel: &CancellationToken,
    ) -> Result<bool, CoreError> {
        let profile = DepthProfile::for_expertise(session.expertise);

        // Plan
        if self.skip_if_cancelled(session, cancel, Stage::Plan) {
            return Ok(true);
        }
        session.transition(SessionStatus::Planning)?;
        let outcome = self
            .plan
            .execute(PlanInput {
                topic: session.topic.clone(),
                expertise: session.expertise,
            })
            .await;
        tally.record(Stage::Plan, session, &outcome);
        session.sub_questions = outcome.output;

        // Scout
        if self.skip_if_cancelled(session, cancel, Stage::Scout) {
            return Ok(true);
        }
        session.transition(SessionStatus::Scouting)?;
        let outcome = self
            .scout
            .execute(ScoutInput {
                questions: session.sub_questions.clone(),
                expertise: session.expertise,
            })
            .await;
        tally.record(Stage::Scout, session, &outcome);
        let mut gathered = Vec::new();
        for (question, sources) in outcome.output {
            session
                .coverage
                .insert(question, sources.iter().map(|s| s.url.clone()).collect());
            gathered.extend(sources);
        }
        session.sources = merge_sources(gathered);

        // Analyze
        if self.skip_if_cancelled(session, cancel, Stage::Analyze) {
            return Ok(true);
        }
        session.transition(SessionStatus::Analyzing)?;
        let outcome = self
            .analyze
            .execute(AnalyzeInput {
                topic: session.topic.clone(),
                sources: session.sources.clone(),
            })
            .await;
        tally.record(Stage::Analyze, session, &outcome);
        session.findings = outcome.output;

        // Write
        if self.skip_if_cancelled(session, cancel, Stage::Write) {
            return Ok(true);
        }
        session.transition(SessionStatus::Writing)?;
        let outcome = self
            .write
            .execute(WriteRequest {
                topic: session.topic.clone(),
                expertise: session.expertise,
                guidance: profile.writing_guidance.to_string(),
                findings: session.findings.clone(),
                sources: session.sources.clone(),
            })
            .await;
        tally.record(Stage::Write, session, &outcome);
        session.set_report(outcome.output);

        Ok(false)
    }

    /// Record cancellation gaps for `stage` and every later stage
    fn skip_if_cancelled(
        &self,
        session: &mut Session,
        cancel: &CancellationToken,
        stage: Stage,
    ) -> bool {
        if !cancel.is_cancelled() {
            return false;
        }
        tracing::warn!(%stage, "research cancelled");
        for skipped in Stage::ALL.iter().skip_while(|s| **s != stage) {
            session.record_gap(StageGap::new(*skipped, CANCELLED_REASON));
        }
        true
    }

    async fn finish(
        &self,
        mut session: Session,
        tally: &RunTally,
        cancelled: bool,
    ) -> Result<Session, CoreError> {
        let status = if tally.all_failed() {
            SessionStatus::Failed
        } else if tally.fell_back.is_empty() && !session.has_gaps() {
            SessionStatus::Completed
        } else {
            SessionStatus::CompletedWithGaps
        };

        session.transition(status)?;
        if status == SessionStatus::Failed {
            session.clear_report();
        }

        self.store.put(&session).await?;
        tracing::info!(
            status = ?session.status,
            sources = session.sources.len(),
            findings = session.findings.len(),
            gaps = session.gaps.len(),
            "research finished"
        );

        if cancelled {
            return Err(CoreError::Cancelled {
                session_id: session.id,
            });
        }
        if status == SessionStatus::Failed {
            return Err(CoreError::AllStagesFailed {
                session_id: session.id,
            });
        }
        Ok(session)
    }

    /// Most recent usable session for the same topic and expertise
    ///
    /// Topics match after lowercasing, whitespace collapsing and trailing
    /// punctuation stripping. Failed sessions are never returned.
    ///
    /// # Errors
    /// `CoreError::Store` if listing fails.
    pub async fn find_previous(
        &self,
        topic: &str,
        expertise: Expertise,
    ) -> Result<Option<SessionSummary>, CoreError> {
        let wanted = normalize_phrase(topic);
        let found = self.store.list().await?.into_iter().find(|s| {
            s.expertise == expertise
                && s.status.is_terminal()
                && s.status != SessionStatus::Failed
                && normalize_phrase(&s.topic) == wanted
        });
        Ok(found)
    }
}
