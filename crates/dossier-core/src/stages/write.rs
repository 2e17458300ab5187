//! Write: draft the report and hold it to the citation rules

use super::{StageExecutor, StageOutcome};
use crate::capability::{with_timeout, ReportWriter, WriteRequest};
use crate::config::PipelineConfig;
use crate::error::StageError;
use crate::report::{render_template, validate_citations, ReportStats};
use async_trait::async_trait;
use dossier_model::{Report, ReportArtifacts, Stage, StageGap};
use std::sync::Arc;

/// Write stage executor
pub struct WriteStage {
    writer: Arc<dyn ReportWriter>,
    config: Arc<PipelineConfig>,
}

impl WriteStage {
    /// Create new write stage
    #[must_use]
    pub fn new(writer: Arc<dyn ReportWriter>, config: Arc<PipelineConfig>) -> Self {
        Self { writer, config }
    }

    async fn draft(&self, request: &WriteRequest) -> Result<ReportArtifacts, StageError> {
        let draft = with_timeout(
            "write_report",
            self.config.capability_timeout(),
            self.writer.write_report(request),
        )
        .await?;

        let markdown = validate_citations(&draft.markdown, &request.sources, &request.findings)?;

        // The stored report always mirrors the session, whatever the writer returned
        let report = Report::new(
            request.topic.clone(),
            draft.report.executive_summary,
            &request.findings,
            &request.sources,
        );

        Ok(ReportArtifacts {
            markdown,
            json: report,
            templated: false,
        })
    }
}

#[async_trait]
impl StageExecutor for WriteStage {
    type Input = WriteRequest;
    type Output = ReportArtifacts;

    fn stage(&self) -> Stage {
        Stage::Write
    }

    async fn execute(&self, request: WriteRequest) -> StageOutcome<ReportArtifacts> {
        match self.draft(&request).await {
            Ok(artifacts) => {
                let stats = ReportStats::of(&artifacts.markdown);
                tracing::info!(
                    words = stats.word_count,
                    citations = stats.citation_count,
                    sections = stats.section_count,
                    "report written"
                );
                StageOutcome::ok(artifacts)
            }
            Err(e) => {
                tracing::warn!(error = %e, "write fell back to templated report");
                StageOutcome::degraded(
                    render_template(&request),
                    StageGap::new(Stage::Write, e.to_string()),
                )
            }
        }
    }
}
