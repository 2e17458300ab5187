//! Report file export
//!
//! Writes a session's report as a Markdown file plus a sibling JSON file,
//! named after the topic and the generation time.

use crate::error::StoreError;
use dossier_model::Session;
use std::path::{Path, PathBuf};

const MAX_TOPIC_SLUG: usize = 30;

/// Paths written by [`export_report`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedReport {
    /// Markdown file
    pub markdown_path: PathBuf,
    /// JSON file
    pub json_path: PathBuf,
}

/// Write the session report into `dir`
///
/// # Errors
/// - `StoreError::InvalidRecord` if the session has no report
/// - `StoreError::Io` / `StoreError::Serialization` on write failure
pub async fn export_report(session: &Session, dir: &Path) -> Result<ExportedReport, StoreError> {
    let report = session.report.as_ref().ok_or_else(|| {
        StoreError::InvalidRecord(format!("session {} has no report to export", session.id))
    })?;

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| StoreError::io(dir, e))?;

    let stamp = report.json.metadata.generated_at.format("%Y%m%d_%H%M%S");
    let stem = format!("research_report_{}_{stamp}", topic_slug(&session.topic));
    let markdown_path = dir.join(format!("{stem}.md"));
    let json_path = dir.join(format!("{stem}.json"));

    let json = serde_json::to_vec_pretty(&report.json).map_err(|source| {
        StoreError::Serialization {
            id: session.id.to_string(),
            source,
        }
    })?;

    tokio::fs::write(&markdown_path, report.markdown.as_bytes())
        .await
        .map_err(|e| StoreError::io(&markdown_path, e))?;
    tokio::fs::write(&json_path, json)
        .await
        .map_err(|e| StoreError::io(&json_path, e))?;

    tracing::info!(path = %markdown_path.display(), "report exported");

    Ok(ExportedReport {
        markdown_path,
        json_path,
    })
}

/// Filename-safe topic: word characters only, separators collapsed to `_`
fn topic_slug(topic: &str) -> String {
    let mut slug = String::with_capacity(topic.len());
    let mut pending_sep = false;

    for c in topic.chars() {
        if c.is_alphanumeric() || c == '_' {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(c);
        } else if c.is_whitespace() || c == '-' {
            pending_sep = true;
        }
    }

    let slug: String = slug.chars().take(MAX_TOPIC_SLUG).collect();
    let slug = slug.trim_matches('_').to_string();
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_model::{Expertise, ExecutiveSummary, Report, ReportArtifacts, SessionStatus};

    #[test]
    fn slug_collapses_separators() {
        assert_eq!(topic_slug("Renewable  energy - storage?"), "Renewable_energy_storage");
        assert_eq!(topic_slug("!!!"), "untitled");
        assert!(topic_slug(&"x".repeat(80)).len() <= MAX_TOPIC_SLUG);
    }

    #[tokio::test]
    async fn export_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new("grid storage", Expertise::Expert);
        let report = Report::new("grid storage", ExecutiveSummary::default(), &[], &[]);
        session.set_report(ReportArtifacts {
            markdown: "# grid storage\n".into(),
            json: report,
            templated: true,
        });
        session.transition(SessionStatus::CompletedWithGaps).unwrap();

        let exported = export_report(&session, dir.path()).await.unwrap();
        let markdown = std::fs::read_to_string(&exported.markdown_path).unwrap();
        assert_eq!(markdown, "# grid storage\n");
        let json = std::fs::read_to_string(&exported.json_path).unwrap();
        assert!(json.contains("\"topic\": \"grid storage\""));
    }

    #[tokio::test]
    async fn export_without_report_fails() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::new("nothing", Expertise::Expert);
        let err = export_report(&session, dir.path()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord(_)));
    }
}
