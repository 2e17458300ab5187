//! Scout: search, extract, clean and rank sources per sub-question
//!
//! Sub-questions run concurrently (bounded, results in input order). Within
//! a sub-question, extraction runs concurrently (bounded, any order) and the
//! surviving sources are ranked by relevance.

use super::{StageExecutor, StageOutcome};
use crate::capability::{with_timeout, ContentExtractor, Extraction, SearchBackend, SearchHit};
use crate::config::{DepthProfile, PipelineConfig};
use crate::error::CapabilityError;
use crate::relevance::{clean_content, relevance_score};
use async_trait::async_trait;
use dossier_model::text::truncate_chars;
use dossier_model::{parse_source_url, Expertise, Source, Stage, StageGap};
use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::sync::Arc;
use url::Url;

/// Scout stage input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoutInput {
    /// Sub-questions in plan order
    pub questions: Vec<String>,
    /// Reader expertise (drives source count and content length)
    pub expertise: Expertise,
}

/// Ranked sources per sub-question, in plan order
pub type ScoutOutput = IndexMap<String, Vec<Source>>;

/// Scout stage executor
pub struct ScoutStage {
    search: Arc<dyn SearchBackend>,
    extractor: Arc<dyn ContentExtractor>,
    config: Arc<PipelineConfig>,
}

impl ScoutStage {
    /// Create new scout stage
    #[must_use]
    pub fn new(
        search: Arc<dyn SearchBackend>,
        extractor: Arc<dyn ContentExtractor>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            search,
            extractor,
            config,
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, CapabilityError> {
        with_timeout("search", self.config.search_timeout(), self.search.search(query)).await
    }

    #[tracing::instrument(skip(self, profile))]
    async fn scout_question(
        &self,
        question: &str,
        profile: DepthProfile,
    ) -> Result<Vec<Source>, CapabilityError> {
        let mut hits = self.search(question).await?;

        if hits.len() < self.config.min_sources_threshold {
            let broadened = format!("{question} {}", self.config.broadened_query_suffix);
            match self.search(&broadened).await {
                Ok(more) => {
                    tracing::debug!(primary = hits.len(), extra = more.len(), "broadened search");
                    hits.extend(more);
                }
                Err(e) => tracing::debug!(error = %e, "broadened search failed"),
            }
        }

        let candidates = dedupe_hits(hits);
        let mut ranked: Vec<(usize, Source)> = stream::iter(candidates.into_iter().enumerate())
            .map(|(position, (url, hit))| async move {
                self.extract(question, url, hit, profile)
                    .await
                    .map(|source| (position, source))
            })
            .buffer_unordered(self.config.extraction_concurrency)
            .filter_map(futures::future::ready)
            .collect()
            .await;

        ranked.sort_by(|(pa, a), (pb, b)| {
            b.reliability_score
                .partial_cmp(&a.reliability_score)
                .unwrap_or(Ordering::Equal)
                .then(pa.cmp(pb))
        });
        ranked.truncate(profile.sources_per_query);

        tracing::debug!(kept = ranked.len(), "sources ranked");
        Ok(ranked.into_iter().map(|(_, source)| source).collect())
    }

    async fn extract(
        &self,
        question: &str,
        url: Url,
        hit: SearchHit,
        profile: DepthProfile,
    ) -> Option<Source> {
        let extraction = with_timeout(
            "extract_content",
            self.config.extraction_timeout(),
            self.extractor.extract_content(url.as_str()),
        )
        .await;

        let raw = match extraction {
            Ok(Extraction::Content(raw)) => raw,
            Ok(Extraction::Unavailable) => {
                tracing::debug!(%url, "content unavailable");
                return None;
            }
            Err(e) => {
                tracing::debug!(%url, error = %e, "extraction failed");
                return None;
            }
        };

        let cleaned = clean_content(&raw);
        if cleaned.is_empty() {
            tracing::debug!(%url, "empty content after cleaning");
            return None;
        }

        let content = truncate_chars(&cleaned, profile.content_length).to_string();
        let score = relevance_score(question, &hit.title, &hit.snippet, &content);
        Source::new(url.as_str(), hit.title, content, score).ok()
    }
}

/// Validate hit URLs and drop duplicates, keeping the first occurrence
fn dedupe_hits(hits: Vec<SearchHit>) -> Vec<(Url, SearchHit)> {
    let mut unique: IndexMap<Url, SearchHit> = IndexMap::with_capacity(hits.len());
    for hit in hits {
        match parse_source_url(&hit.url) {
            Ok(url) => {
                unique.entry(url).or_insert(hit);
            }
            Err(e) => tracing::debug!(error = %e, "skipping search hit"),
        }
    }
    unique.into_iter().collect()
}

#[async_trait]
impl StageExecutor for ScoutStage {
    type Input = ScoutInput;
    type Output = ScoutOutput;

    fn stage(&self) -> Stage {
        Stage::Scout
    }

    async fn execute(&self, input: ScoutInput) -> StageOutcome<ScoutOutput> {
        let profile = DepthProfile::for_expertise(input.expertise);
        let total = input.questions.len();

        let results: Vec<(String, Result<Vec<Source>, CapabilityError>)> =
            stream::iter(input.questions)
                .map(|question| async move {
                    let result = self.scout_question(&question, profile).await;
                    (question, result)
                })
                .buffered(self.config.max_concurrent_searches)
                .collect()
                .await;

        let mut output = ScoutOutput::with_capacity(total);
        let mut gaps = Vec::new();
        for (question, result) in results {
            match result {
                Ok(sources) => {
                    output.insert(question, sources);
                }
                Err(e) => {
                    tracing::warn!(%question, error = %e, "scout failed for sub-question");
                    gaps.push(StageGap::new(Stage::Scout, e.to_string()).for_question(&question));
                    output.insert(question, Vec::new());
                }
            }
        }

        let found: usize = output.values().map(Vec::len).sum();
        tracing::info!(questions = total, sources = found, failed = gaps.len(), "scout finished");

        if total > 0 && gaps.len() == total {
            StageOutcome {
                output,
                gaps,
                fell_back: true,
            }
        } else {
            StageOutcome::partial(output, gaps)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{MockContentExtractor, MockSearchBackend};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn hit(url: &str, title: &str) -> SearchHit {
        SearchHit::new(url, title, "battery storage overview")
    }

    fn content_extractor() -> MockContentExtractor {
        let mut extractor = MockContentExtractor::new();
        extractor.expect_extract_content().returning(|url| {
            if url.contains("empty") {
                Ok(Extraction::Content("  \n ".to_string()))
            } else if url.contains("gone") {
                Ok(Extraction::Unavailable)
            } else {
                Ok(Extraction::Content(format!("battery storage text from {url}")))
            }
        });
        extractor
    }

    fn stage(search: MockSearchBackend, extractor: impl ContentExtractor + 'static) -> ScoutStage {
        ScoutStage::new(
            Arc::new(search),
            Arc::new(extractor),
            Arc::new(PipelineConfig::default()),
        )
    }

    fn input(questions: &[&str]) -> ScoutInput {
        ScoutInput {
            questions: questions.iter().map(|q| (*q).to_string()).collect(),
            expertise: Expertise::Beginner,
        }
    }

    #[tokio::test]
    async fn failing_subquestion_keeps_others() {
        let mut search = MockSearchBackend::new();
        search.expect_search().returning(|q| {
            if q.starts_with("broken") {
                Err(CapabilityError::Failed("rate limited".into()))
            } else {
                Ok(vec![
                    hit(&format!("https://a.example/{}", q.len()), "Battery storage"),
                    hit("https://b.example/x", "Storage"),
                    hit("https://c.example/y", "Other"),
                ])
            }
        });

        let outcome = stage(search, content_extractor())
            .execute(input(&["battery storage", "broken question", "storage costs"]))
            .await;

        assert!(!outcome.fell_back);
        let keys: Vec<_> = outcome.output.keys().cloned().collect();
        assert_eq!(keys, vec!["battery storage", "broken question", "storage costs"]);
        assert!(outcome.output["broken question"].is_empty());
        assert_eq!(outcome.output["battery storage"].len(), 3);
        assert_eq!(outcome.gaps.len(), 1);
        assert_eq!(outcome.gaps[0].sub_question.as_deref(), Some("broken question"));
    }

    #[tokio::test]
    async fn all_subquestions_failing_falls_back() {
        let mut search = MockSearchBackend::new();
        search
            .expect_search()
            .returning(|_| Err(CapabilityError::Failed("down".into())));

        let outcome = stage(search, content_extractor())
            .execute(input(&["a question", "b question"]))
            .await;

        assert!(outcome.fell_back);
        assert_eq!(outcome.gaps.len(), 2);
        assert!(outcome.output.values().all(Vec::is_empty));
    }

    #[tokio::test]
    async fn sparse_results_trigger_broadened_search() {
        let mut search = MockSearchBackend::new();
        search
            .expect_search()
            .withf(|q| q == "grid batteries")
            .times(1)
            .returning(|_| Ok(vec![hit("https://a.example/1", "Grid batteries")]));
        search
            .expect_search()
            .withf(|q| q == "grid batteries overview guide")
            .times(1)
            .returning(|_| {
                Ok(vec![
                    hit("https://a.example/1", "Duplicate"),
                    hit("https://b.example/empty", "Empty page"),
                    hit("https://c.example/gone", "Gone page"),
                    hit("not a url", "Broken"),
                    hit("https://d.example/2", "More batteries"),
                ])
            });

        let outcome = stage(search, content_extractor())
            .execute(input(&["grid batteries"]))
            .await;

        let urls: Vec<_> = outcome.output["grid batteries"]
            .iter()
            .map(|s| s.url.as_str().to_string())
            .collect();
        assert_eq!(urls.len(), 2);
        assert!(urls.contains(&"https://a.example/1".to_string()));
        assert!(urls.contains(&"https://d.example/2".to_string()));
        assert!(outcome.gaps.is_empty());
    }

    #[tokio::test]
    async fn sources_are_ranked_cut_and_truncated() {
        let mut search = MockSearchBackend::new();
        search.expect_search().returning(|_| {
            Ok((0..8)
                .map(|i| {
                    let title = if i == 7 { "solar panel efficiency" } else { "misc" };
                    hit(&format!("https://s{i}.example/"), title)
                })
                .collect())
        });
        let mut extractor = MockContentExtractor::new();
        extractor
            .expect_extract_content()
            .returning(|_| Ok(Extraction::Content("word ".repeat(500))));

        let outcome = stage(search, extractor)
            .execute(input(&["solar panel efficiency"]))
            .await;
        let sources = &outcome.output["solar panel efficiency"];

        assert_eq!(sources.len(), 5);
        assert_eq!(sources[0].url.as_str(), "https://s7.example/");
        assert_eq!(sources[1].url.as_str(), "https://s0.example/");
        assert!(sources.iter().all(|s| s.extracted_content.chars().count() <= 600));
    }

    struct SlowExtractor;

    #[async_trait]
    impl ContentExtractor for SlowExtractor {
        async fn extract_content(&self, url: &str) -> Result<Extraction, CapabilityError> {
            if url.contains("slow") {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok(Extraction::Content("battery storage".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_extraction_is_rejected() {
        let mut search = MockSearchBackend::new();
        search.expect_search().returning(|_| {
            Ok(vec![
                hit("https://fast.example/a", "Fast"),
                hit("https://slow.example/b", "Slow"),
                hit("https://fast.example/c", "Fast too"),
            ])
        });

        let outcome = stage(search, SlowExtractor).execute(input(&["battery storage"])).await;
        let sources = &outcome.output["battery storage"];
        assert_eq!(sources.len(), 2);
        assert!(sources.iter().all(|s| !s.url.as_str().contains("slow")));
    }
}
