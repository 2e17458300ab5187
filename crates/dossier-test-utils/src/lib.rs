//! Testing utilities for the Dossier workspace
//!
//! Scripted, deterministic capability adapters plus fixture helpers. Each
//! adapter can be told to fail so tests can drive every fallback path.

#![allow(missing_docs)]

use async_trait::async_trait;
use dossier_core::{
    Capabilities, CapabilityError, ContentExtractor, DraftReport, Extraction, FindingSynthesizer,
    PipelineConfig, PipelineOrchestrator, QueryGenerator, ReportWriter, SearchBackend, SearchHit,
    WriteRequest,
};
use dossier_model::{
    Category, Confidence, ExecutiveSummary, Expertise, Finding, Impact, Report, Source, Timeline,
};
use dossier_store::{FileSessionStore, MemorySessionStore, SessionStore};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DOMAINS: [&str; 3] = ["energy.gov", "nrel.gov", "iea.org"];

// ---------------------------------------------------------------------------
// Query generation
// ---------------------------------------------------------------------------

/// Returns a fixed question list, or fails
#[derive(Debug, Clone, Default)]
pub struct ScriptedQueryGenerator {
    questions: Option<Vec<String>>,
}

impl ScriptedQueryGenerator {
    /// Five topic-shaped questions
    pub fn for_topic(topic: &str) -> Self {
        Self::answering(vec![
            format!("What is {topic}?"),
            format!("What are the main risks of {topic}?"),
            format!("What benefits does {topic} offer?"),
            format!("How much does {topic} cost?"),
            format!("Which trends shape {topic}?"),
        ])
    }

    pub fn answering(questions: Vec<String>) -> Self {
        Self {
            questions: Some(questions),
        }
    }

    pub fn failing() -> Self {
        Self { questions: None }
    }
}

#[async_trait]
impl QueryGenerator for ScriptedQueryGenerator {
    async fn generate_subquestions(
        &self,
        _topic: &str,
        _expertise: Expertise,
    ) -> Result<Vec<String>, CapabilityError> {
        self.questions
            .clone()
            .ok_or_else(|| CapabilityError::Failed("query generator unavailable".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Deterministic search results; selected queries fail
#[derive(Debug, Default)]
pub struct FakeSearch {
    hits_per_query: usize,
    failing: HashSet<String>,
    fail_all: bool,
    delay: Option<Duration>,
    cancel_on_search: Option<CancellationToken>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeSearch {
    pub fn new(hits_per_query: usize) -> Self {
        Self {
            hits_per_query,
            ..Self::default()
        }
    }

    /// Fail any query containing `needle`
    #[must_use]
    pub fn failing_on(mut self, needle: impl Into<String>) -> Self {
        self.failing.insert(needle.into());
        self
    }

    #[must_use]
    pub fn failing_all(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Sleep before answering (to observe concurrency)
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Cancel `token` as soon as any search runs (results are still returned)
    #[must_use]
    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel_on_search = Some(token);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn hits_for(&self, query: &str) -> Vec<SearchHit> {
        // Titles stay free of sentence punctuation so citations never split a sentence
        let words: Vec<String> = query
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();
        let slug = words.join("-");
        let phrase = words.join(" ");
        (0..self.hits_per_query)
            .map(|i| {
                SearchHit::new(
                    format!("https://{}/{slug}/{i}", DOMAINS[i % DOMAINS.len()]),
                    format!("Brief {i} on {phrase}"),
                    format!("Overview of {phrase}"),
                )
            })
            .collect()
    }
}

#[async_trait]
impl SearchBackend for FakeSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = &self.cancel_on_search {
            token.cancel();
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_all || self.failing.iter().any(|n| query.contains(n.as_str())) {
            return Err(CapabilityError::Failed(format!("search failed for '{query}'")));
        }
        Ok(self.hits_for(query))
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Returns topical text for every URL except those containing `unavailable`
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeExtractor;

#[async_trait]
impl ContentExtractor for FakeExtractor {
    async fn extract_content(&self, url: &str) -> Result<Extraction, CapabilityError> {
        if url.contains("unavailable") {
            return Ok(Extraction::Unavailable);
        }
        Ok(Extraction::Content(format!(
            "Page {url}. Energy storage systems face fire and safety risks, supply \
             challenges and falling costs. Accept cookies. Grid operators report \
             reliability benefits and growing deployment across industries."
        )))
    }
}

// ---------------------------------------------------------------------------
// Finding synthesis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisMode {
    /// Three findings citing real sources
    Grounded,
    /// One finding citing a URL outside the session
    Hallucinating,
    Failing,
}

#[derive(Debug, Clone, Copy)]
pub struct FakeSynthesizer {
    pub mode: SynthesisMode,
}

impl FakeSynthesizer {
    pub fn grounded() -> Self {
        Self {
            mode: SynthesisMode::Grounded,
        }
    }

    pub fn hallucinating() -> Self {
        Self {
            mode: SynthesisMode::Hallucinating,
        }
    }

    pub fn failing() -> Self {
        Self {
            mode: SynthesisMode::Failing,
        }
    }
}

#[async_trait]
impl FindingSynthesizer for FakeSynthesizer {
    async fn synthesize_findings(&self, sources: &[Source]) -> Result<Vec<Finding>, CapabilityError> {
        match self.mode {
            SynthesisMode::Failing => Err(CapabilityError::Failed("synthesis failed".to_string())),
            SynthesisMode::Hallucinating => Ok(vec![finding(
                Category::Risk,
                "Invented hazard",
                vec![dossier_model::Url::parse("https://invented.example/").map_err(capability_err)?],
            )?]),
            SynthesisMode::Grounded => {
                if sources.is_empty() {
                    return Ok(Vec::new());
                }
                let urls: Vec<_> = sources.iter().map(|s| s.url.clone()).collect();
                let last = urls.len() - 1;
                Ok(vec![
                    finding(Category::Risk, "Fire and safety risks", urls.iter().take(2).cloned().collect())?,
                    finding(Category::Opportunity, "Grid reliability benefits", vec![urls[last / 2].clone()])?,
                    finding(Category::Trend, "Falling storage costs", vec![urls[last].clone()])?,
                ])
            }
        }
    }
}

fn capability_err(e: impl std::fmt::Display) -> CapabilityError {
    CapabilityError::Failed(e.to_string())
}

fn finding(
    category: Category,
    title: &str,
    evidence: Vec<dossier_model::Url>,
) -> Result<Finding, CapabilityError> {
    Finding::new(category, title, Impact::High, Timeline::MediumTerm, evidence, Confidence::Medium)
        .map_err(capability_err)
}

// ---------------------------------------------------------------------------
// Report writing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterMode {
    /// Numbered citations for every finding
    Cited,
    /// Restates findings without citations
    Uncited,
    Failing,
}

#[derive(Debug, Clone, Copy)]
pub struct FakeWriter {
    pub mode: WriterMode,
}

impl FakeWriter {
    pub fn cited() -> Self {
        Self {
            mode: WriterMode::Cited,
        }
    }

    pub fn uncited() -> Self {
        Self {
            mode: WriterMode::Uncited,
        }
    }

    pub fn failing() -> Self {
        Self {
            mode: WriterMode::Failing,
        }
    }
}

#[async_trait]
impl ReportWriter for FakeWriter {
    async fn write_report(&self, request: &WriteRequest) -> Result<DraftReport, CapabilityError> {
        if self.mode == WriterMode::Failing {
            return Err(CapabilityError::Failed("writer unavailable".to_string()));
        }

        let mut md = String::new();
        let _ = writeln!(md, "# {}\n", request.topic);
        let _ = writeln!(md, "## Executive Summary\n");
        let _ = writeln!(md, "Research on {} gathered {} sources.\n", request.topic, request.sources.len());
        let _ = writeln!(md, "## Introduction\n");
        let _ = writeln!(md, "{}\n", request.guidance);
        let _ = writeln!(md, "## Key Findings\n");
        for f in &request.findings {
            let cite = f
                .evidence()
                .iter()
                .filter_map(|u| request.sources.iter().position(|s| &s.url == u))
                .map(|i| (i + 1).to_string())
                .collect::<Vec<_>>()
                .join(", ");
            if self.mode == WriterMode::Cited {
                let _ = writeln!(md, "- {} ({} impact) [{cite}].", f.title, f.impact);
            } else {
                let _ = writeln!(md, "- {} ({} impact).", f.title, f.impact);
            }
        }
        let _ = writeln!(md, "\n## Risks and Challenges\n");
        let risks = request
            .findings
            .iter()
            .filter(|f| f.category == Category::Risk)
            .count();
        let _ = writeln!(md, "The analysis identified {risks} risk areas, chiefly safety hazards and supply challenges.\n");
        let _ = writeln!(md, "## Conclusion\n");
        let _ = writeln!(md, "Adoption continues.\n");
        let _ = writeln!(md, "## Sources\n");
        for (i, s) in request.sources.iter().enumerate() {
            let _ = writeln!(md, "{}. [{}]({})", i + 1, s.display_title(), s.url);
        }

        Ok(DraftReport {
            markdown: md,
            report: Report::new(
                request.topic.clone(),
                ExecutiveSummary {
                    key_points: request.findings.iter().map(|f| f.title.clone()).collect(),
                    overall_assessment: format!("{} findings", request.findings.len()),
                },
                &request.findings,
                &request.sources,
            ),
        })
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Builder for a capability bundle; defaults are the happy path
#[derive(Debug)]
pub struct CapabilitySet {
    pub query_generator: ScriptedQueryGenerator,
    pub search: Arc<FakeSearch>,
    pub synthesizer: FakeSynthesizer,
    pub writer: FakeWriter,
}

impl CapabilitySet {
    pub fn happy(topic: &str) -> Self {
        Self {
            query_generator: ScriptedQueryGenerator::for_topic(topic),
            search: Arc::new(FakeSearch::new(4)),
            synthesizer: FakeSynthesizer::grounded(),
            writer: FakeWriter::cited(),
        }
    }

    /// Every capability fails
    pub fn broken() -> Self {
        Self {
            query_generator: ScriptedQueryGenerator::failing(),
            search: Arc::new(FakeSearch::new(0).failing_all()),
            synthesizer: FakeSynthesizer::failing(),
            writer: FakeWriter::failing(),
        }
    }

    #[must_use]
    pub fn with_search(mut self, search: FakeSearch) -> Self {
        self.search = Arc::new(search);
        self
    }

    #[must_use]
    pub fn with_query_generator(mut self, generator: ScriptedQueryGenerator) -> Self {
        self.query_generator = generator;
        self
    }

    #[must_use]
    pub fn with_synthesizer(mut self, synthesizer: FakeSynthesizer) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    #[must_use]
    pub fn with_writer(mut self, writer: FakeWriter) -> Self {
        self.writer = writer;
        self
    }

    pub fn build(&self) -> Capabilities {
        Capabilities {
            query_generator: Arc::new(self.query_generator.clone()),
            search: Arc::clone(&self.search) as Arc<dyn SearchBackend>,
            extractor: Arc::new(FakeExtractor),
            synthesizer: Arc::new(self.synthesizer),
            writer: Arc::new(self.writer),
        }
    }
}

/// Orchestrator over an in-memory store
pub fn memory_pipeline(set: &CapabilitySet) -> (PipelineOrchestrator, Arc<MemorySessionStore>) {
    let store = Arc::new(MemorySessionStore::new());
    let pipeline = PipelineOrchestrator::new(
        set.build(),
        Arc::clone(&store) as Arc<dyn SessionStore>,
        PipelineConfig::default(),
    )
    .unwrap();
    (pipeline, store)
}

/// Orchestrator over a file store in a fresh temp dir
pub async fn file_pipeline(
    set: &CapabilitySet,
) -> (PipelineOrchestrator, Arc<FileSessionStore>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileSessionStore::open(dir.path()).await.unwrap());
    let pipeline = PipelineOrchestrator::new(
        set.build(),
        Arc::clone(&store) as Arc<dyn SessionStore>,
        PipelineConfig::default(),
    )
    .unwrap();
    (pipeline, store, dir)
}
