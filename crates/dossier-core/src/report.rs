//! Report rendering and citation checks
//!
//! - [`render_template`]: deterministic Markdown report built straight from
//!   findings and sources (the Write fallback)
//! - [`validate_citations`]: rewrites numbered citations to inline links and
//!   rejects drafts that cite unknown sources or leave findings uncited
//! - [`ReportStats`]: word, citation and section counts

use crate::capability::WriteRequest;
use crate::error::StageError;
use dossier_model::{
    aggregate_confidence, Category, ExecutiveSummary, Finding, Report, ReportArtifacts, Source,
};
use once_cell::sync::Lazy;
use pulldown_cmark::{Event, Options, Parser, Tag};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::ops::Range;
use url::Url;

static NUMBERED_CITATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\^?(\d+(?:\s*,\s*\d+)*)\]").expect("valid citation pattern"));

static SENTENCE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?](?:\s+|$)").expect("valid sentence pattern"));

/// Words whose trailing period does not end a sentence
const ABBREVIATIONS: &[&str] = &["e.g", "i.e", "etc", "vs", "cf", "al", "approx", "fig", "no"];

/// Link destination and its byte span in the document
#[derive(Debug)]
struct Link {
    dest: String,
    span: Range<usize>,
}

fn links(markdown: &str) -> Vec<Link> {
    Parser::new_ext(markdown, Options::ENABLE_TABLES)
        .into_offset_iter()
        .filter_map(|(event, span)| match event {
            Event::Start(Tag::Link { dest_url, .. }) => Some(Link {
                dest: dest_url.into_string(),
                span,
            }),
            _ => None,
        })
        .collect()
}

/// Report size statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportStats {
    /// Whitespace-separated words
    pub word_count: usize,
    /// Inline links to absolute URLs
    pub citation_count: usize,
    /// Markdown headings
    pub section_count: usize,
}

impl ReportStats {
    /// Compute statistics for `markdown`
    #[must_use]
    pub fn of(markdown: &str) -> Self {
        let mut citation_count = 0;
        let mut section_count = 0;
        for event in Parser::new_ext(markdown, Options::ENABLE_TABLES) {
            match event {
                Event::Start(Tag::Link { dest_url, .. }) if Url::parse(&dest_url).is_ok() => {
                    citation_count += 1;
                }
                Event::Start(Tag::Heading { .. }) => section_count += 1,
                _ => {}
            }
        }

        Self {
            word_count: markdown.split_whitespace().count(),
            citation_count,
            section_count,
        }
    }
}

/// Inline citation for `source`
#[must_use]
pub fn inline_citation(source: &Source) -> String {
    let title = source.display_title().replace('[', "(").replace(']', ")");
    let url = source.url.as_str();
    if url.contains(['(', ')']) {
        format!("[{title}](<{url}>)")
    } else {
        format!("[{title}]({url})")
    }
}

/// Check and normalize the citations of a drafted report
///
/// Numbered markers (`[3]`, `[^3]`, `[1, 2]`) are resolved 1-based into
/// `sources` and rewritten as inline links. Every inline link must point
/// at a session source, every sentence naming a finding must carry a
/// citation, and a report with findings must cite at least once.
///
/// # Errors
/// `StageError::InvalidOutput` describing the first violation.
pub fn validate_citations(
    markdown: &str,
    sources: &[Source],
    findings: &[Finding],
) -> Result<String, StageError> {
    let rewritten = rewrite_numbered_citations(markdown, sources)?;

    let links = links(&rewritten);
    let mut citations = 0usize;
    for link in &links {
        let target = link.dest.as_str();
        if target.starts_with('#') {
            continue;
        }
        let url = Url::parse(target)
            .map_err(|_| StageError::InvalidOutput(format!("link target is not a URL: {target}")))?;
        if !sources.iter().any(|s| s.url == url) {
            return Err(StageError::InvalidOutput(format!(
                "link to unknown source: {url}"
            )));
        }
        citations += 1;
    }

    if !findings.is_empty() && citations == 0 {
        return Err(StageError::InvalidOutput(
            "report has findings but no citations".to_string(),
        ));
    }

    check_claims_cited(&rewritten, &links, findings)?;
    Ok(rewritten)
}

fn rewrite_numbered_citations(markdown: &str, sources: &[Source]) -> Result<String, StageError> {
    let mut out = String::with_capacity(markdown.len());
    let mut last = 0;

    for caps in NUMBERED_CITATION.captures_iter(markdown) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        // `[1](url)` is an inline link with numeric text
        if markdown[whole.end()..].starts_with('(') {
            continue;
        }

        let links = resolve_numbers(&caps, sources)?;
        out.push_str(&markdown[last..whole.start()]);
        out.push_str(&links.join(", "));
        last = whole.end();
    }

    out.push_str(&markdown[last..]);
    Ok(out)
}

fn resolve_numbers(caps: &Captures<'_>, sources: &[Source]) -> Result<Vec<String>, StageError> {
    caps[1]
        .split(',')
        .map(|n| {
            let n: usize = n
                .trim()
                .parse()
                .map_err(|_| StageError::InvalidOutput(format!("bad citation number: {n}")))?;
            n.checked_sub(1)
                .and_then(|idx| sources.get(idx))
                .map(inline_citation)
                .ok_or_else(|| {
                    StageError::InvalidOutput(format!(
                        "citation [{n}] out of range (1..={})",
                        sources.len()
                    ))
                })
        })
        .collect()
}

fn check_claims_cited(markdown: &str, links: &[Link], findings: &[Finding]) -> Result<(), StageError> {
    let titles: Vec<(String, &str)> = findings
        .iter()
        .map(|f| (f.title.to_lowercase(), f.title.as_str()))
        .collect();
    let cited = |span: &Range<usize>| {
        links
            .iter()
            .any(|l| l.span.start < span.end && l.span.end > span.start)
    };

    let mut offset = 0;
    for line in markdown.split_inclusive('\n') {
        let base = offset;
        offset += line.len();
        if line.trim_start().starts_with('#') {
            continue;
        }

        for sentence in sentences(line, base, links) {
            let lower = markdown[sentence.clone()].to_lowercase();
            let uncited = titles
                .iter()
                .find(|(needle, _)| lower.contains(needle.as_str()))
                .filter(|_| !cited(&sentence));
            if let Some((_, title)) = uncited {
                return Err(StageError::InvalidOutput(format!("uncited claim: {title}")));
            }
        }
    }
    Ok(())
}

/// Sentence spans of `line` (absolute offsets from `base`)
///
/// A sentence end never falls inside a link, after a known abbreviation or
/// before a lowercase continuation. A segment holding nothing but links
/// belongs to the sentence before it, so `Claim. [1]` counts as cited.
fn sentences(line: &str, base: usize, links: &[Link]) -> Vec<Range<usize>> {
    let mut spans: Vec<Range<usize>> = Vec::new();
    let mut start = 0;

    let ends = SENTENCE_END.find_iter(line).filter(|m| {
        let at = base + m.start();
        !links.iter().any(|l| l.span.contains(&at))
            && !ends_with_abbreviation(&line[..m.start()])
            && !line[m.end()..].starts_with(char::is_lowercase)
    });
    for end in ends.map(|m| m.end()).chain(std::iter::once(line.len())) {
        if end <= start {
            continue;
        }
        let span = base + start..base + end;
        start = end;

        match spans.last_mut() {
            Some(previous) if only_links(line, base, &span, links) => previous.end = span.end,
            _ => spans.push(span),
        }
    }
    spans
}

fn ends_with_abbreviation(prefix: &str) -> bool {
    let word = prefix
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or_default()
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    ABBREVIATIONS.contains(&word.as_str())
}

/// Whether `span` holds only links, whitespace and punctuation
fn only_links(line: &str, base: usize, span: &Range<usize>, links: &[Link]) -> bool {
    let mut has_link = false;
    let mut rest = String::new();
    let mut at = span.start;
    for link in links.iter().filter(|l| l.span.start >= span.start && l.span.end <= span.end) {
        rest.push_str(&line[at - base..link.span.start - base]);
        at = link.span.end;
        has_link = true;
    }
    rest.push_str(&line[at - base..span.end - base]);
    has_link && rest.chars().all(|c| c.is_whitespace() || c.is_ascii_punctuation())
}

/// Templated report built from findings and sources, no narrative
#[must_use]
pub fn render_template(request: &WriteRequest) -> ReportArtifacts {
    let WriteRequest {
        topic,
        expertise,
        findings,
        sources,
        ..
    } = request;
    let confidence = aggregate_confidence(findings);

    let summary = ExecutiveSummary {
        key_points: findings.iter().take(5).map(|f| f.title.clone()).collect(),
        overall_assessment: if findings.is_empty() {
            format!("No findings could be established for {topic} from {} sources.", sources.len())
        } else {
            format!(
                "{} finding(s) drawn from {} source(s), overall confidence {confidence}.",
                findings.len(),
                sources.len()
            )
        },
    };

    let mut md = String::new();
    let _ = writeln!(md, "# Research Report: {topic}\n");
    let _ = writeln!(md, "*Prepared for {expertise} readers.*\n");

    let _ = writeln!(md, "## Executive Summary\n");
    let _ = writeln!(md, "{}\n", summary.overall_assessment);
    for finding in findings.iter().take(5) {
        let _ = writeln!(md, "- {} ({})", finding.title, evidence_links(finding, sources));
    }
    if !findings.is_empty() {
        md.push('\n');
    }

    let _ = writeln!(md, "## Introduction\n");
    let _ = writeln!(
        md,
        "This report covers {topic}. It lists the synthesized findings with their supporting \
         sources.\n"
    );

    let _ = writeln!(md, "## Key Findings\n");
    if findings.is_empty() {
        let _ = writeln!(md, "No findings could be synthesized from the collected sources.\n");
    } else {
        for finding in findings {
            let _ = writeln!(
                md,
                "- **{}** ({}): {} with {} impact, {} timeline, {} confidence",
                finding.title,
                evidence_links(finding, sources),
                finding.category,
                finding.impact,
                finding.timeline,
                finding.confidence
            );
        }
        md.push('\n');
    }

    let _ = writeln!(md, "## Analysis\n");
    if findings.is_empty() {
        let _ = writeln!(md, "There is not enough evidence for analysis.\n");
    } else {
        for category in [Category::Risk, Category::Opportunity, Category::Trend, Category::Insight] {
            let count = findings.iter().filter(|f| f.category == category).count();
            if count > 0 {
                let _ = writeln!(md, "- {}: {count}", category_label(category));
            }
        }
        md.push('\n');
    }

    let _ = writeln!(md, "## Conclusion\n");
    let _ = writeln!(md, "Overall confidence in these findings is {confidence}.\n");

    let _ = writeln!(md, "## Sources\n");
    if sources.is_empty() {
        let _ = writeln!(md, "No sources were collected.");
    }
    for (i, source) in sources.iter().enumerate() {
        let _ = writeln!(
            md,
            "{}. {} (reliability {:.2}, accessed {})",
            i + 1,
            inline_citation(source),
            source.reliability_score,
            source.date_accessed.format("%Y-%m-%d")
        );
    }

    ReportArtifacts {
        markdown: md,
        json: Report::new(topic.clone(), summary, findings, sources),
        templated: true,
    }
}

fn evidence_links(finding: &Finding, sources: &[Source]) -> String {
    finding
        .evidence()
        .iter()
        .filter_map(|url| sources.iter().find(|s| &s.url == url))
        .map(inline_citation)
        .collect::<Vec<_>>()
        .join(", ")
}

fn category_label(category: Category) -> &'static str {
    match category {
        Category::Risk => "Risks",
        Category::Opportunity => "Opportunities",
        Category::Trend => "Trends",
        Category::Insight => "Insights",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_model::{Confidence, Expertise, Impact, Timeline};
    use pretty_assertions::assert_eq;

    fn sources() -> Vec<Source> {
        vec![
            Source::new("https://nrel.gov/storage", "NREL storage study", "body", 0.9).unwrap(),
            Source::new("https://iea.org/batteries", "IEA [2024] outlook", "body", 0.7).unwrap(),
        ]
    }

    fn fire_finding() -> Finding {
        Finding::new(
            Category::Risk,
            "Thermal runaway risk",
            Impact::High,
            Timeline::Ongoing,
            vec![Url::parse("https://nrel.gov/storage").unwrap()],
            Confidence::Medium,
        )
        .unwrap()
    }

    #[test]
    fn numbered_citations_are_rewritten() {
        let md = "Costs fell sharply [2]. Both agree [1, 2]. Footnote style [^1].";
        let out = validate_citations(md, &sources(), &[]).unwrap();
        assert_eq!(
            out,
            "Costs fell sharply [IEA (2024) outlook](https://iea.org/batteries). \
             Both agree [NREL storage study](https://nrel.gov/storage), [IEA (2024) outlook](https://iea.org/batteries). \
             Footnote style [NREL storage study](https://nrel.gov/storage)."
        );
    }

    #[test]
    fn out_of_range_number_is_rejected() {
        let err = validate_citations("Claim [3].", &sources(), &[]).unwrap_err();
        assert!(matches!(err, StageError::InvalidOutput(ref m) if m.contains("[3]")));
        assert!(validate_citations("Claim [0].", &sources(), &[]).is_err());
    }

    #[test]
    fn unknown_link_is_rejected() {
        let err = validate_citations("See [blog](https://elsewhere.example/x).", &sources(), &[]).unwrap_err();
        assert!(matches!(err, StageError::InvalidOutput(ref m) if m.contains("unknown source")));
    }

    #[test]
    fn anchor_links_are_allowed() {
        assert!(validate_citations("See [below](#sources).", &sources(), &[]).is_ok());
    }

    #[test]
    fn findings_need_citations() {
        let err = validate_citations("No links here.", &sources(), &[fire_finding()]).unwrap_err();
        assert!(matches!(err, StageError::InvalidOutput(ref m) if m.contains("no citations")));
    }

    #[test]
    fn claim_sentence_must_cite() {
        let md = "Thermal runaway risk is real. Other text [1].";
        let err = validate_citations(md, &sources(), &[fire_finding()]).unwrap_err();
        assert!(matches!(err, StageError::InvalidOutput(ref m) if m.contains("Thermal runaway risk")));

        let cited = "Thermal runaway risk is real [1]. Other text.";
        assert!(validate_citations(cited, &sources(), &[fire_finding()]).is_ok());
    }

    #[test]
    fn headings_naming_findings_are_exempt() {
        let md = "## Thermal runaway risk\n\nSee the study [1].";
        assert!(validate_citations(md, &sources(), &[fire_finding()]).is_ok());
    }

    #[test]
    fn template_passes_its_own_checks() {
        let request = WriteRequest {
            topic: "grid storage".to_string(),
            expertise: Expertise::Expert,
            guidance: String::new(),
            findings: vec![fire_finding()],
            sources: sources(),
        };
        let artifacts = render_template(&request);

        assert!(artifacts.templated);
        validate_citations(&artifacts.markdown, &request.sources, &request.findings).unwrap();
        assert_eq!(artifacts.json.findings, request.findings);
        assert_eq!(artifacts.json.sources.len(), 2);
        for section in ["Executive Summary", "Introduction", "Key Findings", "Analysis", "Conclusion", "Sources"] {
            assert!(artifacts.markdown.contains(&format!("## {section}")), "missing {section}");
        }
    }

    #[test]
    fn template_without_findings_or_sources() {
        let request = WriteRequest {
            topic: "nothing".to_string(),
            expertise: Expertise::Beginner,
            guidance: String::new(),
            findings: Vec::new(),
            sources: Vec::new(),
        };
        let artifacts = render_template(&request);
        assert!(artifacts.markdown.contains("No sources were collected."));
        assert_eq!(artifacts.json.metadata.confidence_level, Confidence::Low);
    }

    fn wiki_source() -> Source {
        Source::new(
            "https://en.wikipedia.org/wiki/Battery_(electricity)",
            "Battery",
            "body",
            0.6,
        )
        .unwrap()
    }

    #[test]
    fn link_with_parentheses_resolves() {
        let md = "Batteries store energy [Battery](https://en.wikipedia.org/wiki/Battery_(electricity)).";
        let out = validate_citations(md, &[wiki_source()], &[]).unwrap();
        assert_eq!(out, md);
        assert_eq!(ReportStats::of(md).citation_count, 1);
    }

    #[test]
    fn numbered_citation_to_parenthesized_url_round_trips() {
        let finding = Finding::new(
            Category::Insight,
            "Batteries store energy",
            Impact::Low,
            Timeline::Ongoing,
            vec![wiki_source().url],
            Confidence::Low,
        )
        .unwrap();
        let out = validate_citations("Batteries store energy [1].", &[wiki_source()], &[finding]).unwrap();
        assert!(out.contains("(<https://en.wikipedia.org/wiki/Battery_(electricity)>)"));
    }

    #[test]
    fn citation_after_sentence_end_counts() {
        let md = "Thermal runaway risk is well documented. [1]\n";
        assert!(validate_citations(md, &sources(), &[fire_finding()]).is_ok());

        let abbreviated = "Thermal runaway risk, e.g. in dense packs, grows with heat [1].";
        assert!(validate_citations(abbreviated, &sources(), &[fire_finding()]).is_ok());
    }

    #[test]
    fn punctuation_inside_link_title_does_not_split() {
        let md = "Thermal runaway risk [Is it safe? Notes. v2](https://nrel.gov/storage).";
        assert!(validate_citations(md, &sources(), &[fire_finding()]).is_ok());
    }

    #[test]
    fn stats_count_words_links_and_headings() {
        let md = "# Title\n\nSome words [a](https://a.example) and [b](#local).\n\n## Next\n";
        let stats = ReportStats::of(md);
        assert_eq!(stats.section_count, 2);
        assert_eq!(stats.citation_count, 1);
        assert_eq!(stats.word_count, 9);
    }
}
