//! Source relevance scoring and content cleaning for the scout stage
//!
//! Score components (weights sum to at most 1.0):
//! - title word overlap: 0.35
//! - content word overlap: 0.40
//! - snippet word overlap: 0.15
//! - exact query phrase in title / content: 0.05 each
//! - content longer than 500 characters: 0.05

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

const TITLE_WEIGHT: f64 = 0.35;
const CONTENT_WEIGHT: f64 = 0.40;
const SNIPPET_WEIGHT: f64 = 0.15;
const PHRASE_BONUS: f64 = 0.05;
const LENGTH_BONUS: f64 = 0.05;
const LENGTH_BONUS_MIN_CHARS: usize = 500;

static BOILERPLATE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(accept|we use)\s+(all\s+)?cookies\b",
        r"(?i)\b(cookie|privacy)\s+policy\b",
        r"(?i)\bterms\s+(of|and)\s+(service|use|conditions)\b",
        r"(?i)\bsign\s*up\b",
        r"(?i)\blog\s*in\b",
        r"(?i)\bsubscribe(\s+to\s+our\s+newsletter)?\b",
        r"(?i)\bnewsletter\b",
        r"(?i)\ball\s+rights\s+reserved\b",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("valid boilerplate pattern"))
    .collect()
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Collapse whitespace and strip boilerplate phrases
#[must_use]
pub fn clean_content(raw: &str) -> String {
    let mut text = WHITESPACE.replace_all(raw, " ").into_owned();
    for pattern in BOILERPLATE.iter() {
        text = pattern.replace_all(&text, "").into_owned();
    }
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

fn words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn overlap_ratio(query: &HashSet<String>, other: &HashSet<String>) -> f64 {
    query.intersection(other).count() as f64 / query.len() as f64
}

/// Relevance of a source to `query`, in `0.0..=1.0`
#[must_use]
pub fn relevance_score(query: &str, title: &str, snippet: &str, content: &str) -> f64 {
    let query_words = words(query);
    if query_words.is_empty() {
        return 0.0;
    }

    let mut score = TITLE_WEIGHT * overlap_ratio(&query_words, &words(title))
        + CONTENT_WEIGHT * overlap_ratio(&query_words, &words(content))
        + SNIPPET_WEIGHT * overlap_ratio(&query_words, &words(snippet));

    let phrase = query.trim().to_lowercase();
    if title.to_lowercase().contains(&phrase) {
        score += PHRASE_BONUS;
    }
    if content.to_lowercase().contains(&phrase) {
        score += PHRASE_BONUS;
    }

    if content.chars().count() > LENGTH_BONUS_MIN_CHARS {
        score += LENGTH_BONUS;
    }

    score.min(1.0)
}
