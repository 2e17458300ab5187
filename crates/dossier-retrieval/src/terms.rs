//! Query and section term extraction
//!
//! Terms are lowercase alphanumeric words with simple plural folding and
//! English stop-words removed. Query terms are expanded through a fixed,
//! bidirectional synonym table.

use once_cell::sync::Lazy;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Distinct terms of a text, ordered
pub type TermSet = BTreeSet<String>;

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "after", "all", "also", "am", "an", "and", "any", "are", "as", "at", "be",
        "been", "being", "but", "by", "can", "could", "did", "do", "does", "doing", "during",
        "each", "explain", "for", "from", "give", "had", "has", "have", "how", "i", "if", "in",
        "into", "is", "it", "its", "just", "me", "more", "most", "my", "no", "not", "of", "on",
        "or", "other", "our", "over", "please", "should", "so", "some", "such", "tell", "than",
        "that", "the", "their", "them", "then", "there", "these", "they", "this", "those", "to",
        "under", "up", "very", "was", "we", "were", "what", "when", "where", "which", "while",
        "who", "whom", "why", "will", "with", "would", "you", "your",
    ]
    .into_iter()
    .collect()
});

/// Synonym groups; every member maps to every other member
const SYNONYM_GROUPS: &[&[&str]] = &[
    &["risk", "danger", "threat", "hazard", "challenge", "concern"],
    &["benefit", "advantage", "value", "improvement", "upside"],
    &["application", "use", "usage", "deployment", "applied"],
    &["growth", "expansion", "increase", "development", "driver"],
    &["industry", "sector", "business", "field", "market"],
    &["trend", "future", "outlook", "projection", "forecast"],
    &["cost", "price", "expense", "economics", "affordability"],
    &["limitation", "drawback", "weakness", "constraint", "barrier"],
    &["opportunity", "prospect", "potential"],
    &["regulation", "policy", "law", "standard"],
];

static SYNONYMS: Lazy<HashMap<String, TermSet>> = Lazy::new(|| {
    let mut table: HashMap<String, TermSet> = HashMap::new();
    for group in SYNONYM_GROUPS {
        let folded: Vec<String> = group.iter().map(|w| fold_plural(w)).collect();
        for word in &folded {
            let entry = table.entry(word.clone()).or_default();
            entry.extend(folded.iter().filter(|w| *w != word).cloned());
        }
    }
    table
});

/// Whether `word` (lowercase) is a stop-word
#[inline]
#[must_use]
pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(word)
}

/// Fold a simple English plural to its singular
///
/// `batteries -> battery`, `risks -> risk`; words ending in `ss`, `us` or
/// `is` and words of three letters or fewer are left alone.
#[must_use]
pub fn fold_plural(word: &str) -> String {
    if word.len() <= 3 {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{stem}y");
    }
    if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return word.to_string();
    }
    word.strip_suffix('s').unwrap_or(word).to_string()
}

/// Lowercase, fold and filter the words of `text` in order
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .filter(|w| !is_stop_word(w))
        .map(|w| fold_plural(&w))
        .filter(|w| !is_stop_word(w))
}

/// Distinct terms of `text`
#[must_use]
pub fn term_set(text: &str) -> TermSet {
    tokenize(text).collect()
}

/// Synonyms of a folded term
#[must_use]
pub fn synonyms(term: &str) -> Option<&'static TermSet> {
    SYNONYMS.get(term)
}

/// Query terms of `question` plus their synonyms
#[must_use]
pub fn expand_query(question: &str) -> TermSet {
    let terms = term_set(question);
    let mut expanded = terms.clone();
    for term in &terms {
        if let Some(extra) = synonyms(term) {
            expanded.extend(extra.iter().cloned());
        }
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(words: &[&str]) -> TermSet {
        words.iter().map(|w| (*w).to_string()).collect()
    }

    #[test]
    fn plural_folding() {
        assert_eq!(fold_plural("risks"), "risk");
        assert_eq!(fold_plural("batteries"), "battery");
        assert_eq!(fold_plural("process"), "process");
        assert_eq!(fold_plural("status"), "status");
        assert_eq!(fold_plural("analysis"), "analysis");
        assert_eq!(fold_plural("gas"), "gas");
    }

    #[test]
    fn tokenize_drops_stop_words_and_punctuation() {
        assert_eq!(term_set("What are the risks?"), set(&["risk"]));
        assert_eq!(
            term_set("Grid-scale batteries, 2030 costs"),
            set(&["2030", "battery", "cost", "grid", "scale"])
        );
    }

    #[test]
    fn synonyms_are_bidirectional() {
        assert!(synonyms("risk").unwrap().contains("hazard"));
        assert!(synonyms("hazard").unwrap().contains("risk"));
        assert!(synonyms("battery").is_none());
    }

    #[test]
    fn synonym_members_are_folded() {
        // "economics" must fold to the same term the tokenizer produces
        assert!(synonyms("cost").unwrap().contains(&fold_plural("economics")));
    }

    #[test]
    fn expansion_includes_original_terms() {
        let expanded = expand_query("what are the risks?");
        assert!(expanded.contains("risk"));
        assert!(expanded.contains("danger"));
        assert!(expanded.contains("challenge"));
        assert!(!expanded.contains("what"));
    }

    #[test]
    fn stop_word_only_question_is_empty() {
        assert!(expand_query("what is it?").is_empty());
    }
}
