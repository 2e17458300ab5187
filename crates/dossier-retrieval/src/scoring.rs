//! Term-density relevance scoring
//!
//! Pure functions: the same inputs always produce the same scores and the
//! same ranking.

use crate::terms::TermSet;
use std::cmp::Ordering;

/// Score of one candidate, by position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scored {
    /// Candidate position in its original order
    pub index: usize,
    /// Relevance score
    pub score: f64,
}

/// `|query ∩ terms| / |terms|`, zero for an empty candidate
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn density(query: &TermSet, terms: &TermSet) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    overlap(query, terms) as f64 / terms.len() as f64
}

/// Number of query terms present in `terms`
#[must_use]
pub fn overlap(query: &TermSet, terms: &TermSet) -> usize {
    query.intersection(terms).count()
}

/// Density scaled by `1 + heading_bonus × |query ∩ heading|`
#[must_use]
pub fn section_score(
    query: &TermSet,
    section_terms: &TermSet,
    heading_terms: &TermSet,
    heading_bonus: f64,
) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let multiplier = 1.0 + heading_bonus * overlap(query, heading_terms) as f64;
    density(query, section_terms) * multiplier
}

/// Rank scores descending; equal scores keep their original order
#[must_use]
pub fn rank(scores: impl IntoIterator<Item = f64>) -> Vec<Scored> {
    let mut ranked: Vec<Scored> = scores
        .into_iter()
        .enumerate()
        .map(|(index, score)| Scored { index, score })
        .collect();
    // sort_by is stable
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    ranked
}
