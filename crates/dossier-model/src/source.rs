//! Retrieved web documents
//!
//! A [`Source`] is one document the scout stage fetched and extracted.
//! URLs are validated on construction and are the identity of a source
//! within a session.

use crate::error::ModelError;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use url::Url;

/// One retrieved web document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Absolute URL (identity within a session)
    pub url: Url,
    /// Page title reported by the search backend
    pub title: String,
    /// Cleaned page text, possibly truncated
    pub extracted_content: String,
    /// Reliability in `0.0..=1.0`
    pub reliability_score: f64,
    /// When the content was fetched
    pub date_accessed: DateTime<Utc>,
}

impl Source {
    /// Create new source, validating the URL
    ///
    /// # Errors
    /// `ModelError::InvalidUrl` if `url` is not an absolute URL with a host.
    pub fn new(
        url: &str,
        title: impl Into<String>,
        extracted_content: impl Into<String>,
        reliability_score: f64,
    ) -> Result<Self, ModelError> {
        Ok(Self {
            url: parse_source_url(url)?,
            title: title.into(),
            extracted_content: extracted_content.into(),
            reliability_score: clamp_score(reliability_score),
            date_accessed: Utc::now(),
        })
    }

    /// With explicit access time
    #[inline]
    #[must_use]
    pub fn accessed_at(mut self, at: DateTime<Utc>) -> Self {
        self.date_accessed = at;
        self
    }

    /// Host name without a leading `www.`
    #[must_use]
    pub fn domain(&self) -> String {
        domain_of(&self.url)
    }

    /// Title to show in citations, falling back to the domain
    #[must_use]
    pub fn display_title(&self) -> String {
        let title = self.title.trim();
        if title.is_empty() {
            self.domain()
        } else {
            title.to_string()
        }
    }
}

/// Parse and validate a source URL
///
/// # Errors
/// `ModelError::InvalidUrl` for relative, malformed or host-less URLs.
pub fn parse_source_url(raw: &str) -> Result<Url, ModelError> {
    let url = Url::parse(raw.trim()).map_err(|e| ModelError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    if url.cannot_be_a_base() || !url.has_host() {
        return Err(ModelError::InvalidUrl {
            url: raw.to_string(),
            reason: "url has no host".to_string(),
        });
    }

    Ok(url)
}

/// Host of `url` without a leading `www.`
#[must_use]
pub fn domain_of(url: &Url) -> String {
    url.host_str()
        .map(|h| h.trim_start_matches("www.").to_lowercase())
        .unwrap_or_default()
}

/// Deduplicate sources by URL, keeping the highest reliability score
///
/// First-seen order is preserved; a later duplicate with a higher score
/// replaces the earlier record in place.
#[must_use]
pub fn merge_sources(sources: impl IntoIterator<Item = Source>) -> Vec<Source> {
    let mut merged: IndexMap<Url, Source> = IndexMap::new();

    for source in sources {
        match merged.get_mut(&source.url) {
            Some(existing) if source.reliability_score > existing.reliability_score => {
                *existing = source;
            }
            Some(_) => {}
            None => {
                merged.insert(source.url.clone(), source);
            }
        }
    }

    merged.into_values().collect()
}

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}
