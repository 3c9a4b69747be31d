pub mod dblp;
pub mod neurips;
pub mod openalex;
pub mod openreview;
pub mod semantic_scholar;

use async_trait::async_trait;
use thiserror::Error;

pub use dblp::DblpClient;
pub use neurips::NeuripsClient;
pub use openalex::OpenAlexClient;
pub use openreview::OpenReviewClient;
pub use semantic_scholar::SemanticScholarClient;

/// What one source lookup produced for one paper.
///
/// A fully-null result means the source has no record for the key — that is
/// an expected outcome, not an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentResult {
    pub abstract_text: Option<String>,
    pub citation_count: Option<u32>,
    pub source_id: Option<String>,
}

impl EnrichmentResult {
    pub fn not_found() -> Self {
        Self::default()
    }

    /// A result counts as found only when it carries an abstract; a bare
    /// citation count does not take the paper out of the working set.
    pub fn is_found(&self) -> bool {
        self.abstract_text.is_some()
    }
}

/// Failures a source lookup can surface to the orchestrator.
///
/// "Not found" is deliberately absent: sources map their 404-equivalents to
/// [`EnrichmentResult::not_found`] so callers can tell "no record" apart from
/// "could not reach the source". Both variants here are transient and retried
/// at the request level.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{src} unavailable: {message}")]
    Unavailable {
        src: &'static str,
        message: String,
    },

    #[error("{src} returned a malformed payload: {message}")]
    Malformed {
        src: &'static str,
        message: String,
    },
}

impl SourceError {
    pub fn unavailable(source: &'static str, message: impl Into<String>) -> Self {
        SourceError::Unavailable {
            src: source,
            message: message.into(),
        }
    }

    pub fn malformed(source: &'static str, message: impl Into<String>) -> Self {
        SourceError::Malformed {
            src: source,
            message: message.into(),
        }
    }

    /// Map a transport-level reqwest failure. Body-decode failures mean the
    /// source answered with something unexpected; everything else (connect,
    /// timeout, non-2xx surfaced via `error_for_status`) means it could not
    /// be reached usefully.
    pub fn from_transport(source: &'static str, err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::malformed(source, err.to_string())
        } else {
            SourceError::unavailable(source, err.to_string())
        }
    }
}

/// Context a source may need beyond the bare key.
#[derive(Debug, Clone, Copy)]
pub struct QueryContext<'a> {
    pub year: u16,
    pub title: &'a str,
}

/// A source that can resolve one lookup key to an abstract.
///
/// Implementations rate-limit themselves: every request passes through the
/// shared [`RateLimiter`](crate::ratelimit::RateLimiter) under the client's
/// own source id before going on the wire.
#[async_trait]
pub trait AbstractProvider: Send + Sync {
    /// Stable source id, used for rate limiting and log lines.
    fn id(&self) -> &'static str;

    async fn fetch_by_key(
        &self,
        key: &str,
        ctx: QueryContext<'_>,
    ) -> Result<EnrichmentResult, SourceError>;
}

/// Normalize a DOI for use as a lookup key: strip resolver prefixes,
/// lowercase, and reject empty remainders.
pub fn normalize_doi(raw: &str) -> Option<String> {
    let mut doi = raw.trim();
    for prefix in [
        "https://doi.org/",
        "http://doi.org/",
        "https://dx.doi.org/",
        "http://dx.doi.org/",
        "doi:",
    ] {
        if let Some(rest) = doi.strip_prefix(prefix) {
            doi = rest;
            break;
        }
    }
    let doi = doi.trim().to_lowercase();
    if doi.is_empty() {
        None
    } else {
        Some(doi)
    }
}

/// Lowercase, strip punctuation, collapse whitespace. Used for comparing
/// titles across sources, which disagree on casing and punctuation.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Accept a title-search hit only when it is nearly identical to the query
/// title after normalization.
pub fn titles_match(a: &str, b: &str) -> bool {
    strsim::levenshtein(&normalize_title(a), &normalize_title(b)) < 5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_doi_strips_resolver_prefix_and_lowercases() {
        assert_eq!(
            normalize_doi("https://doi.org/10.1145/3580305.3599256"),
            Some("10.1145/3580305.3599256".to_string())
        );
        assert_eq!(normalize_doi("10.1/B"), Some("10.1/b".to_string()));
        assert_eq!(normalize_doi("doi:10.5555/X"), Some("10.5555/x".to_string()));
    }

    #[test]
    fn normalize_doi_rejects_empty() {
        assert_eq!(normalize_doi(""), None);
        assert_eq!(normalize_doi("https://doi.org/"), None);
        assert_eq!(normalize_doi("   "), None);
    }

    #[test]
    fn titles_match_tolerates_punctuation_and_case() {
        assert!(titles_match(
            "Graph Neural Networks: A Survey",
            "graph neural networks a survey"
        ));
        assert!(!titles_match(
            "Graph Neural Networks: A Survey",
            "Convolutional Networks for Images"
        ));
    }

    #[test]
    fn not_found_result_is_fully_null() {
        let result = EnrichmentResult::not_found();
        assert!(!result.is_found());
        assert!(result.abstract_text.is_none());
        assert!(result.citation_count.is_none());
        assert!(result.source_id.is_none());
    }
}
