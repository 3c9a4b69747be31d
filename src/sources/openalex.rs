//! OpenAlex works client.
//!
//! Primary mode is a batched DOI lookup (one request covers a whole filter of
//! DOIs); a title-search fallback recovers records whose DOI lookup missed.
//! OpenAlex does not return abstracts as linear text — it returns an inverted
//! word-position index that has to be reconstructed.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use super::{
    normalize_doi, titles_match, AbstractProvider, EnrichmentResult, QueryContext, SourceError,
};
use crate::config::OpenAlexSettings;
use crate::ratelimit::RateLimiter;

pub const SOURCE_ID: &str = "openalex";

const WORK_FIELDS: &str = "id,doi,title,abstract_inverted_index,cited_by_count";

pub struct OpenAlexClient {
    client: reqwest::Client,
    settings: OpenAlexSettings,
    limiter: Arc<RateLimiter>,
    email: Option<String>,
}

#[derive(Deserialize)]
struct WorksResponse {
    results: Vec<Work>,
}

#[derive(Deserialize)]
struct Work {
    id: Option<String>,
    doi: Option<String>,
    title: Option<String>,
    abstract_inverted_index: Option<HashMap<String, Vec<u32>>>,
    cited_by_count: Option<u32>,
}

impl OpenAlexClient {
    pub fn new(settings: OpenAlexSettings, limiter: Arc<RateLimiter>, email: Option<String>) -> Self {
        let ua = match email {
            Some(ref e) => format!("paper-harvest/0.1 (mailto:{})", e),
            None => "paper-harvest/0.1".to_string(),
        };
        Self {
            client: reqwest::Client::builder()
                .user_agent(ua)
                .timeout(settings.timeout)
                .build()
                .unwrap(),
            settings,
            limiter,
            email,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.settings.batch_size
    }

    /// Look up one batch of DOIs. The result map is keyed by normalized DOI;
    /// DOIs the response did not cover are simply absent, which callers read
    /// as not-found.
    pub async fn fetch_batch(
        &self,
        dois: &[String],
    ) -> Result<HashMap<String, EnrichmentResult>, SourceError> {
        let Some(filter) = build_doi_filter(dois) else {
            return Ok(HashMap::new());
        };
        let per_page = self.settings.batch_size.to_string();
        let mut params = vec![
            ("filter", filter),
            ("per-page", per_page),
            ("select", WORK_FIELDS.to_string()),
        ];
        if let Some(ref email) = self.email {
            params.push(("mailto", email.clone()));
        }

        self.limiter.acquire(SOURCE_ID).await;
        let resp: WorksResponse = self
            .client
            .get(format!("{}/works", self.settings.base_url))
            .query(&params)
            .send()
            .await
            .map_err(|e| SourceError::from_transport(SOURCE_ID, e))?
            .error_for_status()
            .map_err(|e| SourceError::from_transport(SOURCE_ID, e))?
            .json()
            .await
            .map_err(|e| SourceError::from_transport(SOURCE_ID, e))?;

        let mut found = HashMap::new();
        for work in &resp.results {
            let Some(doi) = work.doi.as_deref().and_then(normalize_doi) else {
                continue;
            };
            found.insert(doi, work_to_result(work));
        }
        debug!(requested = dois.len(), matched = found.len(), "batch lookup");
        Ok(found)
    }

    /// Single-work title search, verified against the query title before
    /// acceptance so a fuzzy hit cannot attach the wrong abstract.
    pub async fn search_by_title(&self, title: &str) -> Result<EnrichmentResult, SourceError> {
        let filter = format!("title.search:{}", sanitize_filter_value(title));
        let mut params = vec![
            ("filter", filter),
            ("per-page", "1".to_string()),
            ("select", WORK_FIELDS.to_string()),
        ];
        if let Some(ref email) = self.email {
            params.push(("mailto", email.clone()));
        }

        self.limiter.acquire(SOURCE_ID).await;
        let resp: WorksResponse = self
            .client
            .get(format!("{}/works", self.settings.base_url))
            .query(&params)
            .send()
            .await
            .map_err(|e| SourceError::from_transport(SOURCE_ID, e))?
            .error_for_status()
            .map_err(|e| SourceError::from_transport(SOURCE_ID, e))?
            .json()
            .await
            .map_err(|e| SourceError::from_transport(SOURCE_ID, e))?;

        let Some(work) = resp.results.first() else {
            return Ok(EnrichmentResult::not_found());
        };
        match work.title {
            Some(ref found_title) if titles_match(found_title, title) => Ok(work_to_result(work)),
            _ => Ok(EnrichmentResult::not_found()),
        }
    }
}

#[async_trait::async_trait]
impl AbstractProvider for OpenAlexClient {
    fn id(&self) -> &'static str {
        SOURCE_ID
    }

    /// Trait-level lookups take the paper title as the key; DOI traffic goes
    /// through [`OpenAlexClient::fetch_batch`] instead.
    async fn fetch_by_key(
        &self,
        key: &str,
        _ctx: QueryContext<'_>,
    ) -> Result<EnrichmentResult, SourceError> {
        self.search_by_title(key).await
    }
}

fn work_to_result(work: &Work) -> EnrichmentResult {
    EnrichmentResult {
        abstract_text: work
            .abstract_inverted_index
            .as_ref()
            .and_then(reconstruct_abstract),
        citation_count: work.cited_by_count,
        source_id: work.id.clone(),
    }
}

/// Build the `doi:a|b|c` filter over the normalized, deduplicated key set.
/// Returns `None` when nothing normalizes to a usable DOI.
pub fn build_doi_filter(dois: &[String]) -> Option<String> {
    let keys: BTreeSet<String> = dois.iter().filter_map(|d| normalize_doi(d)).collect();
    if keys.is_empty() {
        return None;
    }
    Some(format!(
        "doi:{}",
        keys.into_iter().collect::<Vec<_>>().join("|")
    ))
}

/// Rebuild linear text from the inverted word-position index: order all
/// (position, word) pairs by position and join with single spaces. Key
/// iteration order must not matter.
pub fn reconstruct_abstract(index: &HashMap<String, Vec<u32>>) -> Option<String> {
    let mut positions: Vec<(u32, &str)> = Vec::new();
    for (word, occurrences) in index {
        for &pos in occurrences {
            positions.push((pos, word.as_str()));
        }
    }
    if positions.is_empty() {
        return None;
    }
    positions.sort_unstable_by_key(|&(pos, _)| pos);
    Some(
        positions
            .iter()
            .map(|&(_, word)| word)
            .collect::<Vec<_>>()
            .join(" "),
    )
}

/// Commas separate filter clauses on the wire, so they cannot appear inside a
/// filter value.
fn sanitize_filter_value(value: &str) -> String {
    value.replace(',', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(entries: &[(&str, &[u32])]) -> HashMap<String, Vec<u32>> {
        entries
            .iter()
            .map(|(w, ps)| (w.to_string(), ps.to_vec()))
            .collect()
    }

    #[test]
    fn reconstructs_text_in_position_order() {
        let idx = index(&[("deep", &[0]), ("learning", &[1]), ("models", &[2])]);
        assert_eq!(
            reconstruct_abstract(&idx).as_deref(),
            Some("deep learning models")
        );
    }

    #[test]
    fn reconstruction_ignores_key_iteration_order() {
        let idx = index(&[("learning", &[1]), ("models", &[2]), ("deep", &[0])]);
        assert_eq!(
            reconstruct_abstract(&idx).as_deref(),
            Some("deep learning models")
        );
    }

    #[test]
    fn reconstruction_handles_repeated_words() {
        let idx = index(&[("the", &[0, 3]), ("more", &[1]), ("data", &[2, 4])]);
        assert_eq!(
            reconstruct_abstract(&idx).as_deref(),
            Some("the more data the data")
        );
    }

    #[test]
    fn empty_index_reconstructs_to_none() {
        assert_eq!(reconstruct_abstract(&HashMap::new()), None);
    }

    #[test]
    fn batch_filter_normalizes_and_dedupes() {
        let dois = vec![
            "10.1/a".to_string(),
            "10.1/B".to_string(),
            "https://doi.org/10.1/b".to_string(),
        ];
        assert_eq!(build_doi_filter(&dois).as_deref(), Some("doi:10.1/a|10.1/b"));
    }

    #[test]
    fn batch_filter_of_nothing_is_none() {
        assert_eq!(build_doi_filter(&[]), None);
        assert_eq!(build_doi_filter(&["".to_string()]), None);
    }

    #[test]
    fn filter_values_lose_their_commas() {
        assert_eq!(
            sanitize_filter_value("graphs, trees, and streams"),
            "graphs  trees  and streams"
        );
    }
}
