//! Semantic Scholar graph API client: single-work lookup by DOI, used as a
//! late fallback tier.

use std::sync::Arc;

use serde::Deserialize;

use super::{AbstractProvider, EnrichmentResult, QueryContext, SourceError};
use crate::config::SourceSettings;
use crate::ratelimit::RateLimiter;

pub const SOURCE_ID: &str = "semantic_scholar";

const FIELDS: &str = "abstract,citationCount";

pub struct SemanticScholarClient {
    client: reqwest::Client,
    settings: SourceSettings,
    limiter: Arc<RateLimiter>,
    api_key: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    paper_id: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    citation_count: Option<u32>,
}

impl SemanticScholarClient {
    pub fn new(
        settings: SourceSettings,
        limiter: Arc<RateLimiter>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("paper-harvest/0.1")
                .timeout(settings.timeout)
                .build()
                .unwrap(),
            settings,
            limiter,
            api_key,
        }
    }

    fn add_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("x-api-key", key),
            None => req,
        }
    }

    pub async fn fetch_by_doi(&self, doi: &str) -> Result<EnrichmentResult, SourceError> {
        let url = format!("{}/graph/v1/paper/DOI:{}", self.settings.base_url, doi);
        self.limiter.acquire(SOURCE_ID).await;
        let resp = self
            .add_auth(self.client.get(&url).query(&[("fields", FIELDS)]))
            .send()
            .await
            .map_err(|e| SourceError::from_transport(SOURCE_ID, e))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(EnrichmentResult::not_found());
        }
        let paper: S2Paper = resp
            .error_for_status()
            .map_err(|e| SourceError::from_transport(SOURCE_ID, e))?
            .json()
            .await
            .map_err(|e| SourceError::from_transport(SOURCE_ID, e))?;

        Ok(EnrichmentResult {
            abstract_text: paper.abstract_text.filter(|a| !a.trim().is_empty()),
            citation_count: paper.citation_count,
            source_id: paper.paper_id,
        })
    }
}

#[async_trait::async_trait]
impl AbstractProvider for SemanticScholarClient {
    fn id(&self) -> &'static str {
        SOURCE_ID
    }

    async fn fetch_by_key(
        &self,
        key: &str,
        _ctx: QueryContext<'_>,
    ) -> Result<EnrichmentResult, SourceError> {
        self.fetch_by_doi(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_fields_deserialize() {
        let paper: S2Paper = serde_json::from_str(
            r#"{"paperId":"649def34","abstract":"We propose a method.","citationCount":12}"#,
        )
        .unwrap();
        assert_eq!(paper.paper_id.as_deref(), Some("649def34"));
        assert_eq!(paper.abstract_text.as_deref(), Some("We propose a method."));
        assert_eq!(paper.citation_count, Some(12));
    }

    #[test]
    fn record_without_abstract_deserializes_to_nulls() {
        let paper: S2Paper =
            serde_json::from_str(r#"{"paperId":"649def34","abstract":null,"citationCount":0}"#)
                .unwrap();
        assert!(paper.abstract_text.is_none());
        assert_eq!(paper.citation_count, Some(0));
    }
}
