//! OpenReview client.
//!
//! Two wire protocols are in the wild: the v1 API for older conference years
//! and the v2 API (separate host, content fields wrapped in `{"value": …}`)
//! for newer ones. A year threshold in the settings picks the protocol.
//! Besides the direct forum lookup, the client can recover a missing forum id
//! by title search, since the listing harvest does not always capture one.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use super::{
    titles_match, AbstractProvider, EnrichmentResult, QueryContext, SourceError,
};
use crate::config::OpenReviewSettings;
use crate::ratelimit::RateLimiter;

pub const SOURCE_ID: &str = "openreview";

pub struct OpenReviewClient {
    client: reqwest::Client,
    settings: OpenReviewSettings,
    limiter: Arc<RateLimiter>,
}

#[derive(Deserialize)]
struct NotesResponse {
    #[serde(default)]
    notes: Vec<Note>,
}

#[derive(Deserialize)]
struct Note {
    id: Option<String>,
    forum: Option<String>,
    #[serde(default)]
    content: Value,
}

impl OpenReviewClient {
    pub fn new(settings: OpenReviewSettings, limiter: Arc<RateLimiter>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("paper-harvest/0.1")
                .timeout(settings.timeout)
                .build()
                .unwrap(),
            settings,
            limiter,
        }
    }

    fn api_base(&self, year: u16) -> &str {
        if year >= self.settings.api2_from_year {
            &self.settings.v2_base_url
        } else {
            &self.settings.base_url
        }
    }

    /// Fetch the submission note for a forum id and pull out its abstract.
    pub async fn fetch_forum(&self, forum: &str, year: u16) -> Result<EnrichmentResult, SourceError> {
        let url = format!("{}/notes", self.api_base(year));
        self.limiter.acquire(SOURCE_ID).await;
        let resp = self
            .client
            .get(&url)
            .query(&[("forum", forum)])
            .send()
            .await
            .map_err(|e| SourceError::from_transport(SOURCE_ID, e))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(EnrichmentResult::not_found());
        }
        let notes: NotesResponse = resp
            .error_for_status()
            .map_err(|e| SourceError::from_transport(SOURCE_ID, e))?
            .json()
            .await
            .map_err(|e| SourceError::from_transport(SOURCE_ID, e))?;

        // The submission is the note whose id equals the forum id; replies to
        // it (reviews, comments) share the forum but have their own ids.
        let Some(submission) = notes
            .notes
            .iter()
            .find(|n| n.id.as_deref() == Some(forum))
            .or_else(|| notes.notes.first())
        else {
            return Ok(EnrichmentResult::not_found());
        };

        Ok(EnrichmentResult {
            abstract_text: abstract_from_content(&submission.content),
            citation_count: None,
            source_id: submission.id.clone(),
        })
    }

    /// Recover a forum id for a paper the harvest captured without one.
    /// Search hits are only accepted when their title survives the
    /// normalized-similarity check. `venue` narrows the v1 search to the
    /// conference's group on the platform.
    pub async fn find_forum_id(
        &self,
        title: &str,
        year: u16,
        venue: Option<&str>,
    ) -> Result<Option<String>, SourceError> {
        let notes = if year >= self.settings.api2_from_year {
            self.search_v2(title).await?
        } else {
            self.search_v1(title, venue).await?
        };

        for note in &notes {
            let Some(found_title) = content_text(&note.content, "title") else {
                continue;
            };
            if titles_match(&found_title, title) {
                return Ok(note.forum.clone().or_else(|| note.id.clone()));
            }
        }
        Ok(None)
    }

    async fn search_v1(&self, title: &str, venue: Option<&str>) -> Result<Vec<Note>, SourceError> {
        let url = format!("{}/notes/search", self.settings.base_url);
        self.limiter.acquire(SOURCE_ID).await;
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("term", title),
                ("content", "all"),
                ("group", venue.unwrap_or("all")),
                ("source", "forum"),
            ])
            .send()
            .await
            .map_err(|e| SourceError::from_transport(SOURCE_ID, e))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let notes: NotesResponse = resp
            .error_for_status()
            .map_err(|e| SourceError::from_transport(SOURCE_ID, e))?
            .json()
            .await
            .map_err(|e| SourceError::from_transport(SOURCE_ID, e))?;
        Ok(notes.notes)
    }

    async fn search_v2(&self, title: &str) -> Result<Vec<Note>, SourceError> {
        let url = format!("{}/notes", self.settings.v2_base_url);
        self.limiter.acquire(SOURCE_ID).await;
        let resp = self
            .client
            .get(&url)
            .query(&[("content.title", title)])
            .send()
            .await
            .map_err(|e| SourceError::from_transport(SOURCE_ID, e))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let notes: NotesResponse = resp
            .error_for_status()
            .map_err(|e| SourceError::from_transport(SOURCE_ID, e))?
            .json()
            .await
            .map_err(|e| SourceError::from_transport(SOURCE_ID, e))?;
        Ok(notes.notes)
    }
}

#[async_trait::async_trait]
impl AbstractProvider for OpenReviewClient {
    fn id(&self) -> &'static str {
        SOURCE_ID
    }

    async fn fetch_by_key(
        &self,
        key: &str,
        ctx: QueryContext<'_>,
    ) -> Result<EnrichmentResult, SourceError> {
        self.fetch_forum(key, ctx.year).await
    }
}

/// Read a content field as text, unwrapping the v2 `{"value": …}` envelope
/// one level when present.
fn content_text(content: &Value, field: &str) -> Option<String> {
    let value = content.get(field)?;
    let value = value.get("value").unwrap_or(value);
    let text = value.as_str()?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Abstract, falling back to the short-summary field some venues use.
fn abstract_from_content(content: &Value) -> Option<String> {
    content_text(content, "abstract")
        .or_else(|| content_text(content, "TL;DR"))
        .or_else(|| content_text(content, "TLDR"))
}
