//! NeurIPS proceedings-site client.
//!
//! The listing harvest captures per-paper proceedings URLs that embed a
//! 32-hex content hash and an optional track suffix. The abstract page for a
//! hash has no machine-readable abstract field; the text sits in the first
//! paragraph after the "Abstract" heading, sometimes wrapped in a nested
//! paragraph. This tier never yields a citation count.

use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::{AbstractProvider, EnrichmentResult, QueryContext, SourceError};
use crate::config::SourceSettings;
use crate::ratelimit::RateLimiter;

pub const SOURCE_ID: &str = "neurips";

/// Track used when a proceedings URL carries no explicit suffix.
pub const DEFAULT_TRACK: &str = "Conference";

pub struct NeuripsClient {
    client: reqwest::Client,
    settings: SourceSettings,
    limiter: Arc<RateLimiter>,
}

impl NeuripsClient {
    pub fn new(settings: SourceSettings, limiter: Arc<RateLimiter>) -> Self {
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

    /// Fetch the abstract behind a captured proceedings URL. A URL the hash
    /// pattern does not recognize is a not-found, not an error: there is
    /// nothing to query.
    pub async fn fetch_abstract(
        &self,
        proceedings_url: &str,
        year: u16,
    ) -> Result<EnrichmentResult, SourceError> {
        let Some((hash, track)) = extract_hash(proceedings_url) else {
            return Ok(EnrichmentResult::not_found());
        };
        let url = format!(
            "{}/paper_files/paper/{}/hash/{}-Abstract-{}.html",
            self.settings.base_url, year, hash, track
        );
        self.limiter.acquire(SOURCE_ID).await;
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::from_transport(SOURCE_ID, e))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(EnrichmentResult::not_found());
        }
        let html = resp
            .error_for_status()
            .map_err(|e| SourceError::from_transport(SOURCE_ID, e))?
            .text()
            .await
            .map_err(|e| SourceError::from_transport(SOURCE_ID, e))?;

        Ok(EnrichmentResult {
            abstract_text: parse_abstract(&html)?,
            citation_count: None,
            source_id: Some(hash),
        })
    }
}

#[async_trait::async_trait]
impl AbstractProvider for NeuripsClient {
    fn id(&self) -> &'static str {
        SOURCE_ID
    }

    async fn fetch_by_key(
        &self,
        key: &str,
        ctx: QueryContext<'_>,
    ) -> Result<EnrichmentResult, SourceError> {
        self.fetch_abstract(key, ctx.year).await
    }
}

/// Extract `(hash, track)` from a proceedings URL. The track suffix is
/// optional; its absence means the primary conference track.
pub fn extract_hash(url: &str) -> Option<(String, String)> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"/hash/([0-9a-f]{32})-Abstract(?:-([A-Za-z_]+))?\.html").expect("hash pattern")
    });
    let caps = pattern.captures(url)?;
    let hash = caps.get(1)?.as_str().to_string();
    let track = caps
        .get(2)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| DEFAULT_TRACK.to_string());
    Some((hash, track))
}

/// Find the `<h4>Abstract</h4>` heading and take the text of the nearest
/// following paragraph with content, unwrapping one nested paragraph level
/// if present. The site nests the abstract in `<p><p>…</p></p>`, which the
/// HTML parser may either keep nested or split into an empty paragraph plus
/// a sibling; scanning for the first non-empty paragraph covers both.
fn parse_abstract(html: &str) -> Result<Option<String>, SourceError> {
    let document = Html::parse_document(html);
    let h4_sel = selector("h4")?;
    let p_sel = selector("p")?;

    for heading in document.select(&h4_sel) {
        if heading.text().collect::<String>().trim() != "Abstract" {
            continue;
        }
        for sibling in heading.next_siblings().filter_map(ElementRef::wrap) {
            match sibling.value().name() {
                // Ran into the next section without finding content.
                "h4" => break,
                "p" => {
                    let inner = sibling.select(&p_sel).next().unwrap_or(sibling);
                    let text = inner.text().collect::<String>().trim().to_string();
                    if !text.is_empty() {
                        return Ok(Some(text));
                    }
                }
                _ => {}
            }
        }
    }
    Ok(None)
}

fn selector(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css).map_err(|e| SourceError::malformed(SOURCE_ID, format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "002262941c9edfd472a79298b2ac5e17";

    #[test]
    fn extracts_hash_and_track() {
        let url = format!(
            "http://papers.nips.cc/paper_files/paper/2022/hash/{HASH}-Abstract-Conference.html"
        );
        assert_eq!(
            extract_hash(&url),
            Some((HASH.to_string(), "Conference".to_string()))
        );
    }

    #[test]
    fn datasets_track_is_recognized() {
        let url = format!("/hash/{HASH}-Abstract-Datasets_and_Benchmarks.html");
        assert_eq!(
            extract_hash(&url),
            Some((HASH.to_string(), "Datasets_and_Benchmarks".to_string()))
        );
    }

    #[test]
    fn missing_track_defaults_to_conference() {
        let url = format!("https://papers.nips.cc/paper/2020/hash/{HASH}-Abstract.html");
        assert_eq!(
            extract_hash(&url),
            Some((HASH.to_string(), "Conference".to_string()))
        );
    }

    #[test]
    fn unrecognized_urls_yield_nothing() {
        assert_eq!(extract_hash("https://papers.nips.cc/paper/2020"), None);
        assert_eq!(extract_hash("/hash/deadbeef-Abstract.html"), None);
    }

    #[test]
    fn abstract_paragraph_is_located_after_the_heading() {
        let html = r#"
        <html><body>
          <h4>Authors</h4><p><i>Someone</i></p>
          <h4>Abstract</h4>
          <p>We study the convergence of stochastic methods.</p>
        </body></html>"#;
        assert_eq!(
            parse_abstract(html).unwrap().as_deref(),
            Some("We study the convergence of stochastic methods.")
        );
    }

    #[test]
    fn nested_paragraph_is_unwrapped() {
        let html = r#"
        <html><body>
          <h4>Abstract</h4>
          <p><p>Nested abstract text.</p></p>
        </body></html>"#;
        assert_eq!(
            parse_abstract(html).unwrap().as_deref(),
            Some("Nested abstract text.")
        );
    }

    #[test]
    fn page_without_abstract_heading_yields_none() {
        let html = "<html><body><h4>Bibtex</h4><p>@inproceedings…</p></body></html>";
        assert_eq!(parse_abstract(html).unwrap(), None);
    }
}
