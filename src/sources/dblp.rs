//! Conference listing client for dblp.org.
//!
//! Harvests the initial paper collection: one HTML listing page per
//! conference year (plus extra suffixed pages for split proceedings), parsed
//! into [`PaperRecord`]s with whatever lookup keys the entry exposes — DOI,
//! review-platform forum link, proceedings link.

use std::sync::Arc;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};

use super::{normalize_doi, SourceError};
use crate::config::{ConferenceSpec, SourceSettings};
use crate::paper::PaperRecord;
use crate::ratelimit::RateLimiter;

pub const SOURCE_ID: &str = "dblp";

/// Listing entries that are conference apparatus rather than research papers.
///
/// Patterns are matched case-insensitively against the cleaned title, in
/// order; the list is extensible so venue-specific noise can be appended
/// without touching the defaults.
#[derive(Debug)]
pub struct NonPaperFilter {
    patterns: Vec<Regex>,
}

impl NonPaperFilter {
    const DEFAULT_PATTERNS: &'static [&'static str] = &[
        // Proceedings front matter: "Proceedings of…", "KDD '20: …"
        r"^proceedings of",
        r"^[a-z]+\s?'\d{2}",
        r"virtual event",
        // Event headers carry dates ("August 23-27, 2020")
        r"\b(january|february|march|april|may|june|july|august|september|october|november|december)\s+\d",
        // Workshop / tutorial / keynote announcements
        r"\bworkshops?\s+on\b",
        r"\bworkshop:",
        r"^workshop\b",
        r"international workshop",
        r"\bworkshop\.?$",
        r"^tutorials?\b",
        r"\btutorial:",
        r"\btutorial on\b",
        r"\ba tutorial\b",
        r"hands-on tutorial",
        r"\btutorial\.?$",
        r"panel discussion",
        r"invited talk",
        r"\bkeynote\b",
        r"special day",
        r"\bday:",
    ];

    pub fn new() -> Self {
        let patterns = Self::DEFAULT_PATTERNS
            .iter()
            .map(|p| Regex::new(&format!("(?i){p}")).expect("default filter pattern"))
            .collect();
        Self { patterns }
    }

    /// Append a venue-specific pattern (case-insensitive) to the list.
    pub fn push(&mut self, pattern: &str) -> Result<(), regex::Error> {
        self.patterns.push(Regex::new(&format!("(?i){pattern}"))?);
        Ok(())
    }

    pub fn is_non_paper(&self, title: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(title))
    }
}

impl Default for NonPaperFilter {
    fn default() -> Self {
        Self::new()
    }
}

pub struct DblpClient {
    client: reqwest::Client,
    settings: SourceSettings,
    limiter: Arc<RateLimiter>,
    filter: NonPaperFilter,
}

impl DblpClient {
    pub fn new(settings: SourceSettings, limiter: Arc<RateLimiter>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("paper-harvest/0.1")
                .timeout(settings.timeout)
                .build()
                .unwrap(),
            settings,
            limiter,
            filter: NonPaperFilter::new(),
        }
    }

    /// Harvest every configured year of a conference into a fresh collection.
    ///
    /// Individual page failures are logged and skipped so one bad year never
    /// loses the rest of the harvest.
    pub async fn fetch_conference(
        &self,
        spec: &ConferenceSpec,
        years: &[u16],
    ) -> Result<Vec<PaperRecord>, SourceError> {
        let mut papers = Vec::new();
        for &year in years {
            for suffix in spec.page_suffixes(year) {
                match self.fetch_listing_page(spec, year, suffix).await {
                    Ok(Some(mut page_papers)) => {
                        info!(
                            conference = spec.name,
                            year,
                            suffix,
                            count = page_papers.len(),
                            "parsed listing page"
                        );
                        papers.append(&mut page_papers);
                    }
                    Ok(None) => {
                        // Suffixed pages legitimately 404 for years that were
                        // not split.
                        if suffix.is_empty() {
                            warn!(conference = spec.name, year, "no listing page");
                        }
                    }
                    Err(err) => {
                        warn!(conference = spec.name, year, suffix, error = %err, "listing page failed");
                    }
                }
            }
        }
        Ok(papers)
    }

    async fn fetch_listing_page(
        &self,
        spec: &ConferenceSpec,
        year: u16,
        suffix: &str,
    ) -> Result<Option<Vec<PaperRecord>>, SourceError> {
        let url = format!(
            "{}/db/conf/{}/{}{}{}.html",
            self.settings.base_url, spec.dblp_venue, spec.dblp_page_prefix, year, suffix
        );
        self.limiter.acquire(SOURCE_ID).await;
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::from_transport(SOURCE_ID, e))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let html = resp
            .error_for_status()
            .map_err(|e| SourceError::from_transport(SOURCE_ID, e))?
            .text()
            .await
            .map_err(|e| SourceError::from_transport(SOURCE_ID, e))?;
        let papers = parse_listing(&html, year, spec.name, &self.filter)?;
        Ok(Some(papers))
    }
}

/// Parse one listing page into paper records.
pub fn parse_listing(
    html: &str,
    year: u16,
    venue: &str,
    filter: &NonPaperFilter,
) -> Result<Vec<PaperRecord>, SourceError> {
    let document = Html::parse_document(html);
    let entry_sel = selector("li.entry.inproceedings")?;
    let title_sel = selector("span.title")?;
    let author_sel = selector(r#"span[itemprop="author"] span[itemprop="name"]"#)?;
    let link_sel = selector("nav.publ a[href]")?;

    let mut papers = Vec::new();
    for entry in document.select(&entry_sel) {
        let Some(title) = entry
            .select(&title_sel)
            .next()
            .map(|el| clean_title(&el.text().collect::<String>()))
        else {
            continue;
        };
        if title.is_empty() || filter.is_non_paper(&title) {
            continue;
        }

        let authors = entry
            .select(&author_sel)
            .map(|el| clean_author(&el.text().collect::<String>()))
            .filter(|a| !a.is_empty())
            .collect();

        let mut paper = PaperRecord::new(title, year);
        paper.venue = venue.to_string();
        paper.authors = authors;
        attach_links(&mut paper, entry.select(&link_sel));
        papers.push(paper);
    }
    Ok(papers)
}

fn attach_links<'a>(paper: &mut PaperRecord, links: impl Iterator<Item = ElementRef<'a>>) {
    for link in links {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        if href.contains("doi.org/") && paper.doi.is_none() {
            paper.doi = normalize_doi(href);
        } else if href.contains("openreview.net") && paper.openreview_url.is_none() {
            paper.openreview_url = Some(href.to_string());
            paper.openreview_id = forum_id_from_url(href);
        } else if (href.contains("papers.nips.cc") || href.contains("proceedings.neurips.cc"))
            && paper.proceedings_url.is_none()
        {
            paper.proceedings_url = Some(href.to_string());
        }
    }
}

/// Pull the forum id out of an OpenReview link (`…/forum?id=XYZ`).
fn forum_id_from_url(url: &str) -> Option<String> {
    let (_, query) = url.split_once("id=")?;
    let id = query.split('&').next().unwrap_or(query);
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Listing titles end with a period; normalize whitespace and drop it.
fn clean_title(raw: &str) -> String {
    let title = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    title.trim_end_matches('.').trim().to_string()
}

/// Strip dblp's numeric disambiguation suffix ("Jane Doe 0001").
fn clean_author(raw: &str) -> String {
    let name = raw.trim();
    if let Some(idx) = name.rfind(' ') {
        if name[idx + 1..].len() == 4 && name[idx + 1..].chars().all(|c| c.is_ascii_digit()) {
            return name[..idx].trim().to_string();
        }
    }
    name.to_string()
}

fn selector(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css).map_err(|e| SourceError::malformed(SOURCE_ID, format!("{e:?}")))
}
