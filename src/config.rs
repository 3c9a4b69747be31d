use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::ratelimit::RateLimiter;
use crate::retry::RetryPolicy;

/// Fatal configuration problems, surfaced before any tier runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown conference '{0}' (available: {1})")]
    UnknownConference(String, String),

    #[error("requests-per-second for {0} must be positive")]
    InvalidRate(&'static str),

    #[error("cannot prepare data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Static description of one conference the harvester knows about.
#[derive(Debug, Clone)]
pub struct ConferenceSpec {
    pub key: &'static str,
    pub name: &'static str,
    pub full_name: &'static str,
    /// Directory component of the listing URL (`db/conf/{venue}/…`).
    pub dblp_venue: &'static str,
    /// Page filename prefix; differs from the venue for NeurIPS
    /// (`db/conf/nips/neurips2022.html`).
    pub dblp_page_prefix: &'static str,
    pub years: Vec<u16>,
    /// Years whose proceedings are split across extra suffixed pages.
    pub multi_part_years: &'static [(u16, &'static [&'static str])],
    /// Venue group prefix on the review platform, when the conference
    /// publishes there (e.g. `ICLR.cc`).
    pub openreview_venue: Option<&'static str>,
    /// Whether abstracts can be scraped from the proceedings site via the
    /// hash URLs captured during harvesting.
    pub proceedings_abstracts: bool,
}

impl ConferenceSpec {
    /// Page suffixes to fetch for a year; always includes the unsuffixed
    /// base page.
    pub fn page_suffixes(&self, year: u16) -> Vec<&'static str> {
        let mut suffixes = vec![""];
        if let Some((_, extra)) = self.multi_part_years.iter().find(|(y, _)| *y == year) {
            suffixes.extend(extra.iter().copied());
        }
        suffixes
    }
}

fn builtin_conferences() -> Vec<ConferenceSpec> {
    vec![
        ConferenceSpec {
            key: "kdd",
            name: "KDD",
            full_name: "ACM SIGKDD Conference on Knowledge Discovery and Data Mining",
            dblp_venue: "kdd",
            dblp_page_prefix: "kdd",
            years: (2020..=2025).collect(),
            multi_part_years: &[(2025, &["-1", "-2"])],
            openreview_venue: None,
            proceedings_abstracts: false,
        },
        ConferenceSpec {
            key: "iclr",
            name: "ICLR",
            full_name: "International Conference on Learning Representations",
            dblp_venue: "iclr",
            dblp_page_prefix: "iclr",
            years: (2020..=2024).collect(),
            multi_part_years: &[],
            openreview_venue: Some("ICLR.cc"),
            proceedings_abstracts: false,
        },
        ConferenceSpec {
            key: "neurips",
            name: "NeurIPS",
            full_name: "Conference on Neural Information Processing Systems",
            dblp_venue: "nips",
            dblp_page_prefix: "neurips",
            years: (2020..=2024).collect(),
            multi_part_years: &[],
            openreview_venue: None,
            proceedings_abstracts: true,
        },
        ConferenceSpec {
            key: "aaai",
            name: "AAAI",
            full_name: "AAAI Conference on Artificial Intelligence",
            dblp_venue: "aaai",
            dblp_page_prefix: "aaai",
            years: (2020..=2024).collect(),
            multi_part_years: &[],
            openreview_venue: None,
            proceedings_abstracts: false,
        },
        ConferenceSpec {
            key: "cvpr",
            name: "CVPR",
            full_name: "IEEE/CVF Conference on Computer Vision and Pattern Recognition",
            dblp_venue: "cvpr",
            dblp_page_prefix: "cvpr",
            years: (2020..=2024).collect(),
            multi_part_years: &[],
            openreview_venue: None,
            proceedings_abstracts: false,
        },
        ConferenceSpec {
            key: "ijcai",
            name: "IJCAI",
            full_name: "International Joint Conference on Artificial Intelligence",
            dblp_venue: "ijcai",
            dblp_page_prefix: "ijcai",
            years: (2020..=2024).collect(),
            multi_part_years: &[],
            openreview_venue: None,
            proceedings_abstracts: false,
        },
    ]
}

/// Base endpoint plus request discipline for one external source.
#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub base_url: String,
    pub requests_per_second: f64,
    pub timeout: Duration,
}

impl SourceSettings {
    fn new(base_url: &str, requests_per_second: f64, timeout_secs: u64) -> Self {
        Self {
            base_url: base_url.to_string(),
            requests_per_second,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenReviewSettings {
    pub base_url: String,
    pub v2_base_url: String,
    /// Conference years at or above this use the v2 wire protocol.
    pub api2_from_year: u16,
    pub requests_per_second: f64,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct OpenAlexSettings {
    pub base_url: String,
    /// DOIs per batched works request.
    pub batch_size: usize,
    pub requests_per_second: f64,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Everything the pipeline needs, built once at startup and passed into each
/// component's constructor. No ambient lookups after this point.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub conference: ConferenceSpec,
    /// Seed the run from an existing checkpoint when one exists.
    pub resume: bool,
    pub dblp: SourceSettings,
    pub openreview: OpenReviewSettings,
    pub openalex: OpenAlexSettings,
    pub semantic_scholar: SourceSettings,
    pub neurips: SourceSettings,
    pub retry: RetrySettings,
    pub semantic_scholar_api_key: Option<String>,
    pub openalex_email: Option<String>,
}

impl Config {
    /// Build the configuration for one conference, reading optional
    /// credentials from the environment.
    pub fn new(conference_key: &str, data_dir: PathBuf, resume: bool) -> Result<Self, ConfigError> {
        let conferences = builtin_conferences();
        let conference = conferences
            .iter()
            .find(|c| c.key.eq_ignore_ascii_case(conference_key))
            .cloned()
            .ok_or_else(|| {
                let available = conferences
                    .iter()
                    .map(|c| c.key)
                    .collect::<Vec<_>>()
                    .join(", ");
                ConfigError::UnknownConference(conference_key.to_string(), available)
            })?;

        let cfg = Self {
            data_dir,
            conference,
            resume,
            dblp: SourceSettings::new("https://dblp.org", 1.0, 30),
            openreview: OpenReviewSettings {
                base_url: "https://api.openreview.net".to_string(),
                v2_base_url: "https://api2.openreview.net".to_string(),
                api2_from_year: 2024,
                requests_per_second: 2.0,
                timeout: Duration::from_secs(30),
            },
            openalex: OpenAlexSettings {
                base_url: "https://api.openalex.org".to_string(),
                batch_size: 50,
                requests_per_second: 5.0,
                timeout: Duration::from_secs(30),
            },
            semantic_scholar: SourceSettings::new("https://api.semanticscholar.org", 1.0, 30),
            neurips: SourceSettings::new("https://proceedings.nips.cc", 1.0, 30),
            retry: RetrySettings::default(),
            semantic_scholar_api_key: std::env::var("SEMANTIC_SCHOLAR_API_KEY").ok(),
            openalex_email: std::env::var("OPENALEX_EMAIL").ok(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, rps) in [
            ("dblp", self.dblp.requests_per_second),
            ("openreview", self.openreview.requests_per_second),
            ("openalex", self.openalex.requests_per_second),
            ("semantic_scholar", self.semantic_scholar.requests_per_second),
            ("neurips", self.neurips.requests_per_second),
        ] {
            if rps <= 0.0 {
                return Err(ConfigError::InvalidRate(name));
            }
        }
        Ok(())
    }

    /// Create the raw/processed data directories if needed.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        for dir in [self.raw_dir(), self.processed_dir()] {
            std::fs::create_dir_all(&dir).map_err(|source| ConfigError::DataDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir.join("processed")
    }

    /// Limiter with every source's spacing registered.
    pub fn rate_limiter(&self) -> RateLimiter {
        let mut limiter = RateLimiter::new();
        limiter.register("dblp", self.dblp.requests_per_second);
        limiter.register("openreview", self.openreview.requests_per_second);
        limiter.register("openalex", self.openalex.requests_per_second);
        limiter.register("semantic_scholar", self.semantic_scholar.requests_per_second);
        limiter.register("neurips", self.neurips.requests_per_second);
        limiter
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            self.retry.base_delay,
            self.retry.max_delay,
        )
    }
}
