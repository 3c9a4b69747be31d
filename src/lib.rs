//! Harvest conference paper metadata, enrich it with abstracts from a tiered
//! set of scholarly sources, and distill the result into word-cloud data.

pub mod config;
pub mod enrich;
pub mod keywords;
pub mod paper;
pub mod progress;
pub mod ratelimit;
pub mod recovery;
pub mod retry;
pub mod sources;

pub use config::{Config, ConfigError};
pub use enrich::{Enricher, RunSummary, TierReport};
pub use paper::{AbstractSource, CoverageStats, PaperRecord};
pub use progress::ProgressReporter;
pub use ratelimit::RateLimiter;
pub use recovery::{RecoveryError, RecoveryStore};
pub use sources::{EnrichmentResult, SourceError};
