//! Tiered abstract enrichment.
//!
//! Sources are tried in a fixed priority order; each tier only sees the
//! papers that still lack an abstract *and* carry the key field the tier
//! queries by. The first tier to return an abstract wins the paper and later
//! tiers never revisit it — re-running the pipeline over its own output is a
//! no-op for every already-enriched record, which is what makes interrupted
//! runs safe to resume from a checkpoint.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::paper::{AbstractSource, CoverageStats, PaperRecord};
use crate::progress::ProgressReporter;
use crate::ratelimit::RateLimiter;
use crate::recovery::RecoveryStore;
use crate::retry::{with_retry, RetryPolicy};
use crate::sources::{
    normalize_doi, AbstractProvider, NeuripsClient, OpenAlexClient, OpenReviewClient,
    QueryContext, SemanticScholarClient,
};

/// Checkpoint the collection after this many merges within a tier.
const CHECKPOINT_EVERY: usize = 25;
/// Emit a progress line after this many papers scanned within a tier.
const PROGRESS_EVERY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierReport {
    pub tier: &'static str,
    pub eligible: usize,
    /// Abstracts merged — or, for the id-recovery pass, ids recovered.
    pub succeeded: usize,
    pub not_found: usize,
    pub unavailable: usize,
}

impl TierReport {
    fn empty(tier: &'static str) -> Self {
        Self {
            tier,
            eligible: 0,
            succeeded: 0,
            not_found: 0,
            unavailable: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub tiers: Vec<TierReport>,
    pub coverage: CoverageStats,
}

impl RunSummary {
    pub fn log(&self) {
        for tier in &self.tiers {
            info!(
                tier = tier.tier,
                eligible = tier.eligible,
                succeeded = tier.succeeded,
                not_found = tier.not_found,
                unavailable = tier.unavailable,
                "tier contribution"
            );
        }
        info!(
            total = self.coverage.total,
            with_abstract = self.coverage.with_abstract,
            coverage = %format!("{:.1}%", self.coverage.coverage() * 100.0),
            "enrichment coverage"
        );
    }
}

pub struct Enricher<'a> {
    cfg: &'a Config,
    store: &'a RecoveryStore,
    progress: &'a ProgressReporter,
    retry: RetryPolicy,
    openreview: OpenReviewClient,
    openalex: OpenAlexClient,
    semantic_scholar: SemanticScholarClient,
    neurips: NeuripsClient,
}

impl<'a> Enricher<'a> {
    pub fn new(
        cfg: &'a Config,
        limiter: Arc<RateLimiter>,
        store: &'a RecoveryStore,
        progress: &'a ProgressReporter,
    ) -> Self {
        Self {
            cfg,
            store,
            progress,
            retry: cfg.retry_policy(),
            openreview: OpenReviewClient::new(cfg.openreview.clone(), Arc::clone(&limiter)),
            openalex: OpenAlexClient::new(
                cfg.openalex.clone(),
                Arc::clone(&limiter),
                cfg.openalex_email.clone(),
            ),
            semantic_scholar: SemanticScholarClient::new(
                cfg.semantic_scholar.clone(),
                Arc::clone(&limiter),
                cfg.semantic_scholar_api_key.clone(),
            ),
            neurips: NeuripsClient::new(cfg.neurips.clone(), limiter),
        }
    }

    /// Run every tier in priority order over the collection, mutating papers
    /// in place, and return the per-tier contributions plus final coverage.
    pub async fn enrich(&self, papers: &mut Vec<PaperRecord>) -> RunSummary {
        let missing = papers.iter().filter(|p| !p.has_abstract()).count();
        self.progress.record(&format!(
            "enrichment started: {} papers, {} missing abstracts",
            papers.len(),
            missing
        ));

        let mut tiers = Vec::new();
        if self.cfg.conference.openreview_venue.is_some() {
            tiers.push(self.run_id_recovery(papers).await);
        }
        tiers.push(
            self.run_single_tier(papers, "openreview", AbstractSource::Openreview, &self.openreview, |p| {
                p.openreview_id.clone()
            })
            .await,
        );
        tiers.push(self.run_openalex_batch(papers).await);
        tiers.push(
            self.run_single_tier(
                papers,
                "openalex_title_search",
                AbstractSource::OpenalexTitleSearch,
                &self.openalex,
                |p| (!p.title.is_empty()).then(|| p.title.clone()),
            )
            .await,
        );
        tiers.push(
            self.run_single_tier(
                papers,
                "semantic_scholar",
                AbstractSource::SemanticScholar,
                &self.semantic_scholar,
                |p| p.doi.as_deref().and_then(normalize_doi),
            )
            .await,
        );
        if self.cfg.conference.proceedings_abstracts {
            tiers.push(
                self.run_single_tier(
                    papers,
                    "neurips_proceedings",
                    AbstractSource::NeuripsProceedings,
                    &self.neurips,
                    |p| p.proceedings_url.clone(),
                )
                .await,
            );
        }

        let coverage = CoverageStats::compute(papers);
        self.progress.record(&format!(
            "enrichment finished: {}/{} papers have abstracts ({:.1}%)",
            coverage.with_abstract,
            coverage.total,
            coverage.coverage() * 100.0
        ));
        RunSummary { tiers, coverage }
    }

    /// Tier 1: recover missing review-platform ids by title search so the
    /// direct-fetch tier has keys to work with. Produces no abstracts.
    async fn run_id_recovery(&self, papers: &mut [PaperRecord]) -> TierReport {
        let tier = "openreview_id_recovery";
        let eligible: Vec<usize> = papers
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.has_abstract() && p.openreview_id.is_none())
            .map(|(i, _)| i)
            .collect();
        if eligible.is_empty() {
            return self.skip_tier(tier);
        }

        let mut report = TierReport::empty(tier);
        report.eligible = eligible.len();
        self.progress
            .record(&format!("tier {tier}: {} papers eligible", eligible.len()));

        let venue = self.cfg.conference.openreview_venue;
        for (scanned, &idx) in eligible.iter().enumerate() {
            let title = papers[idx].title.clone();
            let year = papers[idx].year;
            match with_retry(&self.retry, || {
                self.openreview.find_forum_id(&title, year, venue)
            })
            .await
            {
                Ok(Some(forum_id)) => {
                    papers[idx].openreview_id = Some(forum_id);
                    report.succeeded += 1;
                    if report.succeeded % CHECKPOINT_EVERY == 0 {
                        self.save_checkpoint(papers);
                    }
                }
                Ok(None) => report.not_found += 1,
                Err(err) => {
                    warn!(tier, title = %title, error = %err, "id recovery failed");
                    report.unavailable += 1;
                }
            }
            self.note_progress(tier, scanned + 1, eligible.len(), report.succeeded);
        }

        self.finish_tier(papers, &report);
        report
    }

    /// Tiers keyed by a single per-paper lookup: review-platform direct
    /// fetch, title-search fallback, DOI fallback, proceedings scrape.
    async fn run_single_tier(
        &self,
        papers: &mut [PaperRecord],
        tier: &'static str,
        tag: AbstractSource,
        provider: &dyn AbstractProvider,
        key_of: impl Fn(&PaperRecord) -> Option<String>,
    ) -> TierReport {
        let eligible: Vec<(usize, String)> = papers
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.has_abstract())
            .filter_map(|(i, p)| key_of(p).map(|key| (i, key)))
            .collect();
        if eligible.is_empty() {
            return self.skip_tier(tier);
        }

        let mut report = TierReport::empty(tier);
        report.eligible = eligible.len();
        self.progress
            .record(&format!("tier {tier}: {} papers eligible", eligible.len()));

        for (scanned, (idx, key)) in eligible.iter().enumerate() {
            let title = papers[*idx].title.clone();
            let year = papers[*idx].year;
            let ctx = QueryContext {
                year,
                title: &title,
            };
            match with_retry(&self.retry, || provider.fetch_by_key(key, ctx)).await {
                Ok(result) if result.is_found() => {
                    if papers[*idx].apply_enrichment(tag, &result) {
                        report.succeeded += 1;
                        if report.succeeded % CHECKPOINT_EVERY == 0 {
                            self.save_checkpoint(papers);
                        }
                    }
                }
                Ok(_) => report.not_found += 1,
                Err(err) => {
                    warn!(tier, title = %title, error = %err, "lookup failed");
                    report.unavailable += 1;
                }
            }
            self.note_progress(tier, scanned + 1, eligible.len(), report.succeeded);
        }

        self.finish_tier(papers, &report);
        report
    }

    /// Tier 3: batched DOI lookups. Retries happen per request (one request
    /// covers a whole batch); a batch that stays unavailable just leaves its
    /// papers for the later tiers.
    async fn run_openalex_batch(&self, papers: &mut [PaperRecord]) -> TierReport {
        let tier = "openalex";
        let eligible: Vec<(usize, String)> = papers
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.has_abstract())
            .filter_map(|(i, p)| p.doi.as_deref().and_then(normalize_doi).map(|doi| (i, doi)))
            .collect();
        if eligible.is_empty() {
            return self.skip_tier(tier);
        }

        let mut report = TierReport::empty(tier);
        report.eligible = eligible.len();
        self.progress
            .record(&format!("tier {tier}: {} papers eligible", eligible.len()));

        let mut scanned = 0;
        for chunk in eligible.chunks(self.openalex.batch_size().max(1)) {
            let dois: Vec<String> = chunk.iter().map(|(_, doi)| doi.clone()).collect();
            match with_retry(&self.retry, || self.openalex.fetch_batch(&dois)).await {
                Ok(found) => {
                    for (idx, doi) in chunk {
                        match found.get(doi.as_str()) {
                            Some(result) if result.is_found() => {
                                if papers[*idx].apply_enrichment(AbstractSource::Openalex, result) {
                                    report.succeeded += 1;
                                    if report.succeeded % CHECKPOINT_EVERY == 0 {
                                        self.save_checkpoint(papers);
                                    }
                                }
                            }
                            _ => report.not_found += 1,
                        }
                    }
                }
                Err(err) => {
                    warn!(tier, batch = dois.len(), error = %err, "batch lookup failed");
                    report.unavailable += chunk.len();
                }
            }
            scanned += chunk.len();
            self.note_progress(tier, scanned, eligible.len(), report.succeeded);
        }

        self.finish_tier(papers, &report);
        report
    }

    fn skip_tier(&self, tier: &'static str) -> TierReport {
        info!(tier, "no eligible papers, tier skipped");
        self.progress
            .record(&format!("tier {tier} skipped: no eligible papers"));
        TierReport::empty(tier)
    }

    fn note_progress(&self, tier: &str, scanned: usize, eligible: usize, succeeded: usize) {
        if scanned % PROGRESS_EVERY == 0 && scanned < eligible {
            self.progress.record(&format!(
                "tier {tier}: {scanned}/{eligible} scanned, {succeeded} enriched"
            ));
        }
    }

    fn finish_tier(&self, papers: &[PaperRecord], report: &TierReport) {
        if report.succeeded > 0 {
            self.save_checkpoint(papers);
        }
        info!(
            tier = report.tier,
            eligible = report.eligible,
            succeeded = report.succeeded,
            not_found = report.not_found,
            unavailable = report.unavailable,
            "tier finished"
        );
        self.progress.record(&format!(
            "tier {} finished: {}/{} succeeded, {} not found, {} unavailable",
            report.tier, report.succeeded, report.eligible, report.not_found, report.unavailable
        ));
    }

    /// Mid-run checkpoints are best-effort: losing one costs re-fetching a
    /// few papers after a crash, not the run.
    fn save_checkpoint(&self, papers: &[PaperRecord]) {
        if let Err(err) = self.store.checkpoint(&self.cfg.conference, papers) {
            warn!(error = %err, "checkpoint failed");
        }
    }
}
