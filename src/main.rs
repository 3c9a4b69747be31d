use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use paper_harvest::config::Config;
use paper_harvest::enrich::Enricher;
use paper_harvest::keywords::{
    build_wordcloud, filter_by_frequency, top_keywords, KeywordExtractor, DEFAULT_MAX_KEYWORDS,
    DEFAULT_MIN_FREQUENCY,
};
use paper_harvest::paper::{CoverageStats, PaperRecord};
use paper_harvest::progress::ProgressReporter;
use paper_harvest::recovery::RecoveryStore;
use paper_harvest::sources::DblpClient;

#[derive(Parser)]
#[command(name = "paper-harvest", about = "Conference paper harvester and abstract enricher")]
struct Cli {
    /// Conference key (kdd, iclr, neurips, aaai, cvpr, ijcai)
    #[arg(short, long, default_value = "kdd")]
    conference: String,

    /// Root data directory (raw/ and processed/ live under it)
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Ignore an existing checkpoint and start fresh
    #[arg(long)]
    no_resume: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Harvest the paper listing from dblp and checkpoint it
    Fetch {
        /// Restrict to specific years (default: all configured years)
        #[arg(long, value_delimiter = ',')]
        years: Vec<u16>,
    },
    /// Run the tiered abstract enrichment over the checkpointed collection
    Enrich,
    /// Extract keywords and write the word-cloud artifact
    Keywords,
    /// Print abstract coverage for the checkpointed collection
    Coverage,
    /// Fetch, enrich, and extract keywords in one go
    Pipeline {
        #[arg(long, value_delimiter = ',')]
        years: Vec<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let cfg = Config::new(&cli.conference, cli.data_dir.clone(), !cli.no_resume)?;
    cfg.ensure_directories()?;

    let store = RecoveryStore::new(cfg.raw_dir());
    let progress = ProgressReporter::new(&cfg.raw_dir(), cfg.conference.key);

    match cli.command {
        Command::Fetch { years } => {
            let papers = fetch(&cfg, &years).await?;
            store.checkpoint(&cfg.conference, &papers)?;
            info!(papers = papers.len(), path = %store.checkpoint_path(cfg.conference.key).display(), "harvest saved");
        }
        Command::Enrich => {
            let mut papers = load_collection(&cfg, &store)?;
            let summary = run_enrichment(&cfg, &store, &progress, &mut papers).await?;
            summary.log();
        }
        Command::Keywords => {
            let papers = load_collection(&cfg, &store)?;
            write_keywords(&cfg, &papers)?;
        }
        Command::Coverage => {
            let papers = load_collection(&cfg, &store)?;
            let stats = CoverageStats::compute(&papers);
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Pipeline { years } => {
            let mut papers = match resume_collection(&cfg, &store)? {
                Some(papers) => papers,
                None => {
                    let papers = fetch(&cfg, &years).await?;
                    store.checkpoint(&cfg.conference, &papers)?;
                    papers
                }
            };
            let summary = run_enrichment(&cfg, &store, &progress, &mut papers).await?;
            summary.log();
            write_keywords(&cfg, &papers)?;
        }
    }
    Ok(())
}

async fn fetch(cfg: &Config, years: &[u16]) -> anyhow::Result<Vec<PaperRecord>> {
    let limiter = Arc::new(cfg.rate_limiter());
    let dblp = DblpClient::new(cfg.dblp.clone(), limiter);
    let years = if years.is_empty() {
        cfg.conference.years.clone()
    } else {
        years.to_vec()
    };
    info!(conference = cfg.conference.name, ?years, "harvesting listing");
    let papers = dblp.fetch_conference(&cfg.conference, &years).await?;
    if papers.is_empty() {
        bail!("harvest produced no papers for {}", cfg.conference.name);
    }
    info!(papers = papers.len(), "harvest complete");
    Ok(papers)
}

async fn run_enrichment(
    cfg: &Config,
    store: &RecoveryStore,
    progress: &ProgressReporter,
    papers: &mut Vec<PaperRecord>,
) -> anyhow::Result<paper_harvest::enrich::RunSummary> {
    let limiter = Arc::new(cfg.rate_limiter());
    let enricher = Enricher::new(cfg, limiter, store, progress);
    let summary = enricher.enrich(papers).await;
    store.checkpoint(&cfg.conference, papers)?;
    Ok(summary)
}

/// The collection a command operates on: the checkpoint, which must exist.
fn load_collection(cfg: &Config, store: &RecoveryStore) -> anyhow::Result<Vec<PaperRecord>> {
    store
        .load(cfg.conference.key)
        .with_context(|| format!("loading checkpoint for {}", cfg.conference.key))?
        .with_context(|| {
            format!(
                "no checkpoint for {}; run `paper-harvest -c {} fetch` first",
                cfg.conference.name, cfg.conference.key
            )
        })
}

/// Resume-aware load for the pipeline command: `None` means start fresh.
fn resume_collection(
    cfg: &Config,
    store: &RecoveryStore,
) -> anyhow::Result<Option<Vec<PaperRecord>>> {
    if !cfg.resume {
        return Ok(None);
    }
    let loaded = store.load(cfg.conference.key)?;
    if let Some(ref papers) = loaded {
        let stats = CoverageStats::compute(papers);
        info!(
            papers = stats.total,
            with_abstract = stats.with_abstract,
            "resuming from checkpoint"
        );
    }
    Ok(loaded)
}

fn write_keywords(cfg: &Config, papers: &[PaperRecord]) -> anyhow::Result<()> {
    let extractor = KeywordExtractor::new();
    let stats = extractor.extract(papers);
    let stats = filter_by_frequency(stats, DEFAULT_MIN_FREQUENCY);
    let stats = top_keywords(stats, DEFAULT_MAX_KEYWORDS);
    let cloud = build_wordcloud(&cfg.conference, &stats);

    let path = cfg
        .processed_dir()
        .join(format!("{}_wordcloud.json", cfg.conference.key));
    std::fs::write(&path, serde_json::to_string_pretty(&cloud)?)
        .with_context(|| format!("writing {}", path.display()))?;
    info!(keywords = cloud.words.len(), path = %path.display(), "word-cloud data written");
    Ok(())
}
