use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use levelscrape::{CrawlConfig, CrawlEngine, HttpFetcher, MissingAttrPolicy, RecordSink};

/// Recursive selector-driven web crawler producing tab-separated records.
#[derive(Debug, Parser)]
#[command(name = "levelscrape", version)]
struct Cli {
    /// TOML configuration file; CLI flags override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Start URL (repeatable)
    #[arg(long = "url")]
    urls: Vec<String>,

    /// Comma-separated selector specs for one crawl level, shallowest first
    /// (repeatable); each selector is `kind|source|aggregation|query`
    #[arg(long = "css")]
    levels: Vec<String>,

    /// Base domain prefixed to relative redirection paths
    #[arg(long)]
    domain: Option<String>,

    /// Maximum number of concurrently executing branches
    #[arg(long)]
    concurrency: Option<usize>,

    /// Output file for completed records
    #[arg(long)]
    output: Option<PathBuf>,

    /// What to do when a matched element lacks the requested attribute
    #[arg(long, value_enum)]
    missing_attribute: Option<MissingAttrPolicy>,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    summary_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => CrawlConfig::from_toml_file(path)?,
        None => CrawlConfig::default(),
    };
    if !cli.urls.is_empty() {
        config.start_urls = cli.urls.clone();
    }
    if !cli.levels.is_empty() {
        config.levels = cli.levels.clone();
    }
    if let Some(domain) = cli.domain {
        config.domain = domain;
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(output) = cli.output {
        config.output = output;
    }
    if let Some(policy) = cli.missing_attribute {
        config.missing_attribute = policy;
    }

    // All configuration faults surface here, before any network activity.
    let levels = config.compile_levels()?;
    let start_urls = config.resolve_start_urls()?;

    log::info!("🚀 Starting levelscrape");
    log::info!(
        "{} start URL(s), {} level(s), concurrency {}, output {}",
        start_urls.len(),
        levels.len(),
        config.concurrency,
        config.output.display()
    );

    let sink = RecordSink::create(&config.output)?;
    let engine = CrawlEngine::new(
        HttpFetcher::new()?,
        levels,
        config.domain.clone(),
        config.missing_attribute,
        config.concurrency,
        sink,
    )?;

    let scheduler = engine.scheduler();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupt received, finishing in-flight branches");
            scheduler.cancel();
        }
    });

    let summary = engine.run(start_urls).await?;
    log::info!(
        "Crawl complete: {} pages crawled, {} records written, {} branches abandoned in {:.2}s",
        summary.pages_crawled,
        summary.records_written,
        summary.branches_abandoned,
        summary.elapsed_seconds
    );

    if cli.summary_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}
