//! revmon main entry point
//!
//! This is the command-line interface for the review monitor.

use anyhow::{bail, Context};
use clap::Parser;
use revmon::config::{load_config_with_hash, Config, SourceEntry};
use revmon::crawler::{build_fetch_strategy, CrawlOrchestrator};
use revmon::output::{load_statistics, print_run_summary, print_statistics, RunReport, RunTotals};
use revmon::storage::{open_storage, ReviewStore};
use revmon::{CrawlMode, RevmonError};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// revmon: review page monitor
///
/// Fetches the review pages of the configured sources, extracts reviews and
/// records the ones not seen before.
#[derive(Parser, Debug)]
#[command(name = "revmon")]
#[command(version = "1.0.0")]
#[command(about = "Review acquisition and deduplication", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Crawl only the source with this id
    #[arg(long, value_name = "ID")]
    source: Option<String>,

    /// Force a capped first-time crawl that skips known reviews
    #[arg(long, conflicts_with = "incremental")]
    initial: bool,

    /// Force a crawl that stops at the first known review
    #[arg(long, conflicts_with = "initial")]
    incremental: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

impl Cli {
    fn forced_mode(&self) -> Option<CrawlMode> {
        if self.initial {
            Some(CrawlMode::Initial)
        } else if self.incremental {
            Some(CrawlMode::Incremental)
        } else {
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let sources = select_sources(&config, cli.source.as_deref())?;

    if cli.dry_run {
        handle_dry_run(&config, &sources, cli.forced_mode());
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(&config, &sources, cli.forced_mode()).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("revmon=info,warn"),
            1 => EnvFilter::new("revmon=debug,info"),
            2 => EnvFilter::new("revmon=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// All configured sources, or just the one named on the command line
fn select_sources<'a>(
    config: &'a Config,
    only: Option<&str>,
) -> Result<Vec<&'a SourceEntry>, RevmonError> {
    match only {
        None => Ok(config.sources.iter().collect()),
        Some(id) => config
            .sources
            .iter()
            .find(|s| s.id == id)
            .map(|s| vec![s])
            .ok_or_else(|| RevmonError::UnknownSource(id.to_string())),
    }
}

/// Handles the --dry-run mode: shows configuration and planned sources
fn handle_dry_run(config: &Config, sources: &[&SourceEntry], mode: Option<CrawlMode>) {
    println!("=== revmon Dry Run ===\n");

    println!("Fetch:");
    println!("  Request timeout: {}ms", config.fetch.request_timeout_ms);
    println!("  Attempts: {}", config.fetch.max_retry);
    println!("  Backoff base: {}ms", config.fetch.backoff_base_ms);
    println!(
        "  Pacing: {}-{}ms",
        config.fetch.pacing_min_ms, config.fetch.pacing_max_ms
    );
    println!("  User agents: {}", config.fetch.user_agents.len());

    println!("\nBrowser fallback:");
    if !config.browser.enabled {
        println!("  Disabled");
    } else if cfg!(feature = "browser") {
        println!("  Enabled (headless: {})", config.browser.headless);
        println!(
            "  Navigation timeout: {}ms",
            config.browser.navigation_timeout_ms
        );
        if let Some(selector) = &config.browser.wait_for_selector {
            println!("  Waits for: {}", selector);
        }
    } else {
        println!("  Enabled in config, but not compiled in");
    }

    println!("\nCrawl:");
    println!("  Initial cap: {}", config.crawl.initial_cap);
    match mode {
        Some(mode) => println!("  Mode: {} (forced)", mode),
        None => println!("  Mode: chosen per source"),
    }
    if config.snapshot.enabled {
        println!("  Snapshots: {}", config.snapshot.dir);
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nSources ({}):", sources.len());
    for source in sources {
        println!("  - {}: {}", source.id, source.url);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: &Config,
    sources: &[&SourceEntry],
    forced_mode: Option<CrawlMode>,
) -> anyhow::Result<()> {
    let mut storage = open_storage(Path::new(&config.output.database_path))?;
    for source in &config.sources {
        storage.upsert_source(&source.id, &source.url)?;
    }
    tracing::info!("Registered {} sources", config.sources.len());

    let fetcher = build_fetch_strategy(config)?;
    let store = Arc::new(Mutex::new(storage));
    let orchestrator = CrawlOrchestrator::from_config(config, fetcher, store)?;

    let mut reports = Vec::with_capacity(sources.len());
    for source in sources {
        let mode = match forced_mode {
            Some(mode) => mode,
            None => orchestrator.default_mode(&source.id)?,
        };

        let result = orchestrator.crawl(&source.id, &source.url, mode).await;
        reports.push(RunReport::new(source.id.clone(), result));
    }

    print_run_summary(&reports);

    let totals = RunTotals::from_reports(&reports);
    if !totals.all_succeeded() {
        bail!("{} of {} crawls failed", totals.failed, reports.len());
    }

    Ok(())
}
