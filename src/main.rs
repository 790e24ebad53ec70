//! rustdblp - DBLP venue harvester
//!
//! Crawls the DBLP search index venue by venue, keeps titles that score above
//! a keyword threshold, and optionally enriches the result with BibTeX.
//!
//! ## Usage
//!
//! ```bash
//! rustdblp crawl --kind conference --syear 2018 --strict
//! rustdblp enrich --input conference.csv --output conference_with_bibtex.csv
//! rustdblp stats --input conference.csv --output conference_with_bibtex.csv
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rustdblp::config::{EnrichConfig, HarvestConfig};
use rustdblp::crawler::Crawler;
use rustdblp::enrich::{self, Enricher};
use rustdblp::fetcher::HttpTransport;
use rustdblp::retry::RetryPolicy;
use rustdblp::scoring::KeywordTable;
use rustdblp::venue::{MatchMode, VenueKind};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use url::Url;

// ============================================================================
// CLI Definition
// ============================================================================

/// DBLP venue harvester with keyword relevance filtering
#[derive(Parser)]
#[command(name = "rustdblp")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level: debug, info or silent (errors only)
    #[arg(long, global = true, default_value = "info", value_parser = ["debug", "info", "silent"])]
    loglevel: String,

    /// Also write logs to this file (truncated at start)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl venues and store relevant records
    Crawl {
        /// Venue kind: conference or journal
        #[arg(long, default_value = "conference", value_parser = ["conference", "journal"])]
        kind: String,

        /// Earliest publication year to keep (default: 2015 conference, 2020 journal)
        #[arg(long)]
        syear: Option<i32>,

        /// Minimum relevance score
        #[arg(long, default_value = "0.4")]
        threshold: f64,

        /// Output CSV (default: conference.csv / journal.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Match venues as whole tokens and reject workshops
        #[arg(long)]
        strict: bool,

        /// Venue identifier to crawl; repeat for several (default: built-in list)
        #[arg(long = "venue")]
        venues: Vec<String>,

        /// Keyword with weight, e.g. "attack=0.2"; repeat for several
        #[arg(long = "keyword")]
        keywords: Vec<String>,

        /// Maximum result pages per venue
        #[arg(long, default_value = "50")]
        max_pages: u32,

        /// Hits per result page
        #[arg(long, default_value = "1000")]
        page_size: u32,

        /// Retries per request after the first attempt
        #[arg(long, default_value = "3")]
        retries: u32,

        /// Backoff base in seconds; retry n waits n times this
        #[arg(long, default_value = "5")]
        backoff_secs: u64,

        /// Per-request timeout in seconds
        #[arg(long, default_value = "60")]
        timeout_secs: u64,

        /// Pause between result pages in seconds
        #[arg(long, default_value = "3")]
        delay_secs: u64,

        /// Search endpoint URL
        #[arg(long, default_value = rustdblp::config::DEFAULT_ENDPOINT)]
        endpoint: String,
    },

    /// Add BibTeX citations to a record store
    Enrich {
        /// Record store to read
        #[arg(short, long, default_value = "conference.csv")]
        input: PathBuf,

        /// Enriched store to write (may equal --input)
        #[arg(short, long, default_value = "conference_with_bibtex.csv")]
        output: PathBuf,

        /// Retries per detail page after the first attempt
        #[arg(long, default_value = "0")]
        retries: u32,

        /// Per-request timeout in seconds
        #[arg(long, default_value = "10")]
        timeout_secs: u64,
    },

    /// Show enrichment progress without fetching anything
    Stats {
        #[arg(short, long, default_value = "conference.csv")]
        input: PathBuf,

        #[arg(short, long, default_value = "conference_with_bibtex.csv")]
        output: PathBuf,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.loglevel, cli.log_file.as_ref())?;

    let result = match cli.command {
        Commands::Crawl {
            kind,
            syear,
            threshold,
            output,
            strict,
            venues,
            keywords,
            max_pages,
            page_size,
            retries,
            backoff_secs,
            timeout_secs,
            delay_secs,
            endpoint,
        } => {
            let kind: VenueKind = kind.parse()?;
            let mut config = HarvestConfig::for_kind(kind)?;
            if let Some(year) = syear {
                config.start_year = year;
            }
            if let Some(path) = output {
                config.output = path;
            }
            if !venues.is_empty() {
                config.venues = venues;
            }
            if !keywords.is_empty() {
                config.keywords = parse_keywords(&keywords)?;
            }
            config.threshold = threshold;
            config.match_mode = MatchMode::from_strict(strict);
            config.max_pages = max_pages;
            config.page_size = page_size;
            config.retry = RetryPolicy::new(retries, Duration::from_secs(backoff_secs));
            config.timeout = Duration::from_secs(timeout_secs);
            config.page_delay = Duration::from_secs(delay_secs);
            config.endpoint = Url::parse(&endpoint).context("Invalid --endpoint URL")?;

            run_crawl(config).await
        }
        Commands::Enrich {
            input,
            output,
            retries,
            timeout_secs,
        } => {
            let config = EnrichConfig {
                input,
                output,
                retry: RetryPolicy::new(retries, Duration::from_secs(5)),
                timeout: Duration::from_secs(timeout_secs),
            };
            run_enrich(config).await
        }
        Commands::Stats { input, output } => show_stats(input, output),
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

// ============================================================================
// Logging
// ============================================================================

fn init_logging(loglevel: &str, log_file: Option<&PathBuf>) -> Result<()> {
    let level = match loglevel {
        "debug" => "debug",
        "silent" => "error",
        _ => "info",
    };
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_filter(filter());

    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(filter()),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .init();
    Ok(())
}

fn parse_keywords(entries: &[String]) -> Result<KeywordTable> {
    let mut table = KeywordTable::new();
    for entry in entries {
        let (keyword, weight) = KeywordTable::parse_entry(entry)?;
        table.insert(&keyword, weight)?;
    }
    Ok(table)
}

// ============================================================================
// Commands
// ============================================================================

async fn run_crawl(config: HarvestConfig) -> Result<()> {
    info!(
        kind = %config.kind,
        start_year = config.start_year,
        threshold = config.threshold,
        venues = config.venues.len(),
        keywords = config.keywords.len(),
        output = %config.output.display(),
        "Starting crawl"
    );

    let transport = HttpTransport::new().context("Failed to build HTTP client")?;
    let report = Crawler::new(&config, transport)
        .run()
        .await
        .context("Crawl failed")?;

    let failed: Vec<&str> = report.failed_venues().collect();
    if !failed.is_empty() {
        warn!(venues = ?failed, "Some venues stopped on fetch failure");
    }

    println!(
        "✓ Stored {} records from {} venues in {}",
        report.total_accepted(),
        report.venues.len(),
        config.output.display()
    );
    Ok(())
}

async fn run_enrich(config: EnrichConfig) -> Result<()> {
    let status = enrich::inspect(&config.input, &config.output)?;
    info!(
        total = status.total_entries,
        existing = status.existing_citations,
        "Enrichment status before run"
    );

    let transport = HttpTransport::new().context("Failed to build HTTP client")?;
    let stats = Enricher::new(&config, transport)
        .run()
        .await
        .context("Enrichment failed")?;

    println!(
        "✓ Wrote {} rows to {} ({} reused, {} fetched, {} not available, {} without URL)",
        stats.total,
        config.output.display(),
        stats.reused,
        stats.fetched,
        stats.not_available,
        stats.no_url
    );
    Ok(())
}

fn show_stats(input: PathBuf, output: PathBuf) -> Result<()> {
    let status = enrich::inspect(&input, &output)?;
    println!("Total entries in {}: {}", input.display(), status.total_entries);
    println!(
        "Existing successful entries in {}: {}",
        output.display(),
        status.existing_citations
    );
    Ok(())
}
