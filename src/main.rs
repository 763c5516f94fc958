//! Jobscout main entry point
//!
//! This is the command-line interface for the Jobscout job board watcher.

use chrono::Local;
use clap::Parser;
use jobscout::config::{load_config_with_hash, parse_recipients, Config};
use jobscout::crawler::run_digest_task;
use jobscout::output::{
    digest_since, load_statistics, print_statistics, recent_entries, send_digest_batches,
    DigestFilter, OutboxNotifier,
};
use jobscout::storage::{SqliteStorage, Storage, StorageError};
use jobscout::{ConfigError, Coordinator};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Listings included in a test digest
const TEST_DIGEST_LIMIT: usize = 20;

/// Jobscout: watches a job board for new offers
///
/// Jobscout crawls the configured search result pages, stores listings it
/// has not seen before, and writes a digest of today's new offers minus the
/// excluded keywords.
#[derive(Parser, Debug)]
#[command(name = "jobscout")]
#[command(version)]
#[command(about = "Watches a job board for new offers", long_about = None)]
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

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "test_run"])]
    dry_run: bool,

    /// Show listing statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "test_run"])]
    stats: bool,

    /// Crawl a single search URL and send a test digest
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    test_run: bool,

    /// Search URL for the test run (defaults to the first configured one)
    #[arg(long, requires = "test_run")]
    url: Option<String>,

    /// Maximum number of pages for the test run
    #[arg(long, default_value_t = 1, requires = "test_run")]
    max_pages: u32,

    /// Recipient of the test digest, overrides the configured recipients
    #[arg(long, requires = "test_run")]
    email: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.test_run {
        handle_test_run(config, cli.url, cli.max_pages, cli.email).await?;
    } else {
        handle_task(&config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("jobscout=info,warn"),
            1 => EnvFilter::new("jobscout=debug,info"),
            2 => EnvFilter::new("jobscout=trace,debug"),
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

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Jobscout Dry Run ===\n");

    println!("Scraper Configuration:");
    println!("  Board: {}", config.scraper.board);
    match config.scraper.max_pages {
        Some(cap) => println!("  Max pages per search: {}", cap),
        None => println!("  Max pages per search: unlimited"),
    }
    println!(
        "  Delay between pages: {}-{}ms",
        config.scraper.page_delay_min_ms, config.scraper.page_delay_max_ms
    );
    println!("  Persist workers: {}", config.scraper.persist_workers);
    if let Some(every) = config.scraper.restart_every_pages {
        println!("  Session restart every {} pages", every);
    }

    println!("\nFetcher:");
    println!("  Home URL: {}", config.fetcher.home_url);
    println!("  User agent: {}", config.fetcher.user_agent);
    println!(
        "  Timeouts: {}s request, {}s connect",
        config.fetcher.request_timeout_secs, config.fetcher.connect_timeout_secs
    );

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);

    println!("\nDigest:");
    println!("  Outbox: {}", config.digest.outbox_dir);
    println!("  Recipients: {}", config.digest.recipients.join(", "));
    println!("  Batch size: {}", config.digest.batch_size);
    println!(
        "  Excluded keywords ({}): {}",
        config.digest.exclude_keywords.len(),
        config.digest.exclude_keywords.join(", ")
    );

    println!("\nSearch URLs ({}):", config.scraper.search_urls.len());
    for url in &config.scraper.search_urls {
        println!("  - {}", url);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.storage.database_path);

    let storage = SqliteStorage::new(Path::new(&config.storage.database_path))?;
    let since = digest_since(Local::now(), config.digest.recency_hours);

    let stats = load_statistics(&storage, since)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --test-run mode: one short crawl plus a test digest
async fn handle_test_run(
    mut config: Config,
    url: Option<String>,
    max_pages: u32,
    email: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(email) = email {
        tracing::info!("Sending test digest to: {}", email);
        config.digest.recipients = parse_recipients(&email);
    }
    if config.digest.recipients.is_empty() {
        return Err(ConfigError::Validation(
            "no digest recipient; use --email or set EMAIL_RECIPIENTS".to_string(),
        )
        .into());
    }

    let url = match url.or_else(|| config.scraper.search_urls.first().cloned()) {
        Some(url) => url,
        None => return Err(ConfigError::Validation("no search URL to test".to_string()).into()),
    };

    println!("Starting test scrape from: {}", url);
    println!("Max pages to scrape: {}", max_pages);

    let mut coordinator = Coordinator::from_config(&config)?;
    let storage = coordinator.storage();

    let before = storage
        .lock()
        .map_err(|_| StorageError::LockPoisoned)?
        .count_listings()?;
    println!("Listings in database before scraping: {}", before);

    let report = coordinator.download_jobs(&url, Some(max_pages)).await?;
    println!(
        "Scraping completed ({:?}). {} new listings added to database.",
        report.outcome, report.added
    );

    let since = digest_since(Local::now(), None);
    let entries = {
        let storage = storage.lock().map_err(|_| StorageError::LockPoisoned)?;
        recent_entries(&*storage, since, TEST_DIGEST_LIMIT)?
    };

    if entries.is_empty() {
        println!("No listings found today to send");
        return Ok(());
    }

    println!("Sending test digest with {} listings...", entries.len());
    let notifier = OutboxNotifier::from_config(&config.digest);
    let filter = DigestFilter::from_config(&config.digest);
    send_digest_batches(&notifier, &filter, &entries, true)?;
    println!("✓ Test digest written to {}", notifier.dir().display());

    Ok(())
}

/// Handles the default mode: the periodic crawl and digest task
async fn handle_task(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Search URLs: {}, board: {}",
        config.scraper.search_urls.len(),
        config.scraper.board
    );

    match run_digest_task(config).await {
        Ok(report) => {
            let failed = report.crawls.iter().filter(|c| c.is_failed()).count();
            tracing::info!(
                "Task completed: {} new listings, {} digest batch(es), {} failed crawl(s)",
                report.total_added(),
                report.batches_sent,
                failed
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Task failed: {}", e);
            Err(e.into())
        }
    }
}
