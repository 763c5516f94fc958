//! Crawler module for job board result pages
//!
//! This module contains the core crawling logic, including:
//! - Page fetching behind the `PageSource` trait, with retry and backoff
//! - Listing extraction from result page HTML
//! - Company identity resolution
//! - The page loop that ties them to storage

mod coordinator;
mod extractor;
mod fetcher;
mod identity;
mod retry;

pub use coordinator::{persist_listing, Coordinator, CrawlOutcome, CrawlReport, CrawlSettings};
pub use extractor::{extract, Listings, OfferPage, RawListing};
pub use fetcher::{build_http_client, FetchError, Fetcher, HttpSource, PageSource};
pub use identity::{
    normalize_company_name, resolve_company, Resolution, ResolvedCompany, LEGAL_SUFFIX,
};
pub use retry::{RetryOutcome, RetryPolicy, Retryable};

use crate::config::Config;
use crate::output::{
    digest_since, send_digest_batches, DigestFilter, NotifyError, OutboxNotifier,
};
use crate::storage::StorageError;
use crate::JobScoutError;
use chrono::Local;

/// What one run of the periodic task did
#[derive(Debug, Clone)]
pub struct TaskReport {
    /// One report per configured search URL, in order
    pub crawls: Vec<CrawlReport>,
    /// Entries selected for the digest
    pub digest_entries: usize,
    /// Digest batches delivered (0 when skipped)
    pub batches_sent: usize,
}

impl TaskReport {
    pub fn total_added(&self) -> u32 {
        self.crawls.iter().map(|c| c.added).sum()
    }
}

/// Runs the periodic job: crawl every search URL, then send the digest
///
/// A failed crawl does not stop the others or the digest. Missing digest
/// recipients are logged and the digest is skipped.
///
/// # Arguments
///
/// * `config` - The validated configuration
pub async fn run_digest_task(config: &Config) -> Result<TaskReport, JobScoutError> {
    let mut coordinator = Coordinator::from_config(config)?;

    let mut crawls = Vec::with_capacity(config.scraper.search_urls.len());
    for url in &config.scraper.search_urls {
        let report = coordinator
            .download_jobs(url, config.scraper.max_pages)
            .await?;
        if let CrawlOutcome::Failed { page, reason } = &report.outcome {
            tracing::warn!("Crawl of {} failed at page {}: {}", url, page, reason);
        }
        crawls.push(report);
    }

    let filter = DigestFilter::from_config(&config.digest);
    let since = digest_since(Local::now(), config.digest.recency_hours);
    let entries = {
        let storage = coordinator.storage();
        let storage = storage.lock().map_err(|_| StorageError::LockPoisoned)?;
        filter.select(&*storage, since)?
    };

    let notifier = OutboxNotifier::from_config(&config.digest);
    let batches_sent = match send_digest_batches(&notifier, &filter, &entries, false) {
        Ok(sent) => sent,
        Err(NotifyError::NoRecipients) => {
            tracing::warn!("{}; digest skipped", NotifyError::NoRecipients);
            0
        }
        Err(e) => return Err(e.into()),
    };

    let report = TaskReport {
        crawls,
        digest_entries: entries.len(),
        batches_sent,
    };
    tracing::info!(
        "Task finished: {} new listings, {} digest entries",
        report.total_added(),
        report.digest_entries
    );
    Ok(report)
}
