//! Crawl coordinator - the page loop
//!
//! This module drives one crawl of a search URL, including:
//! - One-time session setup under the retry policy
//! - Pagination through the `pn` query parameter
//! - Stop conditions (end of results, caught up, page cap, fetch failure)
//! - Concurrent persistence of a page's new listings
//! - Randomized pauses between pages

use crate::config::{Config, ScraperConfig};
use crate::crawler::extractor::{extract, RawListing};
use crate::crawler::fetcher::{Fetcher, HttpSource, PageSource};
use crate::crawler::identity::resolve_company;
use crate::crawler::retry::RetryPolicy;
use crate::state::{CrawlContext, CrawlState};
use crate::storage::{Board, NewListing, SqliteStorage, Storage, StorageError, StorageResult};
use crate::url::{offer_url, page_url};
use crate::JobScoutError;
use futures::stream::{self, StreamExt};
use rand::Rng;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Knobs of the page loop
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub board: Board,
    pub page_delay_min_ms: u64,
    pub page_delay_max_ms: u64,
    pub persist_workers: usize,
    pub restart_every_pages: Option<u32>,
}

impl CrawlSettings {
    pub fn from_config(config: &ScraperConfig) -> Self {
        Self {
            board: config.board,
            page_delay_min_ms: config.page_delay_min_ms,
            page_delay_max_ms: config.page_delay_max_ms,
            persist_workers: config.persist_workers,
            restart_every_pages: config.restart_every_pages,
        }
    }

    /// Settings without pauses between pages
    pub fn without_delay(board: Board) -> Self {
        Self {
            board,
            page_delay_min_ms: 0,
            page_delay_max_ms: 0,
            persist_workers: 2,
            restart_every_pages: None,
        }
    }

    fn page_delay(&self) -> Duration {
        let (min, max) = (self.page_delay_min_ms, self.page_delay_max_ms);
        let ms = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        };
        Duration::from_millis(ms)
    }
}

/// Why a crawl ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// A page came back without the offers section
    EndOfResults,
    /// A page added nothing new
    CaughtUp,
    /// The configured page cap was reached
    PageCap,
    /// A page (0 for session setup) could not be fetched within the retry bound
    Failed { page: u32, reason: String },
}

/// Summary of one `download_jobs` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    /// Listings stored by this crawl
    pub added: u32,
    pub pages_fetched: u32,
    pub outcome: CrawlOutcome,
}

impl CrawlReport {
    fn from_context(ctx: &CrawlContext, outcome: CrawlOutcome) -> Self {
        Self {
            added: ctx.total_added,
            pages_fetched: ctx.pages_fetched,
            outcome,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, CrawlOutcome::Failed { .. })
    }
}

/// Main crawl coordinator
///
/// Owns the fetcher and a handle to storage. The session is prepared on the
/// first crawl and reused by later ones.
pub struct Coordinator<P, S> {
    fetcher: Fetcher<P>,
    storage: Arc<Mutex<S>>,
    settings: CrawlSettings,
    session_ready: bool,
}

impl Coordinator<HttpSource, SqliteStorage> {
    /// Builds the HTTP-backed coordinator described by `config`
    pub fn from_config(config: &Config) -> Result<Self, JobScoutError> {
        let storage = SqliteStorage::new(Path::new(&config.storage.database_path))?;
        let source = HttpSource::new(config.fetcher.clone())?;

        Ok(Self::new(
            Fetcher::new(source, RetryPolicy::default()),
            Arc::new(Mutex::new(storage)),
            CrawlSettings::from_config(&config.scraper),
        ))
    }
}

impl<P, S> Coordinator<P, S>
where
    P: PageSource,
    S: Storage + 'static,
{
    pub fn new(fetcher: Fetcher<P>, storage: Arc<Mutex<S>>, settings: CrawlSettings) -> Self {
        Self {
            fetcher,
            storage,
            settings,
            session_ready: false,
        }
    }

    /// Shared handle to the coordinator's storage
    pub fn storage(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.storage)
    }

    /// Crawls `filter_url` page by page and stores the listings not seen before
    ///
    /// Fetch failures end the crawl with `CrawlOutcome::Failed` and the count
    /// of listings stored so far; they are not returned as errors. Errors are
    /// reserved for a malformed filter URL and broken invariants.
    ///
    /// # Arguments
    ///
    /// * `filter_url` - A search URL of the board, without the page parameter
    /// * `max_pages` - Optional cap on the number of pages fetched
    pub async fn download_jobs(
        &mut self,
        filter_url: &str,
        max_pages: Option<u32>,
    ) -> Result<CrawlReport, JobScoutError> {
        // Reject a malformed filter URL before touching the network
        page_url(filter_url, 1)?;

        let mut ctx = CrawlContext::new();

        if !self.session_ready {
            let setup = self.fetcher.prepare_session().await;
            if let Err(e) = setup.result {
                ctx.transition(CrawlState::Failed)?;
                return Ok(CrawlReport::from_context(
                    &ctx,
                    CrawlOutcome::Failed {
                        page: 0,
                        reason: format!("session setup failed: {}", e),
                    },
                ));
            }
            self.session_ready = true;
        }

        tracing::info!("Crawling {}", filter_url);
        let mut page = 1;

        loop {
            ctx.transition(CrawlState::FetchingPage(page))?;
            self.maybe_restart_session(page).await;

            let url = page_url(filter_url, page)?;
            let fetched = self.fetcher.fetch(url.as_str()).await;
            ctx.retries = fetched.attempts.saturating_sub(1);

            let html = match fetched.result {
                Ok(html) => html,
                Err(e) => {
                    tracing::error!("Could not get offers from page {}: {}", page, e);
                    ctx.transition(CrawlState::Failed)?;
                    return Ok(CrawlReport::from_context(
                        &ctx,
                        CrawlOutcome::Failed {
                            page,
                            reason: e.to_string(),
                        },
                    ));
                }
            };
            ctx.pages_fetched += 1;

            ctx.transition(CrawlState::Extracting(page))?;
            let listings = match collect_listings(&html) {
                Some(listings) => listings,
                None => {
                    tracing::info!("No offers on page {}, end of results", page);
                    ctx.transition(CrawlState::Stopped)?;
                    return Ok(self.finish(&ctx, CrawlOutcome::EndOfResults));
                }
            };

            ctx.transition(CrawlState::PersistingListings(page))?;
            let found = listings.len();
            let added = self.persist_page(listings).await;
            ctx.record_added(added);
            tracing::info!(
                "Page {}: {} listings, {} new ({} retries)",
                page,
                found,
                added,
                ctx.retries
            );

            if ctx.added_this_page == 0 {
                ctx.transition(CrawlState::Stopped)?;
                return Ok(self.finish(&ctx, CrawlOutcome::CaughtUp));
            }

            if max_pages.is_some_and(|cap| page >= cap) {
                ctx.transition(CrawlState::Stopped)?;
                return Ok(self.finish(&ctx, CrawlOutcome::PageCap));
            }

            tokio::time::sleep(self.settings.page_delay()).await;
            page += 1;
        }
    }

    fn finish(&self, ctx: &CrawlContext, outcome: CrawlOutcome) -> CrawlReport {
        tracing::info!(
            "Crawl stopped ({:?}): {} new listings from {} pages",
            outcome,
            ctx.total_added,
            ctx.pages_fetched
        );
        CrawlReport::from_context(ctx, outcome)
    }

    async fn maybe_restart_session(&self, page: u32) {
        let Some(every) = self.settings.restart_every_pages.filter(|n| *n > 0) else {
            return;
        };

        if page > 1 && (page - 1) % every == 0 {
            // The page fetch still runs; its own retries handle a broken session
            if let Err(e) = self.fetcher.restart_session().await.result {
                tracing::warn!("Session restart before page {} failed: {}", page, e);
            }
        }
    }

    /// Stores the new listings of one page, returning how many were added
    async fn persist_page(&self, listings: Vec<RawListing>) -> u32 {
        let board = self.settings.board;
        let workers = self.settings.persist_workers.max(1);

        let results = stream::iter(listings.into_iter().map(|raw| {
            let storage = Arc::clone(&self.storage);
            async move {
                let original_id = raw.original_id.clone();
                let result = tokio::task::spawn_blocking(move || {
                    let mut storage = storage.lock().map_err(|_| StorageError::LockPoisoned)?;
                    persist_listing(&mut *storage, board, raw)
                })
                .await;
                (original_id, result)
            }
        }))
        .buffer_unordered(workers)
        .collect::<Vec<_>>()
        .await;

        let mut added = 0;
        for (original_id, result) in results {
            match result {
                Ok(Ok(true)) => added += 1,
                Ok(Ok(false)) => {}
                Ok(Err(e)) => tracing::error!("Error while adding listing {}: {}", original_id, e),
                Err(e) => tracing::error!("Worker for listing {} failed: {}", original_id, e),
            }
        }
        added
    }
}

/// Parses a page and gathers its listings, `None` at the end of results
fn collect_listings(html: &str) -> Option<Vec<RawListing>> {
    extract(html).listings().map(Iterator::collect)
}

/// Stores one raw listing unless its (board, id) is already known
///
/// Returns `Ok(true)` when a row was inserted. Runs as one unit under the
/// storage lock so company resolution has a single writer.
pub fn persist_listing<S: Storage + ?Sized>(
    storage: &mut S,
    board: Board,
    raw: RawListing,
) -> StorageResult<bool> {
    if storage.listing_exists(board, &raw.original_id)? {
        return Ok(false);
    }

    let company = resolve_company(storage, &raw.company_name, &raw.company_url)?;

    let listing = NewListing {
        board,
        url: offer_url(board, &raw.original_id),
        original_id: raw.original_id,
        title: raw.title,
        seniority: raw.seniority,
        salary_text: raw.salary_text,
        company_id: company.map(|resolved| resolved.company.id),
    };

    match storage.create_listing(listing) {
        Ok(stored) => {
            tracing::debug!("Added listing {} ({})", stored.original_id, stored.title);
            Ok(true)
        }
        // Lost a race with another worker for the same id
        Err(StorageError::DuplicateListing { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}
