/// Crawl state definitions for the page loop
///
/// A crawl walks `Start → FetchingPage → Extracting → PersistingListings`
/// and then either moves on to the next page or ends in `Stopped`/`Failed`.
use crate::JobScoutError;
use std::fmt;

/// Represents where a crawl currently is in the page loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlState {
    /// Nothing fetched yet
    Start,

    /// Fetching the given result page
    FetchingPage(u32),

    /// Parsing the given page's HTML
    Extracting(u32),

    /// Storing the given page's new listings
    PersistingListings(u32),

    /// Normal termination (end of results, caught up, or page cap)
    Stopped,

    /// Early termination after a page could not be fetched
    Failed,
}

impl CrawlState {
    /// Returns true for `Stopped` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }

    /// Returns true if the crawl may move from `self` to `next`
    pub fn can_transition_to(&self, next: CrawlState) -> bool {
        match (*self, next) {
            (Self::Start, Self::FetchingPage(1)) => true,
            (Self::Start, Self::Failed) => true,
            (Self::FetchingPage(n), Self::Extracting(m)) => n == m,
            (Self::FetchingPage(_), Self::Failed) => true,
            (Self::Extracting(n), Self::PersistingListings(m)) => n == m,
            (Self::Extracting(_), Self::Stopped) => true,
            (Self::PersistingListings(n), Self::FetchingPage(m)) => m == n + 1,
            (Self::PersistingListings(_), Self::Stopped) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::FetchingPage(n) => write!(f, "fetching_page({})", n),
            Self::Extracting(n) => write!(f, "extracting({})", n),
            Self::PersistingListings(n) => write!(f, "persisting_listings({})", n),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Ephemeral counters of one crawl invocation
///
/// Owned by the coordinator for the duration of `download_jobs` and never
/// shared across crawls.
#[derive(Debug, Clone)]
pub struct CrawlContext {
    state: CrawlState,

    /// Current 1-based page number (0 before the first page)
    pub page: u32,

    /// Listings added on the current page
    pub added_this_page: u32,

    /// Fetch retries spent on the current page
    pub retries: u32,

    /// Listings added since the crawl started
    pub total_added: u32,

    /// Pages fetched successfully
    pub pages_fetched: u32,
}

impl CrawlContext {
    pub fn new() -> Self {
        Self {
            state: CrawlState::Start,
            page: 0,
            added_this_page: 0,
            retries: 0,
            total_added: 0,
            pages_fetched: 0,
        }
    }

    pub fn state(&self) -> CrawlState {
        self.state
    }

    /// Moves to `next`, rejecting transitions the page loop never makes
    ///
    /// Entering `FetchingPage(n)` resets the per-page counters.
    pub fn transition(&mut self, next: CrawlState) -> Result<(), JobScoutError> {
        if !self.state.can_transition_to(next) {
            return Err(JobScoutError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        if let CrawlState::FetchingPage(n) = next {
            self.page = n;
            self.added_this_page = 0;
            self.retries = 0;
        }

        tracing::trace!("Crawl state {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Records the outcome of one listing's persistence
    pub fn record_added(&mut self, added: u32) {
        self.added_this_page += added;
        self.total_added += added;
    }
}

impl Default for CrawlContext {
    fn default() -> Self {
        Self::new()
    }
}
