//! Digest selection
//!
//! Picks the listings worth mailing: created inside the recency window and
//! not matching any exclusion keyword. The selection is delivered in fixed
//! size batches.

use crate::config::DigestConfig;
use crate::output::traits::{Notifier, NotifyResult};
use crate::storage::{RecentListing, Storage, StorageResult};
use chrono::{DateTime, Duration, TimeZone, Utc};

/// One line of a digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestEntry {
    pub title: String,
    /// Empty when the listing has no company
    pub company_name: String,
    pub url: String,
}

impl DigestEntry {
    /// Display text, `"{title} w {company}"`
    pub fn label(&self) -> String {
        if self.company_name.is_empty() {
            self.title.clone()
        } else {
            format!("{} w {}", self.title, self.company_name)
        }
    }
}

impl From<RecentListing> for DigestEntry {
    fn from(listing: RecentListing) -> Self {
        Self {
            title: listing.title,
            company_name: listing.company_name.unwrap_or_default(),
            url: listing.url,
        }
    }
}

/// Keyword exclusion and batching rules
#[derive(Debug, Clone)]
pub struct DigestFilter {
    keywords: Vec<String>,
    batch_size: usize,
}

impl DigestFilter {
    pub fn new(keywords: &[String], batch_size: usize) -> Self {
        Self {
            keywords: keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            batch_size: batch_size.max(1),
        }
    }

    pub fn from_config(config: &DigestConfig) -> Self {
        Self::new(&config.exclude_keywords, config.batch_size)
    }

    /// Returns true if `title` contains any keyword, ignoring case
    pub fn is_excluded(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        self.keywords.iter().any(|k| title.contains(k.as_str()))
    }

    /// Listings created at or after `since` that pass the keyword filter
    pub fn select<S: Storage + ?Sized>(
        &self,
        storage: &S,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<DigestEntry>> {
        let entries: Vec<DigestEntry> = storage
            .listings_created_since(since)?
            .into_iter()
            .filter(|listing| !self.is_excluded(&listing.title))
            .map(DigestEntry::from)
            .collect();

        tracing::debug!("Digest selection since {}: {} entries", since, entries.len());
        Ok(entries)
    }

    pub fn batches<'a>(&self, entries: &'a [DigestEntry]) -> std::slice::Chunks<'a, DigestEntry> {
        entries.chunks(self.batch_size)
    }
}

/// The newest `limit` listings created at or after `since`, unfiltered
pub fn recent_entries<S: Storage + ?Sized>(
    storage: &S,
    since: DateTime<Utc>,
    limit: usize,
) -> StorageResult<Vec<DigestEntry>> {
    Ok(storage
        .listings_created_since(since)?
        .into_iter()
        .take(limit)
        .map(DigestEntry::from)
        .collect())
}

/// Start of the digest window
///
/// Midnight of `now`'s day in its own time zone, or `now` minus
/// `recency_hours` when set.
pub fn digest_since<Tz: TimeZone>(now: DateTime<Tz>, recency_hours: Option<u32>) -> DateTime<Utc> {
    let now_utc = now.with_timezone(&Utc);

    if let Some(hours) = recency_hours {
        return now_utc - Duration::hours(i64::from(hours));
    }

    let midnight = now.date_naive().and_hms_opt(0, 0, 0);
    midnight
        .and_then(|m| now.timezone().from_local_datetime(&m).earliest())
        .map(|m| m.with_timezone(&Utc))
        // A day without a local midnight (DST gap) falls back to 24 hours
        .unwrap_or(now_utc - Duration::hours(24))
}

/// Sends `entries` in batches, returning how many batches went out
///
/// Nothing is sent for an empty selection.
pub fn send_digest_batches<N: Notifier + ?Sized>(
    notifier: &N,
    filter: &DigestFilter,
    entries: &[DigestEntry],
    is_test: bool,
) -> NotifyResult<usize> {
    if entries.is_empty() {
        tracing::info!("No new listings for the digest");
        return Ok(0);
    }

    let mut sent = 0;
    for batch in filter.batches(entries) {
        notifier.send_digest(batch, is_test)?;
        sent += 1;
    }

    tracing::info!("Digest sent: {} entries in {} batch(es)", entries.len(), sent);
    Ok(sent)
}
