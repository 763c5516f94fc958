//! Statistics over the listing database
//!
//! This module provides functionality for extracting and displaying
//! listing counts from the storage layer.

use crate::storage::{Board, Storage};
use crate::JobScoutError;
use chrono::{DateTime, NaiveDate, Utc};

/// Listing statistics summary
#[derive(Debug, Clone)]
pub struct JobStatistics {
    /// Total number of stored listings
    pub total_listings: u64,

    /// Listings created since the start of the digest window
    pub listings_since: u64,

    /// Start of the window `listings_since` counts from
    pub since: DateTime<Utc>,

    /// Count of listings by board, boards without listings omitted
    pub listings_by_board: Vec<(Board, u64)>,

    /// Count of listings by UTC creation date, oldest first
    pub listings_by_day: Vec<(NaiveDate, u64)>,

    /// Number of distinct company rows
    pub total_companies: u64,
}

impl JobStatistics {
    /// Share of all listings created inside the window, in percent
    pub fn recent_percentage(&self) -> f64 {
        if self.total_listings > 0 {
            (self.listings_since as f64 / self.total_listings as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `since` - Start of the "new listings" window
pub fn load_statistics<S: Storage + ?Sized>(
    storage: &S,
    since: DateTime<Utc>,
) -> Result<JobStatistics, JobScoutError> {
    Ok(JobStatistics {
        total_listings: storage.count_listings()?,
        listings_since: storage.count_listings_since(since)?,
        since,
        listings_by_board: storage.count_listings_by_board()?,
        listings_by_day: storage.count_listings_by_day()?,
        total_companies: storage.count_companies()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &JobStatistics) {
    println!("=== Listing Statistics ===\n");

    println!("Overview:");
    println!("  Total listings: {}", stats.total_listings);
    println!(
        "  New since {}: {} ({:.2}%)",
        stats.since.format("%Y-%m-%d %H:%M UTC"),
        stats.listings_since,
        stats.recent_percentage()
    );
    println!("  Companies: {}", stats.total_companies);
    println!();

    if !stats.listings_by_board.is_empty() {
        println!("Listings by Board:");
        let mut counts = stats.listings_by_board.clone();
        counts.sort_by(|a, b| b.1.cmp(&a.1));

        for (board, count) in counts {
            println!("  {}: {}", board, count);
        }
        println!();
    }

    if !stats.listings_by_day.is_empty() {
        println!("Listings by Day:");
        for (day, count) in &stats.listings_by_day {
            println!("  {}: {}", day.format("%Y-%m-%d"), count);
        }
    }
}
