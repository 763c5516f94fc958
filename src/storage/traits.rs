//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{Board, Company, Listing, NewCompany, NewListing, RecentListing};
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Company not found: {0}")]
    CompanyNotFound(i64),

    #[error("Listing {board}/{original_id} already exists")]
    DuplicateListing { board: Board, original_id: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// The crawl owns no durable state; everything that outlives a crawl goes
/// through this trait. Implementations are moved into blocking worker tasks,
/// hence the `Send` bound.
pub trait Storage: Send {
    // ===== Listings =====

    /// Returns true if a listing with this business key is already stored
    fn listing_exists(&self, board: Board, original_id: &str) -> StorageResult<bool>;

    /// Inserts a new listing, stamping its creation time
    fn create_listing(&mut self, listing: NewListing) -> StorageResult<Listing>;

    // ===== Companies =====

    /// Companies whose stored name case-insensitively equals `name`
    fn find_company_matches(&self, name: &str) -> StorageResult<Vec<Company>>;

    /// Inserts a new company
    fn create_company(&mut self, company: NewCompany) -> StorageResult<Company>;

    /// Replaces a company's URL
    fn update_company_url(&mut self, company_id: i64, url: &str) -> StorageResult<()>;

    // ===== Digest and statistics =====

    /// Listings created at or after `since`, newest first
    fn listings_created_since(&self, since: DateTime<Utc>) -> StorageResult<Vec<RecentListing>>;

    /// Total number of stored listings
    fn count_listings(&self) -> StorageResult<u64>;

    /// Listings created at or after `since`
    fn count_listings_since(&self, since: DateTime<Utc>) -> StorageResult<u64>;

    /// Listing counts per board (boards without listings are omitted)
    fn count_listings_by_board(&self) -> StorageResult<Vec<(Board, u64)>>;

    /// Listing counts per UTC creation date, oldest first
    fn count_listings_by_day(&self) -> StorageResult<Vec<(NaiveDate, u64)>>;

    /// Total number of stored companies
    fn count_companies(&self) -> StorageResult<u64>;
}
