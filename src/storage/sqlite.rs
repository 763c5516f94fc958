//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    Board, Company, Listing, NewCompany, NewListing, RecentListing, ReviewStatus,
};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path` and applies the schema
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        Self::from_connection(conn)
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        register_casefold(&conn)?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn get_company(&self, company_id: i64) -> StorageResult<Company> {
        self.conn
            .query_row(
                "SELECT id, name, url, size_from, size_to, industry, status
                 FROM companies WHERE id = ?1",
                params![company_id],
                company_from_row,
            )
            .optional()?
            .ok_or(StorageError::CompanyNotFound(company_id))
    }
}

/// SQLite's own `lower()` only folds ASCII; company names are Polish.
fn register_casefold(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "casefold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value: Option<String> = ctx.get(0)?;
            Ok(value.map(|v| v.to_lowercase()))
        },
    )
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_board(idx: usize, value: i64) -> rusqlite::Result<Board> {
    Board::from_db_value(value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("unknown board value {}", value).into(),
        )
    })
}

fn company_from_row(row: &Row<'_>) -> rusqlite::Result<Company> {
    Ok(Company {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        size_from: row.get(3)?,
        size_to: row.get(4)?,
        industry: row.get(5)?,
        status: ReviewStatus::from_db_value(row.get(6)?),
    })
}

fn listing_from_row(row: &Row<'_>) -> rusqlite::Result<Listing> {
    let created_at: String = row.get(9)?;
    Ok(Listing {
        id: row.get(0)?,
        board: parse_board(1, row.get(1)?)?,
        original_id: row.get(2)?,
        title: row.get(3)?,
        url: row.get(4)?,
        seniority: row.get(5)?,
        salary_text: row.get(6)?,
        company_id: row.get(7)?,
        status: ReviewStatus::from_db_value(row.get(8)?),
        created_at: parse_timestamp(9, &created_at)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Listings =====

    fn listing_exists(&self, board: Board, original_id: &str) -> StorageResult<bool> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM listings WHERE board = ?1 AND original_id = ?2",
                params![board.to_db_value(), original_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(existing.is_some())
    }

    fn create_listing(&mut self, listing: NewListing) -> StorageResult<Listing> {
        let now = Utc::now();
        let result = self.conn.execute(
            "INSERT INTO listings
                (board, original_id, company_id, title, url, seniority, salary_text, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                listing.board.to_db_value(),
                listing.original_id,
                listing.company_id,
                listing.title,
                listing.url,
                listing.seniority,
                listing.salary_text,
                ReviewStatus::Unknown.to_db_value(),
                format_timestamp(now),
            ],
        );

        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(StorageError::DuplicateListing {
                    board: listing.board,
                    original_id: listing.original_id,
                });
            }
            Err(e) => return Err(e.into()),
        }

        let id = self.conn.last_insert_rowid();
        let stored = self.conn.query_row(
            "SELECT id, board, original_id, title, url, seniority, salary_text,
                    company_id, status, created_at
             FROM listings WHERE id = ?1",
            params![id],
            listing_from_row,
        )?;
        Ok(stored)
    }

    // ===== Companies =====

    fn find_company_matches(&self, name: &str) -> StorageResult<Vec<Company>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, url, size_from, size_to, industry, status
             FROM companies WHERE casefold(name) = casefold(?1) ORDER BY id",
        )?;

        let companies = stmt
            .query_map(params![name], company_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(companies)
    }

    fn create_company(&mut self, company: NewCompany) -> StorageResult<Company> {
        self.conn.execute(
            "INSERT INTO companies (name, industry, size_from, size_to, url, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                company.name,
                company.industry,
                company.size_from,
                company.size_to,
                company.url,
                ReviewStatus::Unknown.to_db_value(),
            ],
        )?;

        self.get_company(self.conn.last_insert_rowid())
    }

    fn update_company_url(&mut self, company_id: i64, url: &str) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE companies SET url = ?1 WHERE id = ?2",
            params![url, company_id],
        )?;

        if updated == 0 {
            return Err(StorageError::CompanyNotFound(company_id));
        }
        Ok(())
    }

    // ===== Digest and statistics =====

    fn listings_created_since(&self, since: DateTime<Utc>) -> StorageResult<Vec<RecentListing>> {
        let mut stmt = self.conn.prepare(
            "SELECT l.title, c.name, l.url, l.created_at
             FROM listings l
             LEFT JOIN companies c ON c.id = l.company_id
             WHERE l.created_at >= ?1
             ORDER BY l.created_at DESC, l.id DESC",
        )?;

        let rows = stmt
            .query_map(params![format_timestamp(since)], |row| {
                let created_at: String = row.get(3)?;
                Ok(RecentListing {
                    title: row.get(0)?,
                    company_name: row.get(1)?,
                    url: row.get(2)?,
                    created_at: parse_timestamp(3, &created_at)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn count_listings(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_listings_since(&self, since: DateTime<Utc>) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM listings WHERE created_at >= ?1",
            params![format_timestamp(since)],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_listings_by_board(&self) -> StorageResult<Vec<(Board, u64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT board, COUNT(*) FROM listings GROUP BY board ORDER BY board")?;

        let counts = stmt
            .query_map([], |row| {
                Ok((parse_board(0, row.get(0)?)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }

    fn count_listings_by_day(&self) -> StorageResult<Vec<(NaiveDate, u64)>> {
        // Stored timestamps are RFC 3339 in UTC, so the first ten chars are the date
        let mut stmt = self.conn.prepare(
            "SELECT substr(created_at, 1, 10) AS day, COUNT(*)
             FROM listings GROUP BY day ORDER BY day",
        )?;

        let counts = stmt
            .query_map([], |row| {
                let day: String = row.get(0)?;
                let day = NaiveDate::parse_from_str(&day, "%Y-%m-%d").map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))
                })?;
                Ok((day, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }

    fn count_companies(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM companies", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
