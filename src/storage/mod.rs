//! Storage module for persisting listings and companies
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Listing existence checks and inserts keyed by (board, original id)
//! - Company lookups used by the identity resolver
//! - Queries backing the digest and statistics output

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;

/// Job board a listing originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Board {
    #[serde(alias = "no-fluff", alias = "nofluffjobs")]
    NoFluff,
    #[serde(alias = "just-join-it", alias = "justjoin")]
    JustJoinIt,
    Pracuj,
}

impl Board {
    pub fn to_db_value(&self) -> i64 {
        match self {
            Self::NoFluff => 1,
            Self::JustJoinIt => 2,
            Self::Pracuj => 3,
        }
    }

    pub fn from_db_value(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::NoFluff),
            2 => Some(Self::JustJoinIt),
            3 => Some(Self::Pracuj),
            _ => None,
        }
    }

    pub fn all() -> [Self; 3] {
        [Self::NoFluff, Self::JustJoinIt, Self::Pracuj]
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoFluff => "nofluff",
            Self::JustJoinIt => "justjoinit",
            Self::Pracuj => "pracuj",
        };
        write!(f, "{}", name)
    }
}

/// Manual review status of a listing or company
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReviewStatus {
    #[default]
    Unknown,
    Rejected,
    Interested,
    Hyped,
}

impl ReviewStatus {
    pub fn to_db_value(&self) -> i64 {
        match self {
            Self::Unknown => 0,
            Self::Rejected => 1,
            Self::Interested => 2,
            Self::Hyped => 3,
        }
    }

    /// Unrecognized values read back as `Unknown`
    pub fn from_db_value(value: i64) -> Self {
        match value {
            1 => Self::Rejected,
            2 => Self::Interested,
            3 => Self::Hyped,
            _ => Self::Unknown,
        }
    }
}

/// A persisted company
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub size_from: u32,
    pub size_to: u32,
    pub industry: Option<String>,
    pub status: ReviewStatus,
}

/// Fields of a company about to be created
#[derive(Debug, Clone)]
pub struct NewCompany {
    pub name: String,
    pub url: String,
    pub size_from: u32,
    pub size_to: u32,
    pub industry: Option<String>,
}

impl NewCompany {
    /// A first sighting: size range unknown (0, 0), no industry
    pub fn sighted(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            size_from: 0,
            size_to: 0,
            industry: None,
        }
    }
}

/// A persisted listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub id: i64,
    pub board: Board,
    pub original_id: String,
    pub title: String,
    pub url: String,
    pub seniority: String,
    pub salary_text: String,
    pub company_id: Option<i64>,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
}

/// Fields of a listing about to be created
#[derive(Debug, Clone)]
pub struct NewListing {
    pub board: Board,
    pub original_id: String,
    pub title: String,
    pub url: String,
    pub seniority: String,
    pub salary_text: String,
    pub company_id: Option<i64>,
}

/// A listing joined with its company name, as read for digests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentListing {
    pub title: String,
    pub company_name: Option<String>,
    pub url: String,
    pub created_at: DateTime<Utc>,
}
