//! Configuration module for Jobscout
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use jobscout::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("jobscout.toml")).unwrap();
//! println!("Search URLs: {}", config.scraper.search_urls.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    default_exclude_keywords, Config, DigestConfig, FetcherConfig, ScraperConfig, StorageConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, parse_recipients, RECIPIENTS_ENV,
};
