//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlState`: where a crawl is in the page loop, with validated transitions
//! - `CrawlContext`: the per-crawl counters owned by the coordinator

mod crawl_state;

pub use crawl_state::{CrawlContext, CrawlState};
