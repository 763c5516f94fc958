//! Output module for digests and statistics
//!
//! This module handles:
//! - Selecting new listings for the digest and batching them
//! - Delivering digests through a `Notifier` (an HTML outbox by default)
//! - Reporting listing statistics

mod digest;
mod outbox;
pub mod stats;
mod traits;

pub use digest::{
    digest_since, recent_entries, send_digest_batches, DigestEntry, DigestFilter,
};
pub use outbox::{digest_subject, render_digest_html, OutboxNotifier, DIGEST_SUBJECT};
pub use stats::{load_statistics, print_statistics, JobStatistics};
pub use traits::{Notifier, NotifyError, NotifyResult};
