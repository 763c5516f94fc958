//! Notifier trait and error types
//!
//! A notifier delivers one batch of digest entries. Delivery is pluggable;
//! the crate ships a file-based outbox.

use crate::output::digest::DigestEntry;
use thiserror::Error;

/// Errors that can occur while delivering a digest
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("No digest recipients configured (set [digest] recipients or EMAIL_RECIPIENTS)")]
    NoRecipients,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for notifier operations
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Trait for digest delivery backends
pub trait Notifier {
    /// Delivers one batch of entries
    ///
    /// An empty batch is a no-op. Test digests are marked as such for the
    /// recipients.
    fn send_digest(&self, entries: &[DigestEntry], is_test: bool) -> NotifyResult<()>;
}
