//! File-based digest delivery
//!
//! Each batch is rendered to an HTML message and written to the outbox
//! directory, where a mail relay picks it up. Recipients and subject travel
//! in a header comment at the top of the file.

use crate::config::DigestConfig;
use crate::output::digest::DigestEntry;
use crate::output::traits::{Notifier, NotifyError, NotifyResult};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Subject line of every digest
pub const DIGEST_SUBJECT: &str = "Found a lot of new offers";

/// Writes digests as HTML files into a directory
pub struct OutboxNotifier {
    dir: PathBuf,
    recipients: Vec<String>,
    written: AtomicUsize,
}

impl OutboxNotifier {
    pub fn new(dir: impl Into<PathBuf>, recipients: Vec<String>) -> Self {
        Self {
            dir: dir.into(),
            recipients,
            written: AtomicUsize::new(0),
        }
    }

    pub fn from_config(config: &DigestConfig) -> Self {
        Self::new(&config.outbox_dir, config.recipients.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn next_path(&self) -> PathBuf {
        let seq = self.written.fetch_add(1, Ordering::SeqCst);
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.6fZ");
        self.dir.join(format!("digest-{}-{:03}.html", stamp, seq))
    }
}

impl Notifier for OutboxNotifier {
    fn send_digest(&self, entries: &[DigestEntry], is_test: bool) -> NotifyResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        if self.recipients.is_empty() {
            return Err(NotifyError::NoRecipients);
        }

        fs::create_dir_all(&self.dir)?;
        let path = self.next_path();
        fs::write(&path, render_message(&self.recipients, entries, is_test))?;

        tracing::info!(
            "Digest with {} entries for {} written to {}",
            entries.len(),
            self.recipients.join(", "),
            path.display()
        );
        Ok(())
    }
}

pub fn digest_subject(is_test: bool) -> String {
    if is_test {
        format!("[TEST] {}", DIGEST_SUBJECT)
    } else {
        DIGEST_SUBJECT.to_string()
    }
}

/// Renders the digest body: a heading followed by one link per entry
pub fn render_digest_html(entries: &[DigestEntry]) -> String {
    let mut body = String::from("<br><h2>Nowe oferty:</h2><br>");
    for entry in entries {
        body.push_str(&format!(
            "<a href=\"{}\">{}</a><br>",
            escape_html(&entry.url),
            escape_html(&entry.label())
        ));
    }
    body
}

fn render_message(recipients: &[String], entries: &[DigestEntry], is_test: bool) -> String {
    format!(
        "<!--\nTo: {}\nSubject: {}\n-->\n<html><body>{}</body></html>\n",
        recipients.join(", "),
        digest_subject(is_test),
        render_digest_html(entries)
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
