//! Page fetching
//!
//! This module handles every request the crawl makes, including:
//! - The `PageSource` capability ("give me the HTML of this URL")
//! - An HTTP implementation with browser-like headers and a cookie jar
//! - One-time session setup (consent cookie, warm-up request)
//! - Error classification into transient and permanent failures
//! - Retry with backoff around a source, via `Fetcher`

use crate::config::FetcherConfig;
use crate::crawler::retry::{RetryOutcome, RetryPolicy, Retryable};
use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors produced while fetching a page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Blocked by bot detection at {url}: {reason}")]
    Blocked { url: String, reason: String },

    #[error("Session error: {0}")]
    Session(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl Retryable for FetchError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Network { .. } | Self::Blocked { .. } => true,
            Self::Session(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::InvalidUrl(_) => false,
        }
    }
}

/// Something that can turn a URL into page HTML
///
/// Implementations may be a plain HTTP client or a rendering engine that
/// waits for the offers container and scrolls until the page stops growing;
/// the extractor and coordinator only see the returned HTML.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// One-time setup before the first page of a crawl (cookie consent etc.)
    async fn prepare_session(&self) -> Result<(), FetchError> {
        Ok(())
    }

    /// Fetches one page, a single attempt
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError>;

    /// Releases the current session and starts a fresh one, set up again
    async fn restart_session(&self) -> Result<(), FetchError> {
        Ok(())
    }
}

struct Session {
    client: Client,
    jar: Arc<Jar>,
}

/// `PageSource` backed by reqwest
pub struct HttpSource {
    config: FetcherConfig,
    session: Mutex<Session>,
}

impl HttpSource {
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let session = build_session(&config)?;
        Ok(Self {
            config,
            session: Mutex::new(session),
        })
    }

    fn current(&self) -> Result<(Client, Arc<Jar>), FetchError> {
        let session = self
            .session
            .lock()
            .map_err(|_| FetchError::Session("session lock poisoned".to_string()))?;
        Ok((session.client.clone(), Arc::clone(&session.jar)))
    }
}

/// Builds an HTTP client that presents itself like a desktop browser
///
/// The client keeps cookies in `jar` and sends the board home page as referer.
pub fn build_http_client(config: &FetcherConfig, jar: Arc<Jar>) -> Result<Client, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, header_value(&config.accept_language)?);
    headers.insert(REFERER, header_value(&config.home_url)?);

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .cookie_provider(jar)
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
        .map_err(|e| FetchError::Session(format!("failed to build HTTP client: {}", e)))
}

fn header_value(value: &str) -> Result<HeaderValue, FetchError> {
    HeaderValue::from_str(value)
        .map_err(|e| FetchError::Session(format!("invalid header value '{}': {}", value, e)))
}

fn build_session(config: &FetcherConfig) -> Result<Session, FetchError> {
    let jar = Arc::new(Jar::default());
    let client = build_http_client(config, Arc::clone(&jar))?;
    Ok(Session { client, jar })
}

#[async_trait]
impl PageSource for HttpSource {
    async fn prepare_session(&self) -> Result<(), FetchError> {
        let (client, jar) = self.current()?;
        let home = Url::parse(&self.config.home_url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", self.config.home_url, e)))?;

        if let Some(cookie) = &self.config.consent_cookie {
            jar.add_cookie_str(&format!("{}; Path=/", cookie), &home);
            tracing::debug!("Consent cookie set for {}", home);
        }

        // Warm-up request so the board can hand out its session cookies
        let response = client
            .get(home.as_str())
            .send()
            .await
            .map_err(|e| classify_error(home.as_str(), e))?;
        check_status(home.as_str(), response.status())?;

        tracing::info!("Session prepared against {}", home);
        Ok(())
    }

    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        let (client, _) = self.current()?;

        tracing::debug!("Visit {}", url);
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;
        check_status(url, response.status())?;

        let body = response.text().await.map_err(|e| classify_error(url, e))?;

        if let Some(marker) = self
            .config
            .block_markers
            .iter()
            .find(|marker| body.contains(marker.as_str()))
        {
            return Err(FetchError::Blocked {
                url: url.to_string(),
                reason: format!("page contains '{}'", marker),
            });
        }

        Ok(body)
    }

    async fn restart_session(&self) -> Result<(), FetchError> {
        let fresh = build_session(&self.config)?;
        {
            let mut session = self
                .session
                .lock()
                .map_err(|_| FetchError::Session("session lock poisoned".to_string()))?;
            // The previous client and its connection pool drop here
            *session = fresh;
        }
        tracing::info!("HTTP session restarted");

        // A fresh jar holds no consent or board cookies yet
        self.prepare_session().await
    }
}

/// Maps a response status to a fetch error, if it is one
///
/// | Status | Error |
/// |--------|-------|
/// | 2xx/3xx | none |
/// | 403, 429 | `Blocked` (transient) |
/// | 5xx | `Status` (transient) |
/// | other 4xx | `Status` (permanent) |
fn check_status(url: &str, status: StatusCode) -> Result<(), FetchError> {
    if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
        return Err(FetchError::Blocked {
            url: url.to_string(),
            reason: format!("HTTP {}", status.as_u16()),
        });
    }

    if status.is_client_error() || status.is_server_error() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    Ok(())
}

fn classify_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if e.is_builder() {
        FetchError::InvalidUrl(format!("{}: {}", url, e))
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

/// A page source wrapped in the retry policy
pub struct Fetcher<P> {
    source: P,
    policy: RetryPolicy,
}

impl<P: PageSource> Fetcher<P> {
    pub fn new(source: P, policy: RetryPolicy) -> Self {
        Self { source, policy }
    }

    pub fn source(&self) -> &P {
        &self.source
    }

    /// Runs the source's session setup under the retry policy
    pub async fn prepare_session(&self) -> RetryOutcome<(), FetchError> {
        let source = &self.source;
        self.policy
            .run("Session setup", |_| async move { source.prepare_session().await })
            .await
    }

    /// Fetches `url`, retrying transient failures with backoff
    ///
    /// A session-level failure restarts the session before the next attempt.
    /// Exhausting the attempts is reported in the outcome, never raised.
    pub async fn fetch(&self, url: &str) -> RetryOutcome<String, FetchError> {
        let source = &self.source;
        let needs_restart = AtomicBool::new(false);
        let needs_restart = &needs_restart;

        self.policy
            .run(url, |_| async move {
                if needs_restart.swap(false, Ordering::SeqCst) {
                    if let Err(e) = source.restart_session().await {
                        needs_restart.store(true, Ordering::SeqCst);
                        return Err(e);
                    }
                }

                let result = source.fetch_page(url).await;
                if let Err(FetchError::Session(_)) = &result {
                    needs_restart.store(true, Ordering::SeqCst);
                }
                result
            })
            .await
    }

    /// Restarts the source's session under the retry policy
    pub async fn restart_session(&self) -> RetryOutcome<(), FetchError> {
        let source = &self.source;
        self.policy
            .run("Session restart", |_| async move { source.restart_session().await })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    /// Fails a fixed number of times, then serves a page
    struct FlakySource {
        failures: u32,
        error: fn() -> FetchError,
        calls: AtomicU32,
        restarts: AtomicU32,
    }

    impl FlakySource {
        fn new(failures: u32, error: fn() -> FetchError) -> Self {
            Self {
                failures,
                error,
                calls: AtomicU32::new(0),
                restarts: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl PageSource for FlakySource {
        async fn fetch_page(&self, _url: &str) -> Result<String, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err((self.error)())
            } else {
                Ok("<html></html>".to_string())
            }
        }

        async fn restart_session(&self) -> Result<(), FetchError> {
            self.restarts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn timeout() -> FetchError {
        FetchError::Timeout {
            url: "https://example.com".to_string(),
        }
    }

    fn not_found() -> FetchError {
        FetchError::Status {
            url: "https://example.com".to_string(),
            status: 404,
        }
    }

    fn session_lost() -> FetchError {
        FetchError::Session("browser context closed".to_string())
    }

    #[test]
    fn test_error_classification() {
        assert!(timeout().is_transient());
        assert!(session_lost().is_transient());
        assert!(!not_found().is_transient());
        assert!(FetchError::Status {
            url: String::new(),
            status: 503
        }
        .is_transient());
        assert!(!FetchError::InvalidUrl("x".to_string()).is_transient());
    }

    #[test]
    fn test_check_status() {
        assert!(check_status("u", StatusCode::OK).is_ok());
        assert!(matches!(
            check_status("u", StatusCode::TOO_MANY_REQUESTS),
            Err(FetchError::Blocked { .. })
        ));
        assert!(matches!(
            check_status("u", StatusCode::FORBIDDEN),
            Err(FetchError::Blocked { .. })
        ));
        assert!(matches!(
            check_status("u", StatusCode::BAD_GATEWAY),
            Err(FetchError::Status { status: 502, .. })
        ));
    }

    #[test]
    fn test_build_http_client() {
        let config = FetcherConfig::default();
        assert!(build_http_client(&config, Arc::new(Jar::default())).is_ok());
    }

    #[test]
    fn test_invalid_header_value_rejected() {
        let config = FetcherConfig {
            accept_language: "pl\nen".to_string(),
            ..FetcherConfig::default()
        };
        assert!(matches!(
            build_http_client(&config, Arc::new(Jar::default())),
            Err(FetchError::Session(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_succeeds_on_third_attempt_after_two_backoffs() {
        let fetcher = Fetcher::new(FlakySource::new(2, timeout), RetryPolicy::default());

        let start = tokio::time::Instant::now();
        let outcome = fetcher.fetch("https://example.com/?pn=1").await;

        assert_eq!(outcome.result.unwrap(), "<html></html>");
        assert_eq!(outcome.attempts, 3);
        assert_eq!(fetcher.source().calls.load(Ordering::SeqCst), 3);

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(6), "elapsed {:?}", elapsed);
        assert!(elapsed <= Duration::from_secs(8), "elapsed {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_fetch_exhausts_retries() {
        let fetcher = Fetcher::new(FlakySource::new(10, timeout), RetryPolicy::immediate(3));

        let outcome = fetcher.fetch("https://example.com/").await;

        assert!(matches!(outcome.result, Err(FetchError::Timeout { .. })));
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let fetcher = Fetcher::new(FlakySource::new(10, not_found), RetryPolicy::immediate(3));

        let outcome = fetcher.fetch("https://example.com/").await;

        assert!(outcome.result.is_err());
        assert_eq!(fetcher.source().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_session_failure_restarts_session() {
        let fetcher = Fetcher::new(FlakySource::new(1, session_lost), RetryPolicy::immediate(3));

        let outcome = fetcher.fetch("https://example.com/").await;

        assert!(outcome.result.is_ok());
        assert_eq!(fetcher.source().restarts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_default_session_setup_is_noop() {
        let fetcher = Fetcher::new(FlakySource::new(0, timeout), RetryPolicy::immediate(3));
        let outcome = fetcher.prepare_session().await;
        assert!(outcome.result.is_ok());
        assert_eq!(outcome.attempts, 1);
    }
}
