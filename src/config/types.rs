use crate::storage::Board;
use serde::Deserialize;

/// Main configuration structure for Jobscout
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub digest: DigestConfig,
}

/// Crawl loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// Board the search URLs belong to
    #[serde(default = "default_board")]
    pub board: Board,

    /// Fully-formed search URLs; the page parameter is appended per page
    #[serde(rename = "search-urls")]
    pub search_urls: Vec<String>,

    /// Optional cap on pages fetched per search URL
    #[serde(rename = "max-pages", default)]
    pub max_pages: Option<u32>,

    /// Lower bound of the randomized delay between pages (milliseconds)
    #[serde(rename = "page-delay-min-ms", default = "default_page_delay_min_ms")]
    pub page_delay_min_ms: u64,

    /// Upper bound of the randomized delay between pages (milliseconds)
    #[serde(rename = "page-delay-max-ms", default = "default_page_delay_max_ms")]
    pub page_delay_max_ms: u64,

    /// Number of concurrent persistence workers per page
    #[serde(rename = "persist-workers", default = "default_persist_workers")]
    pub persist_workers: usize,

    /// Rebuild the fetch session every N pages
    #[serde(rename = "restart-every-pages", default)]
    pub restart_every_pages: Option<u32>,
}

/// HTTP fetcher configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Board home page, used as referer and for session setup
    #[serde(rename = "home-url", default = "default_home_url")]
    pub home_url: String,

    #[serde(rename = "accept-language", default = "default_accept_language")]
    pub accept_language: String,

    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Cookie (`name=value`) that records an accepted consent dialog
    #[serde(rename = "consent-cookie", default)]
    pub consent_cookie: Option<String>,

    /// Body fragments that identify a bot-detection page
    #[serde(rename = "block-markers", default = "default_block_markers")]
    pub block_markers: Vec<String>,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Digest selection and delivery configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DigestConfig {
    #[serde(default)]
    pub recipients: Vec<String>,

    /// Directory the rendered digests are written to
    #[serde(rename = "outbox-dir", default = "default_outbox_dir")]
    pub outbox_dir: String,

    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: usize,

    /// Select listings from the last N hours instead of since local midnight
    #[serde(rename = "recency-hours", default)]
    pub recency_hours: Option<u32>,

    #[serde(rename = "exclude-keywords", default = "default_exclude_keywords")]
    pub exclude_keywords: Vec<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            home_url: default_home_url(),
            accept_language: default_accept_language(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            consent_cookie: None,
            block_markers: default_block_markers(),
        }
    }
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            recipients: Vec::new(),
            outbox_dir: default_outbox_dir(),
            batch_size: default_batch_size(),
            recency_hours: None,
            exclude_keywords: default_exclude_keywords(),
        }
    }
}

fn default_board() -> Board {
    Board::Pracuj
}

fn default_page_delay_min_ms() -> u64 {
    1000
}

fn default_page_delay_max_ms() -> u64 {
    3000
}

fn default_persist_workers() -> usize {
    2
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36"
        .to_string()
}

fn default_home_url() -> String {
    "https://www.pracuj.pl/".to_string()
}

fn default_accept_language() -> String {
    "pl-PL,pl;q=0.9,en-US;q=0.8,en;q=0.7".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_block_markers() -> Vec<String> {
    vec![
        "cf-challenge".to_string(),
        "captcha-delivery".to_string(),
        "px-captcha".to_string(),
    ]
}

fn default_outbox_dir() -> String {
    "./outbox".to_string()
}

fn default_batch_size() -> usize {
    100
}

/// Title keywords excluded from the digest
pub fn default_exclude_keywords() -> Vec<String> {
    [
        "developer",
        "programista",
        "sprzedawca",
        "handlowiec",
        "software developer",
        "technik",
        "kucharz",
        "kelner",
        "księgowa",
        "engineer",
        "inżynier",
        "sprzedaży",
        "instruktor",
        "telemarketing",
        "call center",
    ]
    .iter()
    .map(|k| k.to_string())
    .collect()
}
