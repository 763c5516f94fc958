//! Integration tests for the crawler
//!
//! These tests use wiremock to serve board result pages and run the full
//! crawl cycle end-to-end over HTTP.

use chrono::{DateTime, NaiveDate, Utc};
use jobscout::config::{Config, FetcherConfig};
use jobscout::crawler::{
    run_digest_task, Coordinator, CrawlOutcome, CrawlSettings, Fetcher, HttpSource, RetryPolicy,
};
use jobscout::storage::{
    Board, Company, Listing, NewCompany, NewListing, RecentListing, SqliteStorage, Storage,
    StorageResult,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Storage that counts inserts on top of an in-memory database
struct RecordingStorage {
    inner: SqliteStorage,
    creates: Arc<AtomicUsize>,
}

impl RecordingStorage {
    fn new() -> (Self, Arc<AtomicUsize>) {
        let creates = Arc::new(AtomicUsize::new(0));
        let storage = Self {
            inner: SqliteStorage::new_in_memory().expect("in-memory database"),
            creates: Arc::clone(&creates),
        };
        (storage, creates)
    }
}

impl Storage for RecordingStorage {
    fn listing_exists(&self, board: Board, original_id: &str) -> StorageResult<bool> {
        self.inner.listing_exists(board, original_id)
    }

    fn create_listing(&mut self, listing: NewListing) -> StorageResult<Listing> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create_listing(listing)
    }

    fn find_company_matches(&self, name: &str) -> StorageResult<Vec<Company>> {
        self.inner.find_company_matches(name)
    }

    fn create_company(&mut self, company: NewCompany) -> StorageResult<Company> {
        self.inner.create_company(company)
    }

    fn update_company_url(&mut self, company_id: i64, url: &str) -> StorageResult<()> {
        self.inner.update_company_url(company_id, url)
    }

    fn listings_created_since(&self, since: DateTime<Utc>) -> StorageResult<Vec<RecentListing>> {
        self.inner.listings_created_since(since)
    }

    fn count_listings(&self) -> StorageResult<u64> {
        self.inner.count_listings()
    }

    fn count_listings_since(&self, since: DateTime<Utc>) -> StorageResult<u64> {
        self.inner.count_listings_since(since)
    }

    fn count_listings_by_board(&self) -> StorageResult<Vec<(Board, u64)>> {
        self.inner.count_listings_by_board()
    }

    fn count_listings_by_day(&self) -> StorageResult<Vec<(NaiveDate, u64)>> {
        self.inner.count_listings_by_day()
    }

    fn count_companies(&self) -> StorageResult<u64> {
        self.inner.count_companies()
    }
}

fn offer(id: &str, title: &str, company: &str) -> String {
    format!(
        r#"<div><div data-test-offerid="{id}">
            <h2 data-test="offer-title">{title}</h2>
            <div data-test="section-company">
                <a href="https://www.pracuj.pl/pracodawcy/{company},1"><h3>{company}</h3></a>
            </div>
            <ul><li>Specjalista (Mid / Regular)</li></ul>
            <span data-test="offer-salary">6 000 zł</span>
        </div></div>"#
    )
}

fn results_page(offers: &[String]) -> String {
    format!(
        r#"<html><body><div data-test="section-offers">{}</div></body></html>"#,
        offers.concat()
    )
}

const NO_RESULTS: &str = "<html><body><h1>Brak ofert</h1></body></html>";

async fn mount_home(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>home</html>"))
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, page: u32, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/praca/warszawa;wp"))
        .and(query_param("pn", page.to_string()))
        .respond_with(response)
        .mount(server)
        .await;
}

fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body.into())
        .insert_header("content-type", "text/html; charset=utf-8")
}

fn fetcher_config(server: &MockServer) -> FetcherConfig {
    FetcherConfig {
        home_url: format!("{}/", server.uri()),
        request_timeout_secs: 5,
        connect_timeout_secs: 5,
        ..FetcherConfig::default()
    }
}

fn filter_url(server: &MockServer) -> String {
    format!("{}/praca/warszawa;wp?rd=0", server.uri())
}

fn coordinator<S: Storage + 'static>(
    config: FetcherConfig,
    storage: S,
) -> Coordinator<HttpSource, S> {
    coordinator_with(config, storage, CrawlSettings::without_delay(Board::Pracuj))
}

fn coordinator_with<S: Storage + 'static>(
    config: FetcherConfig,
    storage: S,
    settings: CrawlSettings,
) -> Coordinator<HttpSource, S> {
    let source = HttpSource::new(config).expect("HTTP client");
    Coordinator::new(
        Fetcher::new(source, RetryPolicy::immediate(3)),
        Arc::new(Mutex::new(storage)),
        settings,
    )
}

#[tokio::test]
async fn test_crawl_skips_known_listings() {
    let server = MockServer::start().await;
    mount_home(&server).await;
    mount_page(
        &server,
        1,
        html(results_page(&[
            offer("501", "Recepcjonistka", "Acme"),
            offer("502", "Asystentka biura", "Globex"),
            offer("503", "Magazynier", "Initech"),
        ])),
    )
    .await;
    mount_page(&server, 2, html(NO_RESULTS)).await;

    let (mut storage, creates) = RecordingStorage::new();
    storage
        .inner
        .create_listing(NewListing {
            board: Board::Pracuj,
            original_id: "502".to_string(),
            title: "Asystentka biura".to_string(),
            url: "https://www.pracuj.pl/praca/,oferta,502".to_string(),
            seniority: String::new(),
            salary_text: String::new(),
            company_id: None,
        })
        .unwrap();

    let mut coordinator = coordinator(fetcher_config(&server), storage);
    let report = coordinator
        .download_jobs(&filter_url(&server), None)
        .await
        .unwrap();

    assert_eq!(report.added, 2);
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.outcome, CrawlOutcome::EndOfResults);
    assert_eq!(creates.load(Ordering::SeqCst), 2);

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_listings().unwrap(), 3);

    let acme = storage.find_company_matches("acme").unwrap();
    assert_eq!(acme.len(), 1);
    assert_eq!(acme[0].url, "https://www.pracuj.pl/pracodawcy/Acme,1");
}

#[tokio::test]
async fn test_stored_listing_fields() {
    let server = MockServer::start().await;
    mount_home(&server).await;
    mount_page(
        &server,
        1,
        html(results_page(&[offer("777", "Office Assistant", "Acme sp. z o.o.")])),
    )
    .await;
    mount_page(&server, 2, html(NO_RESULTS)).await;

    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = coordinator(fetcher_config(&server), storage);
    coordinator
        .download_jobs(&filter_url(&server), None)
        .await
        .unwrap();

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    let recent = storage
        .listings_created_since(Utc::now() - chrono::Duration::hours(1))
        .unwrap();

    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].title, "Office Assistant");
    assert_eq!(recent[0].url, "https://www.pracuj.pl/praca/,oferta,777");
    assert_eq!(recent[0].company_name.as_deref(), Some("acme"));
}

#[tokio::test]
async fn test_missing_offers_section_stops_crawl() {
    let server = MockServer::start().await;
    mount_home(&server).await;
    mount_page(&server, 1, html(NO_RESULTS)).await;

    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = coordinator(fetcher_config(&server), storage);
    let report = coordinator
        .download_jobs(&filter_url(&server), None)
        .await
        .unwrap();

    assert_eq!(report.added, 0);
    assert_eq!(report.pages_fetched, 1);
    assert_eq!(report.outcome, CrawlOutcome::EndOfResults);
}

#[tokio::test]
async fn test_listing_without_id_is_skipped() {
    let server = MockServer::start().await;
    mount_home(&server).await;
    let broken = r#"<div><div class="promo"><h2 data-test="offer-title">Sponsored</h2></div></div>"#;
    mount_page(
        &server,
        1,
        html(results_page(&[
            broken.to_string(),
            offer("601", "Kierowca", "Acme"),
        ])),
    )
    .await;
    mount_page(&server, 2, html(NO_RESULTS)).await;

    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = coordinator(fetcher_config(&server), storage);
    let report = coordinator
        .download_jobs(&filter_url(&server), None)
        .await
        .unwrap();

    assert_eq!(report.added, 1);
}

#[tokio::test]
async fn test_recrawl_is_idempotent() {
    let server = MockServer::start().await;
    mount_home(&server).await;
    mount_page(
        &server,
        1,
        html(results_page(&[
            offer("701", "Recepcjonistka", "Acme"),
            offer("702", "Asystentka", "Acme"),
        ])),
    )
    .await;
    mount_page(&server, 2, html(NO_RESULTS)).await;

    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = coordinator(fetcher_config(&server), storage);

    let first = coordinator
        .download_jobs(&filter_url(&server), None)
        .await
        .unwrap();
    let second = coordinator
        .download_jobs(&filter_url(&server), None)
        .await
        .unwrap();

    assert_eq!(first.added, 2);
    assert_eq!(second.added, 0);
    assert_eq!(second.outcome, CrawlOutcome::CaughtUp);

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_listings().unwrap(), 2);
    assert_eq!(storage.count_companies().unwrap(), 1);
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let server = MockServer::start().await;
    mount_home(&server).await;
    mount_page(
        &server,
        1,
        html(results_page(&[offer("801", "Recepcjonistka", "Acme")])),
    )
    .await;

    Mock::given(method("GET"))
        .and(query_param("pn", "2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = coordinator(fetcher_config(&server), storage);
    let report = coordinator
        .download_jobs(&filter_url(&server), None)
        .await
        .unwrap();

    assert_eq!(report.added, 1);
    assert!(report.is_failed());
    assert!(matches!(report.outcome, CrawlOutcome::Failed { page: 2, .. }));
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;
    mount_home(&server).await;

    Mock::given(method("GET"))
        .and(query_param("pn", "1"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = coordinator(fetcher_config(&server), storage);
    let report = coordinator
        .download_jobs(&filter_url(&server), None)
        .await
        .unwrap();

    assert!(matches!(report.outcome, CrawlOutcome::Failed { page: 1, .. }));
    assert_eq!(report.pages_fetched, 0);
}

#[tokio::test]
async fn test_block_page_is_retried_then_fails() {
    let server = MockServer::start().await;
    mount_home(&server).await;

    Mock::given(method("GET"))
        .and(query_param("pn", "1"))
        .respond_with(html(
            r#"<html><body><div id="px-captcha">Press and hold</div></body></html>"#,
        ))
        .expect(3)
        .mount(&server)
        .await;

    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = coordinator(fetcher_config(&server), storage);
    let report = coordinator
        .download_jobs(&filter_url(&server), None)
        .await
        .unwrap();

    match report.outcome {
        CrawlOutcome::Failed { page, reason } => {
            assert_eq!(page, 1);
            assert!(reason.contains("px-captcha"), "reason: {}", reason);
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_consent_cookie_sent_with_page_requests() {
    let server = MockServer::start().await;
    mount_home(&server).await;

    Mock::given(method("GET"))
        .and(query_param("pn", "1"))
        .and(header("cookie", "gdpr_consent=1"))
        .respond_with(html(NO_RESULTS))
        .expect(1)
        .mount(&server)
        .await;

    let config = FetcherConfig {
        consent_cookie: Some("gdpr_consent=1".to_string()),
        ..fetcher_config(&server)
    };
    let mut coordinator = coordinator(config, SqliteStorage::new_in_memory().unwrap());
    let report = coordinator
        .download_jobs(&filter_url(&server), None)
        .await
        .unwrap();

    assert_eq!(report.outcome, CrawlOutcome::EndOfResults);
}

#[tokio::test]
async fn test_restarted_session_keeps_consent_cookie() {
    let server = MockServer::start().await;

    // Initial setup plus a restart before pages 2 and 3
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>home</html>"))
        .expect(3)
        .mount(&server)
        .await;

    let pages = [
        results_page(&[offer("1101", "Recepcjonistka", "Acme")]),
        results_page(&[offer("1102", "Magazynier", "Globex")]),
        NO_RESULTS.to_string(),
    ];
    for (page, body) in pages.into_iter().enumerate() {
        Mock::given(method("GET"))
            .and(path("/praca/warszawa;wp"))
            .and(query_param("pn", (page + 1).to_string()))
            .and(header("cookie", "gdpr_consent=1"))
            .respond_with(html(body))
            .expect(1)
            .mount(&server)
            .await;
    }

    let config = FetcherConfig {
        consent_cookie: Some("gdpr_consent=1".to_string()),
        ..fetcher_config(&server)
    };
    let settings = CrawlSettings {
        restart_every_pages: Some(1),
        ..CrawlSettings::without_delay(Board::Pracuj)
    };
    let mut coordinator =
        coordinator_with(config, SqliteStorage::new_in_memory().unwrap(), settings);
    let report = coordinator
        .download_jobs(&filter_url(&server), None)
        .await
        .unwrap();

    assert_eq!(report.added, 2);
    assert_eq!(report.pages_fetched, 3);
    assert_eq!(report.outcome, CrawlOutcome::EndOfResults);
}

#[tokio::test]
async fn test_browser_headers_sent_with_page_requests() {
    let server = MockServer::start().await;
    mount_home(&server).await;

    let config = FetcherConfig {
        user_agent: "Mozilla/5.0 jobscout-test".to_string(),
        accept_language: "pl-PL".to_string(),
        ..fetcher_config(&server)
    };

    Mock::given(method("GET"))
        .and(query_param("pn", "1"))
        .and(header("user-agent", "Mozilla/5.0 jobscout-test"))
        .and(header("referer", format!("{}/", server.uri()).as_str()))
        .and(header("accept-language", "pl-PL"))
        .respond_with(html(NO_RESULTS))
        .expect(1)
        .mount(&server)
        .await;

    let mut coordinator = coordinator(config, SqliteStorage::new_in_memory().unwrap());
    let report = coordinator
        .download_jobs(&filter_url(&server), None)
        .await
        .unwrap();

    assert_eq!(report.outcome, CrawlOutcome::EndOfResults);
    assert_eq!(report.pages_fetched, 1);
}

#[tokio::test]
async fn test_digest_task_end_to_end() {
    let server = MockServer::start().await;
    mount_home(&server).await;
    mount_page(
        &server,
        1,
        html(results_page(&[
            offer("901", "Office Assistant", "Acme"),
            offer("902", "Senior Developer", "Globex"),
        ])),
    )
    .await;
    mount_page(&server, 2, html(NO_RESULTS)).await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("jobs.db");
    let outbox = dir.path().join("outbox");

    let config: Config = toml::from_str(&format!(
        r#"
        [scraper]
        search-urls = ["{filter}"]
        page-delay-min-ms = 0
        page-delay-max-ms = 0

        [fetcher]
        home-url = "{home}/"

        [storage]
        database-path = "{db}"

        [digest]
        recipients = ["me@example.com"]
        outbox-dir = "{outbox}"
        exclude-keywords = ["developer"]
        "#,
        filter = filter_url(&server),
        home = server.uri(),
        db = db_path.display(),
        outbox = outbox.display(),
    ))
    .unwrap();

    let report = run_digest_task(&config).await.unwrap();

    assert_eq!(report.total_added(), 2);
    assert_eq!(report.digest_entries, 1);
    assert_eq!(report.batches_sent, 1);

    let files: Vec<_> = std::fs::read_dir(&outbox)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(files.len(), 1);

    let message = std::fs::read_to_string(&files[0]).unwrap();
    assert!(message.contains("Subject: Found a lot of new offers"));
    assert!(message.contains("Office Assistant w acme"));
    assert!(!message.contains("Senior Developer"));
}
