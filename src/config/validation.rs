use crate::config::types::{Config, DigestConfig, FetcherConfig, ScraperConfig, StorageConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scraper_config(&config.scraper)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_storage_config(&config.storage)?;
    validate_digest_config(&config.digest)?;
    Ok(())
}

/// Validates crawl loop configuration
fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    if config.search_urls.is_empty() {
        return Err(ConfigError::Validation(
            "search-urls must contain at least one URL".to_string(),
        ));
    }

    for search_url in &config.search_urls {
        validate_http_url(search_url, "search URL")?;
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max-pages must be >= 1 when set".to_string(),
        ));
    }

    if config.page_delay_min_ms > config.page_delay_max_ms {
        return Err(ConfigError::Validation(format!(
            "page-delay-min-ms ({}) must not exceed page-delay-max-ms ({})",
            config.page_delay_min_ms, config.page_delay_max_ms
        )));
    }

    if config.persist_workers < 1 || config.persist_workers > 16 {
        return Err(ConfigError::Validation(format!(
            "persist-workers must be between 1 and 16, got {}",
            config.persist_workers
        )));
    }

    if config.restart_every_pages == Some(0) {
        return Err(ConfigError::Validation(
            "restart-every-pages must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates fetcher configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    validate_http_url(&config.home_url, "home-url")?;

    if config.request_timeout_secs == 0 || config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeouts must be at least one second".to_string(),
        ));
    }

    if let Some(cookie) = &config.consent_cookie {
        match cookie.split_once('=') {
            Some((name, _)) if !name.trim().is_empty() => {}
            _ => {
                return Err(ConfigError::Validation(format!(
                    "consent-cookie must have the form name=value, got '{}'",
                    cookie
                )))
            }
        }
    }

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates digest configuration
///
/// An empty recipient list is accepted here; delivery reports it when a
/// digest is actually sent.
fn validate_digest_config(config: &DigestConfig) -> Result<(), ConfigError> {
    if config.batch_size == 0 {
        return Err(ConfigError::Validation(
            "batch-size must be >= 1".to_string(),
        ));
    }

    if config.outbox_dir.is_empty() {
        return Err(ConfigError::Validation(
            "outbox-dir cannot be empty".to_string(),
        ));
    }

    if config.recency_hours == Some(0) {
        return Err(ConfigError::Validation(
            "recency-hours must be >= 1 when set".to_string(),
        ));
    }

    for recipient in &config.recipients {
        validate_email(recipient)?;
    }

    Ok(())
}

/// Validates that a string is an absolute http(s) URL
fn validate_http_url(value: &str, what: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", what, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            what, value
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "recipient cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Board;

    fn scraper_config() -> ScraperConfig {
        ScraperConfig {
            board: Board::Pracuj,
            search_urls: vec!["https://www.pracuj.pl/praca?et=3".to_string()],
            max_pages: None,
            page_delay_min_ms: 0,
            page_delay_max_ms: 0,
            persist_workers: 2,
            restart_every_pages: None,
        }
    }

    #[test]
    fn test_validate_scraper_config() {
        assert!(validate_scraper_config(&scraper_config()).is_ok());

        let mut config = scraper_config();
        config.search_urls = vec!["ftp://www.pracuj.pl/".to_string()];
        assert!(validate_scraper_config(&config).is_err());

        let mut config = scraper_config();
        config.page_delay_min_ms = 10;
        assert!(validate_scraper_config(&config).is_err());

        let mut config = scraper_config();
        config.persist_workers = 0;
        assert!(validate_scraper_config(&config).is_err());

        let mut config = scraper_config();
        config.max_pages = Some(0);
        assert!(validate_scraper_config(&config).is_err());
    }

    #[test]
    fn test_validate_consent_cookie() {
        let mut config = FetcherConfig::default();
        config.consent_cookie = Some("consent=1".to_string());
        assert!(validate_fetcher_config(&config).is_ok());

        config.consent_cookie = Some("=1".to_string());
        assert!(validate_fetcher_config(&config).is_err());

        config.consent_cookie = Some("nocookie".to_string());
        assert!(validate_fetcher_config(&config).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("admin@sub.example.com").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
    }

    #[test]
    fn test_validate_digest_config() {
        let mut config = DigestConfig::default();
        assert!(validate_digest_config(&config).is_ok());

        config.batch_size = 0;
        assert!(validate_digest_config(&config).is_err());
    }
}
