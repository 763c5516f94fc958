use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Environment variable that overrides the configured digest recipients
pub const RECIPIENTS_ENV: &str = "EMAIL_RECIPIENTS";

/// Loads and parses a configuration file from the given path
///
/// Recipients listed in `EMAIL_RECIPIENTS` (comma-separated) replace the ones
/// from the file.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let mut config: Config = toml::from_str(&content)?;

    if let Ok(value) = std::env::var(RECIPIENTS_ENV) {
        let recipients = parse_recipients(&value);
        if !recipients.is_empty() {
            tracing::debug!(
                "Using {} recipient(s) from {}",
                recipients.len(),
                RECIPIENTS_ENV
            );
            config.digest.recipients = recipients;
        }
    }

    validate(&config)?;

    Ok(config)
}

/// Splits a comma-separated recipient list, dropping blank entries
pub fn parse_recipients(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged on startup so two runs can be matched to the same configuration.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
