//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, applying environment overrides,
//! validating all parameters, and providing clear error messages for
//! misconfiguration.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Upper bound on `http.max_retries`.
const MAX_RETRIES: u32 = 10;

/// Upper bound on `http.retry_base_delay_ms`.
const MAX_RETRY_BASE_DELAY_MS: u64 = 60_000;

/// Routes the file server always mounts.
const RESERVED_ROUTES: [&str; 4] = ["/api/data", "/live", "/ready", "/metrics"];

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - `HOST` / `PORT` overrides are malformed
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let mut config = parse_config(&content)?;
  apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
  validate_config(&config)?;

  info!(
    interval_ms = config.crawler.interval_ms,
    currencies = ?config.crawler.currencies,
    fiat = %config.crawler.fiat,
    policy = ?config.crawler.failure_policy,
    bind = %config.server.bind_address(),
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse TOML content into an `AppConfig` (no validation).
pub fn parse_config(content: &str) -> Result<AppConfig> {
  toml::from_str(content).with_context(|| "Failed to parse config.toml")
}

/// Apply `HOST` and `PORT` overrides from `lookup`.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
where
  F: Fn(&str) -> Option<String>,
{
  if let Some(host) = lookup("HOST").filter(|h| !h.is_empty()) {
    config.server.host = host;
  }

  if let Some(port) = lookup("PORT").filter(|p| !p.is_empty()) {
    config.server.port = port
      .parse()
      .with_context(|| format!("PORT must be a valid port number, got {port:?}"))?;
  }

  Ok(())
}

/// Validate all configuration parameters.
pub fn validate_config(config: &AppConfig) -> Result<()> {
  let crawler = &config.crawler;

  anyhow::ensure!(crawler.interval_ms > 0, "interval_ms must be positive");
  anyhow::ensure!(
    crawler.source_timeout_ms > 0,
    "source_timeout_ms must be positive"
  );
  anyhow::ensure!(
    crawler.max_consecutive_publish_failures > 0,
    "max_consecutive_publish_failures must be positive"
  );

  // Currency validation
  anyhow::ensure!(
    !crawler.currencies.is_empty(),
    "At least one currency must be configured"
  );
  anyhow::ensure!(
    crawler.fiat.is_fiat(),
    "fiat must be a fiat currency, got {}",
    crawler.fiat
  );
  for currency in &crawler.currencies {
    anyhow::ensure!(
      !currency.is_fiat(),
      "currencies must be crypto assets, got {currency}"
    );
  }
  let unique: BTreeSet<_> = crawler.currencies.iter().collect();
  anyhow::ensure!(
    unique.len() == crawler.currencies.len(),
    "currencies must not contain duplicates"
  );

  // Source validation
  anyhow::ensure!(
    config.sources.kraken.enabled || config.sources.coinbase.enabled,
    "At least one source must be enabled"
  );
  for url in [&config.sources.kraken.base_url, &config.sources.coinbase.base_url]
    .into_iter()
    .flatten()
  {
    anyhow::ensure!(
      url.starts_with("http://") || url.starts_with("https://"),
      "source base_url must be an http(s) URL, got {url}"
    );
  }

  // HTTP validation
  anyhow::ensure!(
    config.http.request_timeout_ms > 0,
    "request_timeout_ms must be positive"
  );
  anyhow::ensure!(
    config.http.max_concurrent > 0,
    "max_concurrent must be positive"
  );
  anyhow::ensure!(
    config.http.max_retries <= MAX_RETRIES,
    "max_retries must be at most {MAX_RETRIES}, got {}",
    config.http.max_retries
  );
  anyhow::ensure!(
    config.http.retry_base_delay_ms <= MAX_RETRY_BASE_DELAY_MS,
    "retry_base_delay_ms must be at most {MAX_RETRY_BASE_DELAY_MS}, got {}",
    config.http.retry_base_delay_ms
  );

  // Publish / server validation
  anyhow::ensure!(
    !config.publish.path.is_empty(),
    "publish.path must not be empty"
  );
  anyhow::ensure!(
    config.server.serve_path.starts_with('/') && config.server.serve_path.len() > 1,
    "serve_path must be an absolute URL path, got {:?}",
    config.server.serve_path
  );
  anyhow::ensure!(
    !RESERVED_ROUTES.contains(&config.server.serve_path.as_str()),
    "serve_path {:?} collides with a built-in route",
    config.server.serve_path
  );
  anyhow::ensure!(
    !config.server.host.is_empty(),
    "server host must not be empty"
  );

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Currency, FailurePolicy};

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config("nonexistent.toml");
    assert!(result.is_err());
  }

  #[test]
  fn test_empty_config_uses_defaults() {
    let config = parse_config("").unwrap();
    validate_config(&config).unwrap();

    assert_eq!(config.crawler.interval_ms, 2_000);
    assert_eq!(config.crawler.currencies, vec![Currency::BTC, Currency::ETH]);
    assert_eq!(config.crawler.fiat, Currency::USD);
    assert_eq!(config.crawler.failure_policy, FailurePolicy::Omit);
    assert!(config.sources.kraken.enabled);
    assert!(config.sources.coinbase.enabled);
    assert_eq!(config.publish.path, "backend/prices.json");
    assert_eq!(config.server.serve_path, "/backend/prices.json");
    assert_eq!(config.server.bind_address(), "127.0.0.1:8000");
  }

  #[test]
  fn test_parse_full_config() {
    let config = parse_config(
      r#"
      [crawler]
      interval_ms = 500
      currencies = ["ETH"]
      failure_policy = "carry_over"

      [sources.coinbase]
      enabled = false

      [sources.kraken]
      base_url = "http://localhost:9999/"

      [server]
      port = 8080
      serve_path = "/api/prices.json"
      "#,
    )
    .unwrap();
    validate_config(&config).unwrap();

    assert_eq!(config.crawler.interval().as_millis(), 500);
    assert_eq!(config.crawler.currencies, vec![Currency::ETH]);
    assert_eq!(config.crawler.failure_policy, FailurePolicy::CarryOver);
    assert!(!config.sources.coinbase.enabled);
    assert_eq!(
      config.http.client_config("http://localhost:9999/").base_url,
      "http://localhost:9999"
    );
    assert_eq!(config.server.port, 8080);
  }

  #[test]
  fn test_env_overrides_host_and_port() {
    let mut config = AppConfig::default();
    apply_env_overrides(&mut config, |key| match key {
      "HOST" => Some("0.0.0.0".to_string()),
      "PORT" => Some("8989".to_string()),
      _ => None,
    })
    .unwrap();
    assert_eq!(config.server.bind_address(), "0.0.0.0:8989");
  }

  #[test]
  fn test_env_override_rejects_bad_port() {
    let mut config = AppConfig::default();
    let result = apply_env_overrides(&mut config, |key| {
      (key == "PORT").then(|| "eighty".to_string())
    });
    assert!(result.is_err());
  }

  #[test]
  fn test_validate_rejects_fiat_in_currencies() {
    let config = parse_config("[crawler]\ncurrencies = [\"BTC\", \"USD\"]").unwrap();
    assert!(validate_config(&config).is_err());
  }

  #[test]
  fn test_validate_rejects_duplicate_currencies() {
    let config = parse_config("[crawler]\ncurrencies = [\"BTC\", \"BTC\"]").unwrap();
    assert!(validate_config(&config).is_err());
  }

  #[test]
  fn test_validate_rejects_all_sources_disabled() {
    let config = parse_config(
      "[sources.kraken]\nenabled = false\n[sources.coinbase]\nenabled = false",
    )
    .unwrap();
    assert!(validate_config(&config).is_err());
  }

  #[test]
  fn test_validate_bounds_retry_settings() {
    let config = parse_config("[http]\nmax_retries = 40").unwrap();
    assert!(validate_config(&config).is_err());

    let config = parse_config("[http]\nretry_base_delay_ms = 120000").unwrap();
    assert!(validate_config(&config).is_err());

    let config = parse_config("[http]\nmax_retries = 10\nretry_base_delay_ms = 60000").unwrap();
    validate_config(&config).unwrap();
  }

  #[test]
  fn test_validate_rejects_reserved_serve_path() {
    let config = parse_config("[server]\nserve_path = \"/metrics\"").unwrap();
    assert!(validate_config(&config).is_err());
  }

  #[test]
  fn test_validate_rejects_zero_interval() {
    let config = parse_config("[crawler]\ninterval_ms = 0").unwrap();
    assert!(validate_config(&config).is_err());
  }
}
