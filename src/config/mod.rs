//! Configuration Module - TOML-based Crawler Configuration
//!
//! Loads and validates configuration from `config.toml`, with `HOST`
//! and `PORT` environment overrides for the file server. Every section
//! has defaults, so an empty file runs the stock Kraken + Coinbase
//! BTC/ETH against USD setup.

pub mod loader;

use std::time::Duration;

use serde::Deserialize;

use crate::adapters::sources::SourceClientConfig;
use crate::domain::{Currency, FailurePolicy};

/// Top-level crawler configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  /// Poll loop behaviour.
  pub crawler: CrawlerConfig,
  /// Exchange endpoints.
  pub sources: SourcesConfig,
  /// Outbound HTTP client settings shared by all sources.
  pub http: HttpConfig,
  /// Published file location.
  pub publish: PublishConfig,
  /// File server bind and routes.
  pub server: ServerConfig,
}

/// Poll loop configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
  /// Human-readable instance name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  pub log_level: String,
  /// Sleep after each completed cycle (milliseconds).
  pub interval_ms: u64,
  /// Upper bound on one source's fetch (milliseconds).
  pub source_timeout_ms: u64,
  /// Crypto currencies to quote.
  pub currencies: Vec<Currency>,
  /// Quote currency.
  pub fiat: Currency,
  /// What a failed source contributes to the snapshot.
  pub failure_policy: FailurePolicy,
  /// Consecutive failed commits before the loop gives up.
  pub max_consecutive_publish_failures: u32,
  /// How long the supervisor waits for tasks to stop (milliseconds).
  pub shutdown_timeout_ms: u64,
}

/// Per-exchange configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
  pub kraken: SourceConfig,
  pub coinbase: SourceConfig,
}

/// A single exchange.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
  /// Whether this exchange is polled.
  pub enabled: bool,
  /// API root override; the exchange's public URL when unset.
  pub base_url: Option<String>,
}

/// Outbound HTTP client configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
  /// Per-request timeout (milliseconds).
  pub request_timeout_ms: u64,
  /// Retries on 429/5xx/transport errors.
  pub max_retries: u32,
  /// Base backoff between retries (milliseconds).
  pub retry_base_delay_ms: u64,
  /// Maximum in-flight requests per exchange.
  pub max_concurrent: usize,
}

/// Published state configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
  /// Path of the published JSON file.
  pub path: String,
}

/// File server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  /// Run the file server alongside the poll loop.
  pub enabled: bool,
  /// Bind host (overridden by `HOST`).
  pub host: String,
  /// Bind port (overridden by `PORT`).
  pub port: u16,
  /// URL path the published file is served at.
  pub serve_path: String,
}

impl CrawlerConfig {
  pub const fn interval(&self) -> Duration {
    Duration::from_millis(self.interval_ms)
  }

  pub const fn source_timeout(&self) -> Duration {
    Duration::from_millis(self.source_timeout_ms)
  }

  pub const fn shutdown_timeout(&self) -> Duration {
    Duration::from_millis(self.shutdown_timeout_ms)
  }
}

impl HttpConfig {
  /// Client settings for an exchange rooted at `base_url`.
  pub fn client_config(&self, base_url: &str) -> SourceClientConfig {
    SourceClientConfig {
      base_url: base_url.trim_end_matches('/').to_string(),
      timeout: Duration::from_millis(self.request_timeout_ms),
      max_concurrent: self.max_concurrent,
      max_retries: self.max_retries,
      retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
      ..SourceClientConfig::default()
    }
  }
}

impl ServerConfig {
  /// `host:port` to bind.
  pub fn bind_address(&self) -> String {
    format!("{}:{}", self.host, self.port)
  }
}

impl Default for CrawlerConfig {
  fn default() -> Self {
    Self {
      name: default_name(),
      log_level: default_log_level(),
      interval_ms: default_interval(),
      source_timeout_ms: default_source_timeout(),
      currencies: default_currencies(),
      fiat: Currency::USD,
      failure_policy: FailurePolicy::default(),
      max_consecutive_publish_failures: default_max_publish_failures(),
      shutdown_timeout_ms: default_shutdown_timeout(),
    }
  }
}

impl Default for SourceConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      base_url: None,
    }
  }
}

impl Default for HttpConfig {
  fn default() -> Self {
    Self {
      request_timeout_ms: default_request_timeout(),
      max_retries: 1,
      retry_base_delay_ms: 200,
      max_concurrent: 4,
    }
  }
}

impl Default for PublishConfig {
  fn default() -> Self {
    Self {
      path: default_publish_path(),
    }
  }
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      host: default_host(),
      port: default_port(),
      serve_path: default_serve_path(),
    }
  }
}

// Default value functions

fn default_name() -> String {
  "price-crawler".to_string()
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_interval() -> u64 {
  2_000
}

fn default_source_timeout() -> u64 {
  5_000
}

fn default_request_timeout() -> u64 {
  3_000
}

fn default_currencies() -> Vec<Currency> {
  vec![Currency::BTC, Currency::ETH]
}

fn default_max_publish_failures() -> u32 {
  5
}

fn default_shutdown_timeout() -> u64 {
  5_000
}

fn default_publish_path() -> String {
  "backend/prices.json".to_string()
}

fn default_host() -> String {
  "127.0.0.1".to_string()
}

fn default_port() -> u16 {
  8000
}

fn default_serve_path() -> String {
  "/backend/prices.json".to_string()
}
