//! Source HTTP Client - Retrying REST Client for Exchange APIs
//!
//! Wraps reqwest with a request timeout, bounded concurrency and
//! exponential-backoff retries on transient failures. Every failure
//! is mapped to a typed `SourceError` tagged with the exchange name.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::domain::SourceError;

/// Longest response body echoed back in an error detail.
const MAX_ERROR_BODY: usize = 256;

/// Configuration for a source HTTP client.
#[derive(Debug, Clone)]
pub struct SourceClientConfig {
  /// Base URL for the exchange API (no trailing slash).
  pub base_url: String,
  /// Per-request timeout.
  pub timeout: Duration,
  /// Maximum concurrent requests to this exchange.
  pub max_concurrent: usize,
  /// Maximum retries on transient errors.
  pub max_retries: u32,
  /// Base delay between retries (exponential backoff).
  pub retry_base_delay: Duration,
  /// User-Agent header sent with every request.
  pub user_agent: String,
}

impl Default for SourceClientConfig {
  fn default() -> Self {
    Self {
      base_url: String::new(),
      timeout: Duration::from_secs(3),
      max_concurrent: 4,
      max_retries: 1,
      retry_base_delay: Duration::from_millis(200),
      user_agent: concat!("price-crawler/", env!("CARGO_PKG_VERSION")).to_string(),
    }
  }
}

/// Rate-limited HTTP client for one exchange.
pub struct SourceClient {
  /// Exchange name used to tag errors.
  exchange: &'static str,
  /// Underlying HTTP client.
  http: Client,
  /// Client configuration.
  config: SourceClientConfig,
  /// Concurrency limiter.
  semaphore: Arc<Semaphore>,
}

impl SourceClient {
  /// Create a new client for `exchange`.
  pub fn new(exchange: &'static str, config: SourceClientConfig) -> Result<Self> {
    let http = Client::builder()
      .timeout(config.timeout)
      .user_agent(config.user_agent.clone())
      .pool_max_idle_per_host(4)
      .build()
      .with_context(|| format!("Failed to build HTTP client for {exchange}"))?;

    let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));

    Ok(Self {
      exchange,
      http,
      config,
      semaphore,
    })
  }

  pub fn exchange(&self) -> &'static str {
    self.exchange
  }

  /// Absolute URL for a path on this exchange.
  pub fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.base_url, path)
  }

  /// GET `path` and return the body of a 2xx response.
  ///
  /// Retries 429, 5xx and transport errors up to `max_retries` times.
  /// Any other status fails immediately.
  pub async fn get_text(&self, path: &str) -> Result<String, SourceError> {
    let url = self.url(path);

    let _permit = self
      .semaphore
      .acquire()
      .await
      .map_err(|_| SourceError::transport(self.exchange, "client semaphore closed"))?;

    let mut last_error = None;

    for attempt in 0..=self.config.max_retries {
      if attempt > 0 {
        let delay = backoff_delay(self.config.retry_base_delay, attempt);
        debug!(
          exchange = self.exchange,
          attempt,
          delay_ms = delay.as_millis() as u64,
          "Retrying request"
        );
        sleep(delay).await;
      }

      match self.http.get(&url).send().await {
        Ok(response) => match response.status() {
          status if status.is_success() => {
            return response.text().await.map_err(|e| {
              SourceError::transport(self.exchange, format!("failed to read body from {url}: {e}"))
            });
          }
          StatusCode::TOO_MANY_REQUESTS => {
            warn!(exchange = self.exchange, %url, "Rate limited, backing off");
            last_error = Some(SourceError::transport(self.exchange, format!("rate limited on {url}")));
          }
          status if status.is_server_error() => {
            warn!(exchange = self.exchange, %url, status = %status, "Server error, retrying");
            last_error = Some(SourceError::transport(
              self.exchange,
              format!("server error {status} on {url}"),
            ));
          }
          status => {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::transport(
              self.exchange,
              format!("HTTP {status} on {url}: {}", truncate(&body)),
            ));
          }
        },
        Err(e) => {
          warn!(exchange = self.exchange, %url, error = %e, attempt, "Request failed");
          last_error = Some(SourceError::transport(self.exchange, format!("{url}: {e}")));
        }
      }
    }

    Err(last_error
      .unwrap_or_else(|| SourceError::transport(self.exchange, "max retries exceeded")))
  }
}

/// Delay before retry `attempt` (1-based): `base * 2^(attempt - 1)`, saturating.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
  let factor = 2u32.checked_pow(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
  base.saturating_mul(factor)
}

fn truncate(body: &str) -> &str {
  match body.char_indices().nth(MAX_ERROR_BODY) {
    Some((idx, _)) => &body[..idx],
    None => body,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_long_bodies() {
    let body = "x".repeat(1000);
    assert_eq!(truncate(&body).len(), MAX_ERROR_BODY);
    assert_eq!(truncate("short"), "short");
  }

  #[test]
  fn test_backoff_doubles_and_saturates() {
    let base = Duration::from_millis(200);
    assert_eq!(backoff_delay(base, 1), Duration::from_millis(200));
    assert_eq!(backoff_delay(base, 3), Duration::from_millis(800));
    assert_eq!(backoff_delay(base, 40), base.saturating_mul(u32::MAX));
    assert_eq!(backoff_delay(Duration::MAX, 2), Duration::MAX);
  }

  #[test]
  fn test_url_joins_base_and_path() {
    let client = SourceClient::new(
      "kraken",
      SourceClientConfig {
        base_url: "https://api.kraken.com".to_string(),
        ..SourceClientConfig::default()
      },
    )
    .unwrap();
    assert_eq!(
      client.url("/0/public/Ticker?pair=BTCUSD"),
      "https://api.kraken.com/0/public/Ticker?pair=BTCUSD"
    );
    assert_eq!(client.exchange(), "kraken");
  }
}
