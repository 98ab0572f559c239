//! Kraken Ticker Source - Lowest Ask / Highest Bid per Pair
//!
//! Queries `GET /0/public/Ticker?pair={CUR}{FIAT}` once per currency.
//! Kraken answers with its own pair key (e.g. `XXBTZUSD`), so the
//! single entry of `result` is taken whatever it is called.

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::client::SourceClient;
use crate::domain::{Currency, Quote, SourceError, SourceResult};
use crate::ports::PriceSource;

pub const NAME: &str = "kraken";

/// Default public API root.
pub const DEFAULT_BASE_URL: &str = "https://api.kraken.com";

/// Kraken ticker envelope.
#[derive(Debug, Deserialize)]
struct TickerResponse {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: BTreeMap<String, TickerInfo>,
}

/// The parts of a Kraken ticker we use.
///
/// `a` is `[price, whole lot volume, lot volume]` for the ask,
/// `b` the same for the bid.
#[derive(Debug, Deserialize)]
struct TickerInfo {
    a: Vec<String>,
    b: Vec<String>,
}

/// Kraken price source.
pub struct KrakenSource {
    client: SourceClient,
}

impl KrakenSource {
    pub fn new(client: SourceClient) -> Self {
        Self { client }
    }

    async fn fetch_one(&self, symbol: Currency, fiat: Currency) -> Result<Quote, SourceError> {
        let path = format!("/0/public/Ticker?pair={symbol}{fiat}");
        let body = self.client.get_text(&path).await?;
        let quote = parse_ticker(symbol, &body)?;

        debug!(source = NAME, %symbol, ask = %quote.ask(), bid = %quote.bid(), "Ticker parsed");
        Ok(quote)
    }
}

#[async_trait]
impl PriceSource for KrakenSource {
    fn name(&self) -> &'static str {
        NAME
    }

    #[instrument(skip(self), fields(source = NAME))]
    async fn fetch(&self, currencies: &[Currency], fiat: Currency) -> SourceResult {
        try_join_all(currencies.iter().map(|&symbol| self.fetch_one(symbol, fiat))).await
    }
}

/// Parse a Kraken ticker body into a quote for `symbol`.
fn parse_ticker(symbol: Currency, body: &str) -> Result<Quote, SourceError> {
    let response: TickerResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::protocol(NAME, format!("malformed ticker for {symbol}: {e}")))?;

    if !response.error.is_empty() {
        return Err(SourceError::protocol(NAME, response.error.join("; ")));
    }

    let (pair, ticker) = response
        .result
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::protocol(NAME, format!("empty result for {symbol}")))?;

    let ask = first_price(&ticker.a, &pair, "a")?;
    let bid = first_price(&ticker.b, &pair, "b")?;

    Quote::new(symbol, ask, bid).map_err(|e| SourceError::protocol(NAME, e.to_string()))
}

fn first_price(level: &[String], pair: &str, field: &str) -> Result<Decimal, SourceError> {
    let raw = level
        .first()
        .ok_or_else(|| SourceError::protocol(NAME, format!("{pair}: missing {field}[0]")))?;

    Decimal::from_str(raw)
        .map_err(|e| SourceError::protocol(NAME, format!("{pair}: invalid {field}[0] {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const BTC_TICKER: &str = r#"{
        "error": [],
        "result": {
            "XXBTZUSD": {
                "a": ["50000.00000", "1", "1.000"],
                "b": ["49950.00000", "2", "2.000"],
                "c": ["49975.10000", "0.01"],
                "v": ["100.0", "200.0"]
            }
        }
    }"#;

    #[test]
    fn test_parse_ticker_extracts_ask_and_bid() {
        let quote = parse_ticker(Currency::BTC, BTC_TICKER).unwrap();
        assert_eq!(quote.symbol(), Currency::BTC);
        assert_eq!(quote.ask(), dec!(50000));
        assert_eq!(quote.bid(), dec!(49950));
    }

    #[test]
    fn test_parse_ticker_reports_remote_error() {
        let body = r#"{"error":["EQuery:Unknown asset pair"]}"#;
        let err = parse_ticker(Currency::ETH, body).unwrap_err();
        assert_eq!(err, SourceError::protocol(NAME, "EQuery:Unknown asset pair"));
    }

    #[test]
    fn test_parse_ticker_rejects_malformed_body() {
        let err = parse_ticker(Currency::BTC, "<html>bad gateway</html>").unwrap_err();
        assert_eq!(err.kind(), "protocol");
    }

    #[test]
    fn test_parse_ticker_rejects_empty_result() {
        let err = parse_ticker(Currency::BTC, r#"{"error":[],"result":{}}"#).unwrap_err();
        assert!(err.to_string().contains("empty result"));
    }

    #[test]
    fn test_parse_ticker_rejects_bad_price() {
        let body = r#"{"error":[],"result":{"XETHZUSD":{"a":["abc"],"b":["1"]}}}"#;
        let err = parse_ticker(Currency::ETH, body).unwrap_err();
        assert!(err.to_string().contains("invalid a[0]"));
    }

    #[test]
    fn test_parse_ticker_rejects_negative_price() {
        let body = r#"{"error":[],"result":{"XETHZUSD":{"a":["1"],"b":["-1"]}}}"#;
        assert!(parse_ticker(Currency::ETH, body).is_err());
    }
}
