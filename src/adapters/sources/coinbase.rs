//! Coinbase Prices Source - Buy/Sell Spot Prices per Pair
//!
//! Coinbase quotes from the client's point of view: the `buy` price is
//! what you pay (the ask) and the `sell` price is what you receive (the
//! bid). Each currency needs both requests; they are normalized into a
//! single `Quote` here so nothing downstream knows about the inversion.

use std::str::FromStr;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::client::SourceClient;
use crate::domain::{Currency, Quote, SourceError, SourceResult};
use crate::ports::PriceSource;

pub const NAME: &str = "coinbase";

/// Default public API root.
pub const DEFAULT_BASE_URL: &str = "https://api.coinbase.com";

/// Which Coinbase price endpoint to hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    /// Price the client pays; our ask.
    Buy,
    /// Price the client receives; our bid.
    Sell,
}

impl Action {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    data: PriceData,
}

#[derive(Debug, Deserialize)]
struct PriceData {
    base: String,
    currency: String,
    amount: String,
}

/// Coinbase price source.
pub struct CoinbaseSource {
    client: SourceClient,
}

impl CoinbaseSource {
    pub fn new(client: SourceClient) -> Self {
        Self { client }
    }

    async fn fetch_one(&self, symbol: Currency, fiat: Currency) -> Result<Quote, SourceError> {
        let (ask, bid) = tokio::try_join!(
            self.fetch_price(symbol, fiat, Action::Buy),
            self.fetch_price(symbol, fiat, Action::Sell),
        )?;

        let quote =
            Quote::new(symbol, ask, bid).map_err(|e| SourceError::protocol(NAME, e.to_string()))?;

        debug!(source = NAME, %symbol, ask = %quote.ask(), bid = %quote.bid(), "Prices parsed");
        Ok(quote)
    }

    async fn fetch_price(
        &self,
        symbol: Currency,
        fiat: Currency,
        action: Action,
    ) -> Result<Decimal, SourceError> {
        let path = format!("/v2/prices/{symbol}-{fiat}/{}", action.as_str());
        let body = self.client.get_text(&path).await?;
        parse_price(symbol, fiat, action, &body)
    }
}

#[async_trait]
impl PriceSource for CoinbaseSource {
    fn name(&self) -> &'static str {
        NAME
    }

    #[instrument(skip(self), fields(source = NAME))]
    async fn fetch(&self, currencies: &[Currency], fiat: Currency) -> SourceResult {
        try_join_all(currencies.iter().map(|&symbol| self.fetch_one(symbol, fiat))).await
    }
}

/// Parse a `/v2/prices/{pair}/{action}` body.
fn parse_price(
    symbol: Currency,
    fiat: Currency,
    action: Action,
    body: &str,
) -> Result<Decimal, SourceError> {
    let pair = format!("{symbol}-{fiat}");

    let response: PriceResponse = serde_json::from_str(body).map_err(|e| {
        SourceError::protocol(NAME, format!("malformed {} price for {pair}: {e}", action.as_str()))
    })?;
    let data = response.data;

    if data.base != symbol.as_str() || data.currency != fiat.as_str() {
        return Err(SourceError::protocol(
            NAME,
            format!("asked for {pair}, got {}-{}", data.base, data.currency),
        ));
    }

    Decimal::from_str(&data.amount).map_err(|e| {
        SourceError::protocol(NAME, format!("{pair}: invalid amount {:?}: {e}", data.amount))
    })
}
