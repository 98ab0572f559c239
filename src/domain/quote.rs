//! Core price domain types.
//!
//! Defines the currencies the crawler quotes and the normalized
//! `Quote` record every source adapter produces.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ────────────────────────────────────────────
// Currencies
// ────────────────────────────────────────────

/// Currencies known to the crawler.
///
/// Crypto assets are what we quote; fiat is what we quote them in.
/// Serialized as the upper-case ticker, which is also the key used
/// in the published snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Currency {
    /// Bitcoin
    BTC,
    /// Ether
    ETH,
    /// US dollar
    USD,
}

impl Currency {
    /// Ticker symbol as used by both exchanges' pair names.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BTC => "BTC",
            Self::ETH => "ETH",
            Self::USD => "USD",
        }
    }

    /// Whether this is a fiat currency (valid as a quote currency only).
    pub const fn is_fiat(self) -> bool {
        matches!(self, Self::USD)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ────────────────────────────────────────────
// Quote
// ────────────────────────────────────────────

/// Which side of the book a price belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Ask,
    Bid,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ask => write!(f, "ask"),
            Self::Bid => write!(f, "bid"),
        }
    }
}

/// Rejected quote construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuoteError {
    #[error("negative {side} for {symbol}: {value}")]
    Negative {
        symbol: Currency,
        side: Side,
        value: Decimal,
    },
}

/// A normalized two-sided price for one currency from one source.
///
/// `ask` is the lowest price the asset can be bought at (our "buy"),
/// `bid` the highest price it can be sold at (our "sell"). Both are
/// non-negative and stored normalized, so `50000.00000` and `50000`
/// are the same quote. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    symbol: Currency,
    ask: Decimal,
    bid: Decimal,
}

impl Quote {
    /// Build a quote, rejecting negative prices.
    pub fn new(symbol: Currency, ask: Decimal, bid: Decimal) -> Result<Self, QuoteError> {
        if ask.is_sign_negative() && !ask.is_zero() {
            return Err(QuoteError::Negative { symbol, side: Side::Ask, value: ask });
        }
        if bid.is_sign_negative() && !bid.is_zero() {
            return Err(QuoteError::Negative { symbol, side: Side::Bid, value: bid });
        }

        Ok(Self {
            symbol,
            ask: ask.normalize(),
            bid: bid.normalize(),
        })
    }

    pub const fn symbol(&self) -> Currency {
        self.symbol
    }

    /// Lowest ask (client buy price).
    pub const fn ask(&self) -> Decimal {
        self.ask
    }

    /// Highest bid (client sell price).
    pub const fn bid(&self) -> Decimal {
        self.bid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quote_normalizes_trailing_zeros() {
        let quote = Quote::new(Currency::BTC, dec!(50000.00000), dec!(49950.10)).unwrap();
        assert_eq!(quote.ask().to_string(), "50000");
        assert_eq!(quote.bid().to_string(), "49950.1");
    }

    #[test]
    fn test_quote_rejects_negative_ask() {
        let err = Quote::new(Currency::ETH, dec!(-1), dec!(2990)).unwrap_err();
        assert_eq!(
            err,
            QuoteError::Negative { symbol: Currency::ETH, side: Side::Ask, value: dec!(-1) }
        );
    }

    #[test]
    fn test_quote_rejects_negative_bid() {
        assert!(Quote::new(Currency::BTC, dec!(1), dec!(-0.01)).is_err());
    }

    #[test]
    fn test_quote_accepts_zero() {
        let quote = Quote::new(Currency::BTC, Decimal::ZERO, Decimal::ZERO).unwrap();
        assert!(quote.ask().is_zero());
    }

    #[test]
    fn test_currency_display_and_fiat() {
        assert_eq!(format!("{}", Currency::BTC), "BTC");
        assert_eq!(Currency::ETH.as_str(), "ETH");
        assert!(Currency::USD.is_fiat());
        assert!(!Currency::BTC.is_fiat());
    }

    #[test]
    fn test_currency_serde_uses_ticker() {
        let json = serde_json::to_string(&Currency::ETH).unwrap();
        assert_eq!(json, "\"ETH\"");
        let back: Currency = serde_json::from_str("\"BTC\"").unwrap();
        assert_eq!(back, Currency::BTC);
    }
}
