//! Snapshot model and per-cycle snapshot builder.
//!
//! A `Snapshot` is the complete set of prices published for one poll
//! cycle: `source → currency → {buy, sell}`. All maps are ordered, so
//! the same snapshot always serializes to the same bytes.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::SourceError;
use super::quote::{Currency, Quote};

/// Outcome of polling one source for one cycle.
pub type SourceResult = Result<Vec<Quote>, SourceError>;

/// Published buy/sell pair for a currency.
///
/// `buy` is the lowest ask, `sell` the highest bid. Both go on the wire
/// as exact JSON numbers, never strings or floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePair {
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub buy: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub sell: Decimal,
}

impl From<&Quote> for PricePair {
    fn from(quote: &Quote) -> Self {
        Self {
            buy: quote.ask(),
            sell: quote.bid(),
        }
    }
}

/// Prices for every configured currency of one source.
pub type SourcePrices = BTreeMap<Currency, PricePair>;

/// One immutable, internally complete set of prices across sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    sources: BTreeMap<String, SourcePrices>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prices published for `name`, if that source is present.
    pub fn source(&self, name: &str) -> Option<&SourcePrices> {
        self.sources.get(name)
    }

    /// Iterate sources in key order.
    pub fn sources(&self) -> impl Iterator<Item = (&str, &SourcePrices)> {
        self.sources.iter().map(|(name, prices)| (name.as_str(), prices))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Canonical wire format.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

impl FromIterator<(String, SourcePrices)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, SourcePrices)>>(iter: I) -> Self {
        Self {
            sources: iter.into_iter().collect(),
        }
    }
}

/// What to publish for a source whose poll failed this cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Leave the source out of this cycle's snapshot.
    #[default]
    Omit,
    /// Keep the source's entry from the previous snapshot, if there is one.
    CarryOver,
}

/// Merges per-source results into a fresh `Snapshot`.
///
/// Pure: never mutates its inputs and holds no state across cycles.
/// The previous snapshot is passed in explicitly for `CarryOver`.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    currencies: BTreeSet<Currency>,
    policy: FailurePolicy,
}

impl SnapshotBuilder {
    pub fn new(currencies: impl IntoIterator<Item = Currency>, policy: FailurePolicy) -> Self {
        Self {
            currencies: currencies.into_iter().collect(),
            policy,
        }
    }

    pub const fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Build the snapshot for one cycle.
    ///
    /// A source enters the snapshot only if it produced a price for every
    /// configured currency. Quotes for unconfigured currencies are dropped.
    /// Failed or incomplete sources are handled per the failure policy.
    pub fn build(
        &self,
        results: &BTreeMap<String, SourceResult>,
        previous: Option<&Snapshot>,
    ) -> Snapshot {
        let mut sources = BTreeMap::new();

        for (name, result) in results {
            let complete = result.as_ref().ok().and_then(|quotes| self.collect(quotes));

            let entry = match complete {
                Some(prices) => Some(prices),
                None => match self.policy {
                    FailurePolicy::Omit => None,
                    FailurePolicy::CarryOver => previous
                        .and_then(|snapshot| snapshot.source(name))
                        .filter(|prices| self.is_complete(prices))
                        .cloned(),
                },
            };

            if let Some(prices) = entry {
                sources.insert(name.clone(), prices);
            }
        }

        Snapshot { sources }
    }

    /// Sources that produced a complete price set in `results`.
    ///
    /// Carried-over entries do not count: zero means nothing fresh arrived.
    pub fn complete_sources(&self, results: &BTreeMap<String, SourceResult>) -> usize {
        results
            .values()
            .filter(|result| result.as_ref().is_ok_and(|quotes| self.collect(quotes).is_some()))
            .count()
    }

    fn collect(&self, quotes: &[Quote]) -> Option<SourcePrices> {
        let prices: SourcePrices = quotes
            .iter()
            .filter(|quote| self.currencies.contains(&quote.symbol()))
            .map(|quote| (quote.symbol(), PricePair::from(quote)))
            .collect();

        self.is_complete(&prices).then_some(prices)
    }

    fn is_complete(&self, prices: &SourcePrices) -> bool {
        !self.currencies.is_empty() && self.currencies.iter().all(|c| prices.contains_key(c))
    }
}
