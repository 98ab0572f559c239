//! Property-Based Tests - Snapshot Invariants
//!
//! Uses `proptest` to verify that built snapshots stay well-formed
//! across random source results.

use std::collections::BTreeMap;

use proptest::prelude::*;
use rust_decimal::Decimal;

use price_crawler::domain::{
    Currency, FailurePolicy, Quote, Snapshot, SnapshotBuilder, SourceError, SourceResult,
};

const SOURCES: [&str; 2] = ["kraken", "coinbase"];

/// A non-negative price with up to 8 decimal places.
fn price() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000_000_000, 0u32..=8).prop_map(|(mantissa, scale)| Decimal::new(mantissa, scale))
}

fn quote() -> impl Strategy<Value = Quote> {
    (
        prop_oneof![Just(Currency::BTC), Just(Currency::ETH)],
        price(),
        price(),
    )
        .prop_map(|(symbol, ask, bid)| Quote::new(symbol, ask, bid).unwrap())
}

fn source_result(exchange: &'static str) -> impl Strategy<Value = SourceResult> {
    prop_oneof![
        3 => prop::collection::vec(quote(), 0..4).prop_map(Ok),
        1 => Just(Err(SourceError::transport(exchange, "connection reset"))),
    ]
}

fn results() -> impl Strategy<Value = BTreeMap<String, SourceResult>> {
    (source_result(SOURCES[0]), source_result(SOURCES[1])).prop_map(|(kraken, coinbase)| {
        BTreeMap::from([
            (SOURCES[0].to_string(), kraken),
            (SOURCES[1].to_string(), coinbase),
        ])
    })
}

fn currencies() -> impl Strategy<Value = Vec<Currency>> {
    prop_oneof![
        Just(vec![Currency::BTC]),
        Just(vec![Currency::ETH]),
        Just(vec![Currency::BTC, Currency::ETH]),
    ]
}

fn policy() -> impl Strategy<Value = FailurePolicy> {
    prop_oneof![Just(FailurePolicy::Omit), Just(FailurePolicy::CarryOver)]
}

proptest! {
    /// Serializing then parsing yields the same snapshot.
    #[test]
    fn snapshot_survives_wire_format(
        results in results(),
        currencies in currencies(),
    ) {
        let snapshot = SnapshotBuilder::new(currencies, FailurePolicy::Omit).build(&results, None);
        let bytes = snapshot.to_json().unwrap();
        prop_assert_eq!(Snapshot::from_json(&bytes).unwrap(), snapshot);
    }

    /// Every present source carries exactly the configured currencies,
    /// and no published price is negative.
    #[test]
    fn snapshot_entries_are_complete_and_non_negative(
        results in results(),
        previous in results(),
        currencies in currencies(),
        policy in policy(),
    ) {
        let builder = SnapshotBuilder::new(currencies.clone(), policy);
        let previous = builder.build(&previous, None);
        let snapshot = builder.build(&results, Some(&previous));

        for (name, prices) in snapshot.sources() {
            prop_assert!(SOURCES.contains(&name), "unexpected source {name}");
            let published: Vec<Currency> = prices.keys().copied().collect();
            prop_assert_eq!(&published, &currencies);
            for pair in prices.values() {
                prop_assert!(pair.buy >= Decimal::ZERO, "negative buy {}", pair.buy);
                prop_assert!(pair.sell >= Decimal::ZERO, "negative sell {}", pair.sell);
            }
        }
    }

    /// Under `Omit`, failed sources never appear.
    #[test]
    fn omit_drops_failed_sources(
        results in results(),
        previous in results(),
        currencies in currencies(),
    ) {
        let builder = SnapshotBuilder::new(currencies, FailurePolicy::Omit);
        let previous = builder.build(&previous, None);
        let snapshot = builder.build(&results, Some(&previous));

        for (name, result) in &results {
            if result.is_err() {
                prop_assert!(snapshot.source(name).is_none());
            }
        }
    }

    /// Building is pure: the same inputs always give the same snapshot.
    #[test]
    fn build_is_deterministic(
        results in results(),
        currencies in currencies(),
        policy in policy(),
    ) {
        let builder = SnapshotBuilder::new(currencies, policy);
        prop_assert_eq!(builder.build(&results, None), builder.build(&results, None));
    }
}
