//! Snapshot Cell - Versioned In-Memory Published State
//!
//! Holds the current snapshot behind an `Arc` in a `watch` channel.
//! Publishing swaps the pointer; readers clone the `Arc` and keep a
//! consistent snapshot for as long as they hold it.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::domain::{PublishError, Snapshot};
use crate::ports::SnapshotPublisher;

/// One committed snapshot together with its serialized body.
#[derive(Debug)]
pub struct PublishedSnapshot {
    /// Monotonic commit counter, starting at 1.
    pub version: u64,
    pub snapshot: Snapshot,
    /// Canonical JSON, serialized once at commit time.
    pub body: Bytes,
    pub published_at: DateTime<Utc>,
}

/// Single-writer, many-reader snapshot cell.
#[derive(Debug, Clone)]
pub struct SnapshotCell {
    tx: Arc<watch::Sender<Option<Arc<PublishedSnapshot>>>>,
}

impl SnapshotCell {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// The current snapshot, or `None` before the first commit.
    pub fn current(&self) -> Option<Arc<PublishedSnapshot>> {
        self.tx.borrow().clone()
    }

    /// Version of the current snapshot (0 before the first commit).
    pub fn version(&self) -> u64 {
        self.tx.borrow().as_ref().map_or(0, |p| p.version)
    }

    /// Receiver notified on every commit.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<PublishedSnapshot>>> {
        self.tx.subscribe()
    }
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotPublisher for SnapshotCell {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn publish(&self, snapshot: &Snapshot) -> Result<(), PublishError> {
        let body = Bytes::from(snapshot.to_json()?);
        let published = Arc::new(PublishedSnapshot {
            version: self.version() + 1,
            snapshot: snapshot.clone(),
            body,
            published_at: Utc::now(),
        });

        self.tx.send_replace(Some(published));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Currency, PricePair, SourcePrices};
    use rust_decimal_macros::dec;

    fn sample(buy: rust_decimal::Decimal) -> Snapshot {
        let mut prices = SourcePrices::new();
        prices.insert(Currency::BTC, PricePair { buy, sell: dec!(1) });
        [("coinbase".to_string(), prices)].into_iter().collect()
    }

    #[tokio::test]
    async fn test_empty_cell_has_no_snapshot() {
        let cell = SnapshotCell::new();
        assert!(cell.current().is_none());
        assert_eq!(cell.version(), 0);
    }

    #[tokio::test]
    async fn test_publish_bumps_version_and_swaps_body() {
        let cell = SnapshotCell::new();

        cell.publish(&sample(dec!(10))).await.unwrap();
        let first = cell.current().unwrap();
        cell.publish(&sample(dec!(20))).await.unwrap();
        let second = cell.current().unwrap();

        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        // A reader holding the old Arc keeps the old snapshot.
        assert_eq!(first.snapshot, sample(dec!(10)));
        assert_eq!(Snapshot::from_json(&second.body).unwrap(), sample(dec!(20)));
    }

    #[tokio::test]
    async fn test_subscribers_see_commits() {
        let cell = SnapshotCell::new();
        let mut rx = cell.subscribe();

        cell.publish(&sample(dec!(5))).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref().unwrap().version, 1);
    }
}
