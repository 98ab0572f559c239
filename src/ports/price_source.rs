//! Price Source Port - External Exchange Quote Interface
//!
//! Defines the trait every exchange adapter implements. Each adapter
//! speaks its exchange's protocol and hands back normalized `Quote`s,
//! so the snapshot builder never sees exchange-specific shapes.

use async_trait::async_trait;

use crate::domain::{Currency, SourceResult};

/// Trait for price source providers.
///
/// Implementors query one external API for a fixed set of pairs.
/// A call either returns one `Quote` per requested currency or fails
/// as a whole; partial currency sets are never returned.
#[async_trait]
pub trait PriceSource: Send + Sync + 'static {
  /// Stable source name, used as the snapshot key (e.g. "kraken").
  fn name(&self) -> &'static str;

  /// Fetch quotes for every currency in `currencies`, priced in `fiat`.
  ///
  /// Network I/O only; must not touch shared mutable state.
  async fn fetch(&self, currencies: &[Currency], fiat: Currency) -> SourceResult;
}
