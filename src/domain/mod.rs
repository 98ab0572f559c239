//! Domain layer - Prices, snapshots and the rules that combine them.
//!
//! Pure logic for the price crawler (hexagonal architecture inner ring).
//! No I/O happens here; adapters produce `Quote`s and consume `Snapshot`s.

pub mod error;
pub mod quote;
pub mod snapshot;

// Re-export core types for convenience
pub use error::{PublishError, SourceError};
pub use quote::{Currency, Quote, QuoteError, Side};
pub use snapshot::{FailurePolicy, PricePair, Snapshot, SnapshotBuilder, SourcePrices, SourceResult};
