//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the poll loop requires from
//! the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `PriceSource`: Exchange price APIs (Kraken, Coinbase)
//! - `SnapshotPublisher`: Published state (JSON file, in-memory cell)

pub mod price_source;
pub mod publisher;

pub use price_source::PriceSource;
pub use publisher::SnapshotPublisher;
