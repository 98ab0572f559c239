//! Price Source Adapters - Exchange REST APIs
//!
//! Implements the `PriceSource` port for:
//! - Kraken: public ticker, one request per pair
//! - Coinbase: spot prices, one buy and one sell request per pair
//! - Client: shared retrying reqwest client

pub mod client;
pub mod coinbase;
pub mod kraken;

pub use client::{SourceClient, SourceClientConfig};
pub use coinbase::CoinbaseSource;
pub use kraken::KrakenSource;
