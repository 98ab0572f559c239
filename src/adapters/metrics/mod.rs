//! Metrics and Monitoring Adapters
//!
//! Prometheus counters for the poll loop and the health flags behind
//! the `/live` and `/ready` routes. Both are served by the file server.

pub mod health;
pub mod prometheus;

pub use health::HealthState;
pub use prometheus::MetricsRegistry;
