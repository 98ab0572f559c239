//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP clients, files, an HTTP server). Each
//! sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `sources`: Kraken and Coinbase REST price sources
//! - `publish`: Atomic file and in-memory snapshot publishers
//! - `server`: CORS-enabled file server
//! - `metrics`: Prometheus metrics and health state

pub mod metrics;
pub mod publish;
pub mod server;
pub mod sources;
