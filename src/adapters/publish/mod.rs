//! Publisher Adapters - Published State Commit
//!
//! Implements the `SnapshotPublisher` port with atomic replacement:
//! - `file`: temp file + rename for the served `prices.json`
//! - `cell`: versioned in-memory `Arc` swap read by `/api/data`

pub mod cell;
pub mod file;

pub use cell::{PublishedSnapshot, SnapshotCell};
pub use file::FilePublisher;
