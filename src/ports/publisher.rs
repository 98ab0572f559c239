//! Publisher Port - Snapshot Commit Interface
//!
//! Defines the trait for committing a finished snapshot to the
//! externally visible published state (file, in-memory cell).

use async_trait::async_trait;

use crate::domain::{PublishError, Snapshot};

/// Trait for snapshot publishers.
///
/// A publisher is the single writer of its published state. Readers
/// must observe either the previous or the new snapshot in full,
/// never a mixture of the two.
#[async_trait]
pub trait SnapshotPublisher: Send + Sync + 'static {
  /// Short name for logs and metrics (e.g. "file").
  fn name(&self) -> &'static str;

  /// Atomically replace the published snapshot.
  async fn publish(&self, snapshot: &Snapshot) -> Result<(), PublishError>;
}
