//! File Publisher - Atomic JSON Snapshot File
//!
//! Writes the snapshot to `<path>.tmp`, syncs it, then renames it over
//! `<path>`. Rename within one directory is atomic, so the file server
//! always reads either the old or the new snapshot, never a partial one.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use crate::domain::{PublishError, Snapshot};
use crate::ports::SnapshotPublisher;

/// Atomic file publisher for the served `prices.json`.
pub struct FilePublisher {
    /// Path readers see.
    path: PathBuf,
    /// Temporary path for atomic writes.
    tmp_path: PathBuf,
}

impl FilePublisher {
    /// Create a publisher for `path`, creating its directory if needed.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create publish directory {}", dir.display()))?;
        }

        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");

        Ok(Self {
            path,
            tmp_path: PathBuf::from(tmp),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the currently published snapshot, if any.
    ///
    /// Used at startup so a carry-over policy has something to carry.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Option<Snapshot>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No published snapshot found, starting fresh");
                return Ok(None);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()));
            }
        };

        let snapshot = Snapshot::from_json(&bytes)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;

        info!(sources = snapshot.len(), "Published snapshot loaded");
        Ok(Some(snapshot))
    }

    async fn write_tmp(&self, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = fs::File::create(&self.tmp_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> PublishError {
        PublishError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[async_trait]
impl SnapshotPublisher for FilePublisher {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn publish(&self, snapshot: &Snapshot) -> Result<(), PublishError> {
        let bytes = snapshot.to_json()?;

        self.write_tmp(&bytes)
            .await
            .map_err(|e| self.io_error(&self.tmp_path, e))?;

        fs::rename(&self.tmp_path, &self.path)
            .await
            .map_err(|e| self.io_error(&self.path, e))?;

        debug!(
            path = %self.path.display(),
            bytes = bytes.len(),
            sources = snapshot.len(),
            "Snapshot file replaced"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Currency, PricePair, SourcePrices};
    use rust_decimal_macros::dec;

    fn sample() -> Snapshot {
        let mut prices = SourcePrices::new();
        prices.insert(Currency::BTC, PricePair { buy: dec!(50000), sell: dec!(49950) });
        prices.insert(Currency::ETH, PricePair { buy: dec!(3000), sell: dec!(2990) });
        [("kraken".to_string(), prices)].into_iter().collect()
    }

    #[tokio::test]
    async fn test_publish_writes_file_and_removes_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = FilePublisher::new(dir.path().join("backend/prices.json")).await.unwrap();

        publisher.publish(&sample()).await.unwrap();

        let written = std::fs::read(publisher.path()).unwrap();
        assert_eq!(Snapshot::from_json(&written).unwrap(), sample());
        assert!(!dir.path().join("backend/prices.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_publish_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = FilePublisher::new(dir.path().join("prices.json")).await.unwrap();

        publisher.publish(&sample()).await.unwrap();
        let first = std::fs::read(publisher.path()).unwrap();
        publisher.publish(&sample()).await.unwrap();
        let second = std::fs::read(publisher.path()).unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_load_round_trips_published_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = FilePublisher::new(dir.path().join("prices.json")).await.unwrap();

        assert!(publisher.load().await.unwrap().is_none());
        publisher.publish(&sample()).await.unwrap();
        assert_eq!(publisher.load().await.unwrap(), Some(sample()));
    }

    #[tokio::test]
    async fn test_publish_reports_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = FilePublisher::new(dir.path().join("prices.json")).await.unwrap();
        // A directory where the tmp file should go makes File::create fail.
        std::fs::create_dir(dir.path().join("prices.json.tmp")).unwrap();

        let err = publisher.publish(&sample()).await.unwrap_err();
        assert!(matches!(err, PublishError::Io { .. }));
    }
}
