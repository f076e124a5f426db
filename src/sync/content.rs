//! Content synchronizer.
//!
//! Transfers a single file when the target copy is missing or its
//! checksum differs from the source. Transfers are staged through a
//! private temporary file which is removed when the step ends, whether
//! it succeeded or not.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::sync::endpoint::Endpoint;
use crate::sync::path::ResourcePath;

/// Result of synchronizing one content path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentOutcome {
    /// Checksums matched, nothing was transferred.
    InSync,
    /// The content was copied from source to target.
    Transferred { bytes: u64 },
}

pub struct ContentSynchronizer {
    source: Arc<dyn Endpoint>,
    target: Arc<dyn Endpoint>,
    /// Where staging files go; the system temp dir when `None`.
    staging_dir: Option<PathBuf>,
}

impl ContentSynchronizer {
    pub fn new(source: Arc<dyn Endpoint>, target: Arc<dyn Endpoint>) -> Self {
        Self {
            source,
            target,
            staging_dir: None,
        }
    }

    pub fn with_staging_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.staging_dir = dir;
        self
    }

    /// Synchronize the content at `path`.
    pub async fn synchronize(&self, path: &ResourcePath) -> Result<ContentOutcome> {
        debug_assert!(!path.is_dir());
        debug!("synchronize content {}", path);

        let target_checksum = self
            .target
            .stat_content(path)
            .await?
            .and_then(|stat| stat.checksum)
            .filter(|cs| !cs.is_empty());

        if let Some(target_checksum) = target_checksum {
            if self.source_matches(path, &target_checksum).await {
                debug!("{} exists with same checksum {}", path, target_checksum);
                return Ok(ContentOutcome::InSync);
            }
        }

        let bytes = self.transfer(path).await?;
        info!("put content {} ({} bytes)", path, bytes);
        Ok(ContentOutcome::Transferred { bytes })
    }

    /// Checksum gate. A failed source lookup only disables the fast path.
    async fn source_matches(&self, path: &ResourcePath, target_checksum: &str) -> bool {
        match self.source.stat_content(path).await {
            Ok(Some(stat)) => stat.checksum.as_deref() == Some(target_checksum),
            Ok(None) => false,
            Err(e) => {
                warn!("head source {}: {}; transferring anyway", path, e);
                false
            }
        }
    }

    async fn transfer(&self, path: &ResourcePath) -> Result<u64> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("treesync");
        let staged = match &self.staging_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| SyncError::io("creating staging file", e))?;

        let writer = staged
            .reopen()
            .map_err(|e| SyncError::io("opening staging file", e))?;
        let mut writer = tokio::fs::File::from_std(writer);
        let download = self.source.download(path, &mut writer).await?;
        writer
            .flush()
            .await
            .map_err(|e| SyncError::io("writing staging file", e))?;
        drop(writer);

        let reader = tokio::fs::File::open(staged.path())
            .await
            .map_err(|e| SyncError::io("reading staging file", e))?;
        self.target
            .upload(path, reader, download.last_modified.as_deref())
            .await?;

        Ok(download.bytes)
    }
}
