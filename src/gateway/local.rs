use async_trait::async_trait;
use chrono::{DateTime, Utc};
use filetime::{set_file_times, FileTime};
use futures::StreamExt;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::{debug, info, warn};

use crate::checksum::checksum_file_async;
use crate::gateway::store::{
    sort_listing, ContentMeta, ContentStream, DirMeta, ResourceStore, StoreError, StoreResult,
    StoredContent,
};
use crate::sync::ResourcePath;
use crate::timefmt::from_system_time;

/// Read/write store over a local directory tree.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Filesystem location of a resource path. Resource paths carry no
    /// `.`/`..` segments, so the result stays under the root.
    fn resolve(&self, path: &ResourcePath) -> PathBuf {
        let mut full = self.root.clone();
        for segment in path.segments() {
            full.push(segment);
        }
        full
    }

    async fn metadata(&self, path: &ResourcePath) -> StoreResult<Option<std::fs::Metadata>> {
        match tokio::fs::metadata(self.resolve(path)).await {
            Ok(meta) => Ok(Some(meta)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}

#[async_trait]
impl ResourceStore for LocalStore {
    async fn stat_content(&self, path: &ResourcePath) -> StoreResult<Option<ContentMeta>> {
        let Some(meta) = self.metadata(path).await? else {
            return Ok(None);
        };
        if meta.is_dir() {
            return Ok(None);
        }
        let checksum = checksum_file_async(&self.resolve(path))
            .await
            .map_err(|e| StoreError::io(path, e))?;

        Ok(Some(ContentMeta {
            last_modified: meta.modified().ok().and_then(from_system_time),
            size: meta.len(),
            checksum,
        }))
    }

    async fn stat_dir(&self, dir: &ResourcePath) -> StoreResult<Option<DirMeta>> {
        match self.metadata(dir).await? {
            Some(meta) if meta.is_dir() => Ok(Some(DirMeta {
                last_modified: meta.modified().ok().and_then(from_system_time),
            })),
            _ => Ok(None),
        }
    }

    async fn list(&self, dir: &ResourcePath) -> StoreResult<Vec<ResourcePath>> {
        let full = self.resolve(dir);
        debug!("list {}", full.display());
        match self.metadata(dir).await? {
            Some(meta) if meta.is_dir() => {}
            _ => return Err(StoreError::NotFound(dir.to_string())),
        }
        let mut read_dir = tokio::fs::read_dir(&full)
            .await
            .map_err(|e| StoreError::io(dir, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| StoreError::io(dir, e))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            let file_type = entry.file_type().await.map_err(|e| StoreError::io(dir, e))?;
            let child = if file_type.is_dir() {
                dir.child_dir(&name)
            } else {
                dir.child_content(&name)
            };
            match child {
                Ok(child) => entries.push(child),
                Err(e) => debug!("skip {}: {}", name, e),
            }
        }

        sort_listing(&mut entries);
        Ok(entries)
    }

    async fn read_content(&self, path: &ResourcePath) -> StoreResult<StoredContent> {
        let full = self.resolve(path);
        match self.metadata(path).await? {
            Some(meta) if !meta.is_dir() => {
                let file = tokio::fs::File::open(&full)
                    .await
                    .map_err(|e| StoreError::io(path, e))?;
                Ok(StoredContent {
                    body: ReaderStream::new(file).boxed(),
                    last_modified: meta.modified().ok().and_then(from_system_time),
                })
            }
            _ => Err(StoreError::NotFound(path.to_string())),
        }
    }

    async fn write_content(
        &self,
        path: &ResourcePath,
        body: ContentStream,
        modified: Option<DateTime<Utc>>,
    ) -> StoreResult<u64> {
        if let Some(meta) = self.metadata(path).await? {
            if meta.is_dir() {
                return Err(StoreError::Conflict {
                    path: path.to_string(),
                    reason: "is a directory".to_string(),
                });
            }
        }

        let full = self.resolve(path);
        let mut file = tokio::fs::File::create(&full)
            .await
            .map_err(|e| StoreError::io(path, e))?;
        let mut reader = StreamReader::new(body);
        let copied = match tokio::io::copy(&mut reader, &mut file).await {
            Ok(len) => file.flush().await.map(|_| len),
            Err(e) => Err(e),
        };
        drop(file);
        let len = match copied {
            Ok(len) => len,
            Err(e) => {
                // A half-written content must not look complete.
                if let Err(remove) = tokio::fs::remove_file(&full).await {
                    warn!("could not remove partial {}: {}", full.display(), remove);
                }
                return Err(StoreError::io(path, e));
            }
        };

        if let Some(modified) = modified {
            let time = FileTime::from_unix_time(modified.timestamp(), 0);
            set_file_times(&full, time, time).map_err(|e| StoreError::io(path, e))?;
        }
        debug!("wrote {} bytes to {}", len, full.display());
        Ok(len)
    }

    async fn make_dir(&self, dir: &ResourcePath, recursive: bool) -> StoreResult<()> {
        if let Some(meta) = self.metadata(dir).await? {
            if meta.is_dir() {
                debug!("mkdir {}: already exists", dir);
                return Ok(());
            }
            return Err(StoreError::Conflict {
                path: dir.to_string(),
                reason: "is not a directory".to_string(),
            });
        }

        let full = self.resolve(dir);
        let created = if recursive {
            tokio::fs::create_dir_all(&full).await
        } else {
            tokio::fs::create_dir(&full).await
        };
        created.map_err(|e| StoreError::io(dir, e))?;
        info!("mkdir {}", full.display());
        Ok(())
    }

    fn describe(&self) -> String {
        format!("fs:{}", self.root.display())
    }
}
