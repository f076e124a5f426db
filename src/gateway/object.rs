use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use opendal::{services::S3, ErrorKind, Metadata, Operator};
use std::time::SystemTime;
use tracing::debug;

use crate::checksum::checksum_stream;
use crate::gateway::store::{
    sort_listing, ContentMeta, ContentStream, DirMeta, ResourceStore, StoreError, StoreResult,
    StoredContent,
};
use crate::sync::ResourcePath;
use crate::timefmt::from_system_time;

/// Read-only store over an object storage bucket.
///
/// Object keys are resource paths without their leading `/`; "directories"
/// are key prefixes ending with `/`.
pub struct ObjectStore {
    operator: Operator,
    name: String,
}

impl ObjectStore {
    /// S3 or S3-compatible bucket.
    ///
    /// Credentials come from the standard AWS chain (environment, shared
    /// credentials file, instance profile).
    pub fn new_s3(bucket: &str, region: &str, endpoint: Option<&str>) -> StoreResult<Self> {
        let mut builder = S3::default().bucket(bucket).region(region);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint(endpoint);
        }
        let operator = Operator::new(builder)?.finish();

        Ok(Self {
            operator,
            name: format!("s3://{}", bucket),
        })
    }

    /// Wrap an already configured operator.
    pub fn from_operator(operator: Operator, name: impl Into<String>) -> Self {
        Self {
            operator,
            name: name.into(),
        }
    }

    fn key(path: &ResourcePath) -> &str {
        path.as_str().trim_start_matches('/')
    }

    /// Key to list a directory with; the bucket root lists as `/`.
    fn list_key(dir: &ResourcePath) -> &str {
        if dir.is_root() {
            "/"
        } else {
            Self::key(dir)
        }
    }

    /// Metadata of the object at `path`, `None` when absent or a prefix.
    async fn object_meta(&self, path: &ResourcePath) -> StoreResult<Option<Metadata>> {
        match self.operator.stat(Self::key(path)).await {
            Ok(meta) if meta.mode().is_dir() => Ok(None),
            Ok(meta) => Ok(Some(meta)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn object_stream(&self, path: &ResourcePath) -> StoreResult<ContentStream> {
        let reader = self.operator.reader(Self::key(path)).await?;
        Ok(reader.into_bytes_stream(..).await?.boxed())
    }

    async fn children(&self, dir: &ResourcePath) -> StoreResult<Vec<ResourcePath>> {
        let key = Self::key(dir);
        let entries = match self.operator.list(Self::list_key(dir)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut children = Vec::new();
        for entry in entries {
            let entry_path = entry.path();
            if entry_path.is_empty() || entry_path == "/" || entry_path == key {
                continue;
            }
            match ResourcePath::parse(&format!("/{}", entry_path)) {
                Ok(child) if child.is_child_of(dir) => children.push(child),
                _ => debug!("skip object {}", entry_path),
            }
        }
        Ok(children)
    }
}

#[async_trait]
impl ResourceStore for ObjectStore {
    async fn stat_content(&self, path: &ResourcePath) -> StoreResult<Option<ContentMeta>> {
        let Some(meta) = self.object_meta(path).await? else {
            return Ok(None);
        };

        // Object stores expose no SHA-256 of their own; stream the object
        // through the hasher.
        let (checksum, size) = checksum_stream(self.object_stream(path).await?)
            .await
            .map_err(|e| StoreError::io(path, e))?;
        Ok(Some(ContentMeta {
            last_modified: modified_time(&meta),
            size,
            checksum,
        }))
    }

    async fn stat_dir(&self, dir: &ResourcePath) -> StoreResult<Option<DirMeta>> {
        if dir.is_root() || !self.children(dir).await?.is_empty() {
            Ok(Some(DirMeta::default()))
        } else {
            Ok(None)
        }
    }

    async fn list(&self, dir: &ResourcePath) -> StoreResult<Vec<ResourcePath>> {
        let mut children = self.children(dir).await?;
        if children.is_empty() && !dir.is_root() {
            return Err(StoreError::NotFound(dir.to_string()));
        }
        sort_listing(&mut children);
        Ok(children)
    }

    async fn read_content(&self, path: &ResourcePath) -> StoreResult<StoredContent> {
        let Some(meta) = self.object_meta(path).await? else {
            return Err(StoreError::NotFound(path.to_string()));
        };
        Ok(StoredContent {
            body: self.object_stream(path).await?,
            last_modified: modified_time(&meta),
        })
    }

    async fn write_content(
        &self,
        path: &ResourcePath,
        _body: ContentStream,
        _modified: Option<DateTime<Utc>>,
    ) -> StoreResult<u64> {
        Err(StoreError::Unsupported(path.to_string()))
    }

    async fn make_dir(&self, dir: &ResourcePath, _recursive: bool) -> StoreResult<()> {
        Err(StoreError::Unsupported(dir.to_string()))
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

/// Object modification time at whole-second precision.
fn modified_time(meta: &Metadata) -> Option<DateTime<Utc>> {
    meta.last_modified()
        .map(SystemTime::from)
        .and_then(from_system_time)
}
