use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use thiserror::Error;
use tracing::error;

use crate::sync::ResourcePath;

/// Errors raised by a resource store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Nothing of the requested kind at this path
    #[error("{0}: not found")]
    NotFound(String),

    /// A write collides with an existing resource of the other kind
    #[error("{path}: {reason}")]
    Conflict { path: String, reason: String },

    /// The request itself is invalid
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The store does not support this operation
    #[error("{0}: not implemented by this store")]
    Unsupported(String),

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("object storage: {0}")]
    Backend(#[from] opendal::Error),
}

impl StoreError {
    pub fn io(path: &ResourcePath, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_string(),
            source,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Conflict { .. } | StoreError::BadRequest(_) => StatusCode::BAD_REQUEST,
            StoreError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            StoreError::Io { .. } | StoreError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = self.status();
        error!("{}: {}", status, self);
        (status, self.to_string()).into_response()
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Metadata served on `HEAD <path>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentMeta {
    pub last_modified: Option<DateTime<Utc>>,
    pub size: u64,
    pub checksum: String,
}

/// Metadata served on `HEAD <dir>/`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirMeta {
    pub last_modified: Option<DateTime<Utc>>,
}

/// Content bytes moving through the gateway, chunk by chunk.
pub type ContentStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Content served on `GET <path>`
pub struct StoredContent {
    pub body: ContentStream,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Storage behind a gateway. Paths are resource paths relative to the
/// store root.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// `None` when absent or a directory.
    async fn stat_content(&self, path: &ResourcePath) -> StoreResult<Option<ContentMeta>>;

    /// `None` when absent or not a directory.
    async fn stat_dir(&self, dir: &ResourcePath) -> StoreResult<Option<DirMeta>>;

    /// Direct children, directories first then contents, each sorted.
    async fn list(&self, dir: &ResourcePath) -> StoreResult<Vec<ResourcePath>>;

    async fn read_content(&self, path: &ResourcePath) -> StoreResult<StoredContent>;

    /// Create or replace a content from `body`, applying `modified` when
    /// given. Returns the number of bytes stored.
    async fn write_content(
        &self,
        path: &ResourcePath,
        body: ContentStream,
        modified: Option<DateTime<Utc>>,
    ) -> StoreResult<u64>;

    /// Create a directory; succeeds if it already exists.
    async fn make_dir(&self, dir: &ResourcePath, recursive: bool) -> StoreResult<()>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Sort children the way listings present them.
pub(crate) fn sort_listing(entries: &mut [ResourcePath]) {
    entries.sort_by(|a, b| match (a.is_dir(), b.is_dir()) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => a.cmp(b),
    });
}
