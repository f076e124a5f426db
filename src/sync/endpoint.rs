//! Endpoint trait: what the synchronizers need from a source or target.
//!
//! Each method maps to one request of the gateway protocol. The HTTP
//! implementation lives in `crate::gateway::client`; tests plug in an
//! in-memory implementation that records calls.

use async_trait::async_trait;
use tokio::fs::File;

use crate::error::Result;
use crate::sync::path::ResourcePath;

/// Metadata of an existing directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirStat {
    /// Raw `Last-Modified` value, when the endpoint sends one.
    pub last_modified: Option<String>,
}

/// Metadata of an existing content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentStat {
    pub last_modified: Option<String>,
    pub size: Option<u64>,
    /// Hex digest computed by the endpoint on demand.
    pub checksum: Option<String>,
}

/// Outcome of a content download.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Download {
    /// `Last-Modified` of the source, forwarded verbatim on upload.
    pub last_modified: Option<String>,
    pub bytes: u64,
}

/// One side of a synchronization: a resource tree reachable over the
/// gateway protocol.
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// `HEAD <dir>/`: `None` unless the directory exists.
    async fn stat_dir(&self, dir: &ResourcePath) -> Result<Option<DirStat>>;

    /// `HEAD <path>`: `None` unless the content exists.
    async fn stat_content(&self, path: &ResourcePath) -> Result<Option<ContentStat>>;

    /// `GET <dir>/`: direct children, as full resource paths.
    async fn list(&self, dir: &ResourcePath) -> Result<Vec<ResourcePath>>;

    /// `PUT <dir>/[?recursive]`: create the directory.
    async fn make_dir(&self, dir: &ResourcePath, recursive: bool) -> Result<()>;

    /// `GET <path>`: stream the content into `dest`.
    async fn download(&self, path: &ResourcePath, dest: &mut File) -> Result<Download>;

    /// `PUT <path>`: upload `src`, carrying the source modification time.
    async fn upload(
        &self,
        path: &ResourcePath,
        src: File,
        last_modified: Option<&str>,
    ) -> Result<()>;

    /// Human readable location, for logs.
    fn describe(&self) -> String;
}
