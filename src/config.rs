//! Configuration for sync sessions and the gateway server.
//!
//! Values are read from a TOML file (by default
//! `<config dir>/treesync/config.toml`) and then overridden by command
//! line flags. A missing default file is not an error.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SyncError};
use crate::sync::engine::SyncOptions;

/// Maximum reasonable worker count
const MAX_WORKERS: usize = 512;

/// Default number of concurrent workers
pub const DEFAULT_WORKERS: usize = 5;

/// Default interval between two polls of an empty queue
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default number of consecutive empty polls before a run is complete
pub const DEFAULT_QUIESCENCE_POLLS: u32 = 600;

/// Default interval between two checks of the parent gate
pub const DEFAULT_GATE_INTERVAL_MS: u64 = 1000;

/// Settings of one synchronization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL of the source gateway
    pub source_url: String,
    /// Base URL of the target gateway
    pub target_url: String,
    /// Number of concurrent workers
    pub workers: usize,
    /// Dispatcher poll interval, in milliseconds
    pub poll_interval_ms: u64,
    /// Consecutive empty polls that end the run
    pub quiescence_polls: u32,
    /// Parent gate re-check interval, in milliseconds
    pub gate_interval_ms: u64,
    /// Directory for staged downloads (system temp dir if unset)
    pub staging_dir: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source_url: String::new(),
            target_url: String::new(),
            workers: DEFAULT_WORKERS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            quiescence_polls: DEFAULT_QUIESCENCE_POLLS,
            gate_interval_ms: DEFAULT_GATE_INTERVAL_MS,
            staging_dir: None,
        }
    }
}

impl SyncConfig {
    /// Check the configuration is usable for a run
    pub fn validate(&self) -> Result<()> {
        if self.source_url.is_empty() {
            return Err(SyncError::Config("empty source URL".to_string()));
        }
        if self.target_url.is_empty() {
            return Err(SyncError::Config("empty target URL".to_string()));
        }
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(SyncError::Config(format!(
                "workers must be between 1 and {}, got {}",
                MAX_WORKERS, self.workers
            )));
        }
        if self.quiescence_polls == 0 {
            return Err(SyncError::Config(
                "quiescence polls must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Engine tuning derived from this configuration
    pub fn options(&self) -> SyncOptions {
        SyncOptions {
            workers: self.workers,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            quiescence_polls: self.quiescence_polls,
            gate_interval: Duration::from_millis(self.gate_interval_ms),
            staging_dir: self.staging_dir.clone(),
        }
    }
}

/// Storage backend served by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Local filesystem, read/write
    #[default]
    Fs,
    /// S3-compatible object storage, read-only
    S3,
}

/// Settings of the gateway server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Address to bind, `host:port`
    pub addr: String,
    pub store: StoreKind,
    /// Tree root for the filesystem store
    pub root_dir: Option<PathBuf>,
    /// Bucket for the object store
    pub bucket: Option<String>,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible providers
    pub endpoint: Option<String>,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
            store: StoreKind::Fs,
            root_dir: None,
            bucket: None,
            region: None,
            endpoint: None,
        }
    }
}

impl ServeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.addr.is_empty() {
            return Err(SyncError::Config("empty bind address".to_string()));
        }
        match self.store {
            StoreKind::Fs if self.root_dir.is_none() => Err(SyncError::Config(
                "the fs store needs a root directory".to_string(),
            )),
            StoreKind::S3 if self.bucket.is_none() => Err(SyncError::Config(
                "the s3 store needs a bucket".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Contents of a configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub sync: SyncConfig,
    pub serve: ServeConfig,
}

impl ConfigFile {
    /// Default location, `<config dir>/treesync/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("treesync").join("config.toml"))
    }

    /// Parse a configuration from TOML text
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| SyncError::Config(e.to_string()))
    }

    /// Load an explicit configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SyncError::io(format!("reading {}", path.display()), e))?;
        Self::parse(&text)
    }

    /// Load `path` if given, else the default file if it exists, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}
