//! Command line interface.
//!
//! Flags override values loaded from the configuration file.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{ServeConfig, StoreKind, SyncConfig};

/// Mirror a directory tree between two HTTP resource gateways
#[derive(Parser, Debug, Clone)]
#[command(
    name = "treesync",
    version,
    about = "Mirror a directory tree between two HTTP resource gateways",
    after_help = "EXAMPLES:\n    \
        treesync serve --addr 0.0.0.0:8080 --root-dir /srv/backup\n    \
        treesync serve --addr 0.0.0.0:8081 --store s3 --bucket photos --region eu-west-1\n    \
        treesync sync --source-url http://src:8081 --target-url http://dst:8080 -w 8"
)]
pub struct Cli {
    /// Display debug messages
    #[arg(long, global = true)]
    pub debug: bool,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Synchronize the source tree onto the target
    Sync(SyncArgs),
    /// Serve a resource tree over HTTP
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct SyncArgs {
    /// Source gateway URL
    #[arg(long, value_name = "URL")]
    pub source_url: Option<String>,

    /// Target gateway URL
    #[arg(long, value_name = "URL")]
    pub target_url: Option<String>,

    /// Number of concurrent workers
    #[arg(short = 'w', long, value_name = "NUM")]
    pub workers: Option<usize>,

    /// Interval between polls of an empty queue
    #[arg(long, value_name = "MS")]
    pub poll_interval_ms: Option<u64>,

    /// Consecutive empty polls that end the run
    #[arg(long, value_name = "NUM")]
    pub quiescence_polls: Option<u32>,

    /// Interval between parent gate checks
    #[arg(long, value_name = "MS")]
    pub gate_interval_ms: Option<u64>,

    /// Directory for staged downloads
    #[arg(long, value_name = "DIR")]
    pub staging_dir: Option<PathBuf>,
}

impl SyncArgs {
    pub fn apply(&self, config: &mut SyncConfig) {
        if let Some(url) = &self.source_url {
            config.source_url = url.clone();
        }
        if let Some(url) = &self.target_url {
            config.target_url = url.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval_ms = ms;
        }
        if let Some(polls) = self.quiescence_polls {
            config.quiescence_polls = polls;
        }
        if let Some(ms) = self.gate_interval_ms {
            config.gate_interval_ms = ms;
        }
        if let Some(dir) = &self.staging_dir {
            config.staging_dir = Some(dir.clone());
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// The host:port to bind the HTTP server
    #[arg(long, value_name = "ADDR")]
    pub addr: Option<String>,

    /// Storage backend
    #[arg(long, value_enum)]
    pub store: Option<StoreKind>,

    /// Root directory of the filesystem store
    #[arg(long, value_name = "DIR")]
    pub root_dir: Option<PathBuf>,

    /// Bucket of the object store
    #[arg(long)]
    pub bucket: Option<String>,

    /// Region of the object store
    #[arg(long)]
    pub region: Option<String>,

    /// Custom endpoint for S3-compatible providers
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,
}

impl ServeArgs {
    pub fn apply(&self, config: &mut ServeConfig) {
        if let Some(addr) = &self.addr {
            config.addr = addr.clone();
        }
        if let Some(store) = self.store {
            config.store = store;
        }
        if let Some(dir) = &self.root_dir {
            config.root_dir = Some(dir.clone());
        }
        if let Some(bucket) = &self.bucket {
            config.bucket = Some(bucket.clone());
        }
        if let Some(region) = &self.region {
            config.region = Some(region.clone());
        }
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = Some(endpoint.clone());
        }
    }
}
