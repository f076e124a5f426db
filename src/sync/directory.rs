//! Directory synchronizer.
//!
//! Makes sure a directory exists at the target, then returns the children
//! the source lists for it. Children are handed back to the caller, which
//! enqueues them only after this step has finished; that is what orders
//! a directory's creation before anything is written inside it.

use std::sync::Arc;
use tracing::{debug, info};

use crate::error::Result;
use crate::sync::endpoint::Endpoint;
use crate::sync::path::ResourcePath;

/// Result of synchronizing one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirOutcome {
    /// The directory was missing at the target and has been created.
    pub created: bool,
    /// Direct children discovered at the source.
    pub children: Vec<ResourcePath>,
}

pub struct DirectorySynchronizer {
    source: Arc<dyn Endpoint>,
    target: Arc<dyn Endpoint>,
}

impl DirectorySynchronizer {
    pub fn new(source: Arc<dyn Endpoint>, target: Arc<dyn Endpoint>) -> Self {
        Self { source, target }
    }

    /// Synchronize `dir`. Any error aborts the step: no children are
    /// returned and the subtree is left unexplored for this run.
    pub async fn synchronize(&self, dir: &ResourcePath) -> Result<DirOutcome> {
        debug_assert!(dir.is_dir());
        debug!("synchronize dir {}", dir);

        let exists = self.target.stat_dir(dir).await?.is_some();
        if exists {
            debug!("dir {} exists at target", dir);
        } else {
            self.target.make_dir(dir, true).await?;
            info!("mkdir {}", dir);
        }

        let children = self.source.list(dir).await?;
        debug!("dir {} lists {} entries", dir, children.len());

        Ok(DirOutcome {
            created: !exists,
            children,
        })
    }
}
