//! In-flight registry.
//!
//! Records which directory paths and which content paths are currently
//! being synchronized. A path is a member from the moment a worker takes
//! it until that single path (not its descendants) is done. The registry
//! only gates children on their parent; it never deduplicates work.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

use crate::sync::path::ResourcePath;

#[derive(Debug, Default)]
struct InFlight {
    dirs: HashSet<ResourcePath>,
    contents: HashSet<ResourcePath>,
}

impl InFlight {
    fn set_for(&mut self, path: &ResourcePath) -> &mut HashSet<ResourcePath> {
        if path.is_dir() {
            &mut self.dirs
        } else {
            &mut self.contents
        }
    }
}

/// Shared sets of directories and contents in flight.
#[derive(Debug, Default)]
pub struct InFlightRegistry {
    inner: Mutex<InFlight>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `path` in flight in the set matching its kind.
    pub fn mark(&self, path: &ResourcePath) {
        self.inner.lock().set_for(path).insert(path.clone());
    }

    /// Clear the mark for `path`. Returns false if it was not marked.
    pub fn clear(&self, path: &ResourcePath) -> bool {
        self.inner.lock().set_for(path).remove(path)
    }

    pub fn is_dir_in_flight(&self, dir: &ResourcePath) -> bool {
        self.inner.lock().dirs.contains(dir)
    }

    /// Parent gate: return once the parent directory of `path` is no
    /// longer in flight, re-checking every `interval`. Immediate for the
    /// root and for paths whose parent is idle.
    pub async fn wait_for_parent(&self, path: &ResourcePath, interval: Duration) {
        let Some(parent) = path.parent() else {
            return;
        };
        while self.is_dir_in_flight(&parent) {
            debug!("{} waits for parent {}", path, parent);
            tokio::time::sleep(interval).await;
        }
    }
}
