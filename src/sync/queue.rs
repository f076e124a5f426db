//! Pending queue of discovered resource paths.
//!
//! Workers push the children of every directory they synchronize; the
//! dispatcher pops one path at a time. The queue is unbounded: a push
//! never blocks, since the breadth of the tree is unknown upfront.

use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::sync::path::ResourcePath;

/// Shared FIFO of paths awaiting dispatch.
#[derive(Debug, Default)]
pub struct PendingQueue {
    entries: Mutex<VecDeque<ResourcePath>>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append paths as one batch; concurrent pops see all of them or none.
    pub fn push<I>(&self, paths: I)
    where
        I: IntoIterator<Item = ResourcePath>,
    {
        self.entries.lock().extend(paths);
    }

    /// Remove the oldest path, or `None` when the queue is empty.
    pub fn pop(&self) -> Option<ResourcePath> {
        self.entries.lock().pop_front()
    }

    /// Take every remaining path, oldest first, leaving the queue empty.
    pub fn drain(&self) -> Vec<ResourcePath> {
        self.entries.lock().drain(..).collect()
    }
}
