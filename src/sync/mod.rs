//! Synchronization engine.
//!
//! Walks the source tree breadth-first with a bounded worker pool,
//! creating missing directories at the target before anything is written
//! inside them and transferring contents whose checksum differs.

pub mod content;
pub mod directory;
pub mod endpoint;
pub mod engine;
pub mod inflight;
pub mod path;
pub mod queue;

pub use content::{ContentOutcome, ContentSynchronizer};
pub use directory::{DirOutcome, DirectorySynchronizer};
pub use endpoint::{ContentStat, DirStat, Download, Endpoint};
pub use engine::{SyncEngine, SyncOptions, SyncReport};
pub use inflight::InFlightRegistry;
pub use path::ResourcePath;
pub use queue::PendingQueue;
