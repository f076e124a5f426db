// Library module for treesync
// Re-exports modules for use in integration tests and the binary

pub mod checksum;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod sync;
pub mod timefmt;

pub use error::{Result, SyncError};
pub use sync::{ResourcePath, SyncEngine, SyncOptions, SyncReport};
