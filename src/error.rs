//! Error types for treesync
//!
//! Every failure the synchronizer can meet while handling a single
//! resource path falls in one of four kinds:
//! - transport errors (connection refused, reset, HTTP-layer timeout)
//! - protocol errors (an endpoint answered with an unexpected status)
//! - local I/O errors (staging a download in temporary storage)
//! - malformed responses (unparsable listing line or metadata header)
//!
//! These errors are resolved at the scope of one path: the worker logs
//! them and moves on. They never abort a run.

use thiserror::Error;

/// Boxed error used as the source of transport failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while synchronizing a resource path
#[derive(Error, Debug)]
pub enum SyncError {
    /// The request never produced a response
    #[error("transport error on {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: BoxError,
    },

    /// The endpoint answered with a status the protocol does not allow here
    #[error("{method} {url}: unexpected status {status}")]
    Protocol {
        method: &'static str,
        url: String,
        status: u16,
    },

    /// Local temporary storage failed
    #[error("I/O error while {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// The endpoint answered but the payload could not be understood
    #[error("malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },

    /// A string that is not a valid resource path
    #[error("invalid resource path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Session configuration rejected
    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Wrap a transport failure for `url`
    pub fn transport(url: impl Into<String>, source: impl Into<BoxError>) -> Self {
        SyncError::Transport {
            url: url.into(),
            source: source.into(),
        }
    }

    /// Wrap a local I/O failure with the operation that caused it
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        SyncError::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Short label of the error kind, used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Transport { .. } => "transport",
            SyncError::Protocol { .. } => "protocol",
            SyncError::Io { .. } => "io",
            SyncError::Malformed { .. } => "malformed",
            SyncError::InvalidPath { .. } => "path",
            SyncError::Config(_) => "config",
        }
    }
}

/// Result type alias for SyncError
pub type Result<T> = std::result::Result<T, SyncError>;
