//! Error taxonomy for the sync engine.
//!
//! Nothing here is fatal to the process: the worst outcome of any error is a
//! growing offline queue or a stale `last_sync_at`, both recoverable on the
//! next successful cycle.

use thiserror::Error;

use crate::scheduler::{MAX_INTERVAL_MS, MIN_INTERVAL_MS};

/// Input rejected before anything was applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Record text must not be empty")]
    EmptyText,

    #[error("Record category must not be empty")]
    EmptyCategory,

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error(
        "Sync interval {0} ms is out of range ({min} to {max} ms)",
        min = MIN_INTERVAL_MS,
        max = MAX_INTERVAL_MS
    )]
    IntervalOutOfRange(u64),

    #[error("No pending conflict at index {0}")]
    UnknownConflict(usize),

    #[error("Conflict at index {0} has no remote record to use")]
    NoRemoteRecord(usize),
}

/// Failure of the key-value backend.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error for key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Backend rejected write to '{0}'")]
    WriteRejected(String),
}

/// Failure talking to the remote record source.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Server returned status {0}")]
    Status(u16),

    #[error("Failed to decode server response: {0}")]
    Decode(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u128),
}

impl From<reqwest::Error> for NetworkError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            NetworkError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            NetworkError::Status(status.as_u16())
        } else {
            NetworkError::Http(e.to_string())
        }
    }
}

/// Cycle-level failure reported by `SyncEngine::run_cycle`.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Failed to fetch remote records: {0}")]
    Fetch(#[source] NetworkError),

    #[error("Failed to persist merged records: {0}")]
    Persistence(#[source] PersistenceError),
}

/// Union of everything an engine entry point can return.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}
