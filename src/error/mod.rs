//! Error types and Result aliases for the indexer.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.
//!
//! Failures that belong to a single file never travel through `?` past the
//! file boundary: they are captured as [`FileError`] records and reported in
//! the run summary instead.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for indexer operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (invalid caps, unreachable root).
    #[error("configuration error: {0}")]
    Config(String),

    /// File record storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Search sink error.
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// Directory watcher error.
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// `SQLite` database error.
    #[error("database error: {0}")]
    Database(String),

    /// Record not found.
    #[error("not found: {entity} with id '{id}'")]
    NotFound { entity: &'static str, id: String },

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),
}

/// Search sink errors.
#[derive(Error, Debug)]
pub enum SinkError {
    /// A batch submission was rejected.
    #[error("failed to submit {documents} chunk documents: {reason}")]
    SubmitFailed { documents: usize, reason: String },

    /// Purging a file's previous documents failed.
    #[error("failed to purge chunks of file {file_id}: {reason}")]
    PurgeFailed { file_id: i64, reason: String },
}

/// Directory watcher errors.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to subscribe to a path.
    #[error("failed to watch path '{path}': {reason}")]
    WatchFailed { path: String, reason: String },

    /// Operation is not allowed in the watcher's current state.
    #[error("cannot {operation} watcher while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// Another watcher is already active in this process.
    #[error("a directory watcher is already active")]
    AlreadyActive,

    /// The event loop went away unexpectedly.
    #[error("watcher event loop terminated: {0}")]
    LoopTerminated(String),
}

/// A failure isolated to one file, recorded in run summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    /// Path relative to the scan root.
    pub path: String,
    /// Human-readable failure message.
    pub message: String,
}

impl FileError {
    /// Create a new per-file error record.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl StorageError {
    /// Create a not-found error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl WatcherError {
    /// Create an invalid-state error.
    #[must_use]
    pub const fn invalid_state(operation: &'static str, state: &'static str) -> Self {
        Self::InvalidState { operation, state }
    }
}

#[cfg(test)]
mod tests;
