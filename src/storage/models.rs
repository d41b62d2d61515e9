//! Data models for storage operations.
//!
//! This module defines the records exchanged with the storage collaborator:
//! - File records keyed by unique path
//! - The minimal lookup view used for change detection
//! - Aggregate index statistics

use serde::{Deserialize, Serialize};

/// Get current Unix timestamp in milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Lookup view of a persisted file record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    /// Database primary key.
    pub id: i64,
    /// Content hash recorded at the last successful index.
    pub hash: String,
}

/// A file record as inserted on first successful index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path relative to the scan root (unique key).
    pub path: String,

    /// Content hash.
    pub hash: String,

    /// Modification time in Unix milliseconds.
    pub mtime: i64,

    /// Size in bytes.
    pub size: i64,

    /// Detected language tag.
    pub lang: Option<String>,

    /// Unix milliseconds when the file was indexed.
    pub indexed_at: i64,
}

impl FileRecord {
    /// Create a new file record stamped with the current time.
    #[must_use]
    pub fn new(path: impl Into<String>, hash: impl Into<String>, mtime: i64, size: i64) -> Self {
        Self {
            path: path.into(),
            hash: hash.into(),
            mtime,
            size,
            lang: None,
            indexed_at: now_millis(),
        }
    }

    /// Set the language tag.
    #[must_use]
    pub fn with_lang(mut self, lang: Option<impl Into<String>>) -> Self {
        self.lang = lang.map(Into::into);
        self
    }
}

/// Fields rewritten when a file's content hash changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUpdate {
    pub hash: String,
    pub mtime: i64,
    pub size: i64,
    pub indexed_at: i64,
}

impl FileUpdate {
    /// Fields marking a record as never successfully indexed.
    ///
    /// An empty hash never matches real content, so the next scan reindexes.
    #[must_use]
    pub const fn invalidated() -> Self {
        Self {
            hash: String::new(),
            mtime: 0,
            size: 0,
            indexed_at: 0,
        }
    }
}

/// Aggregate counts over the index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of file records.
    pub files: i64,
    /// Number of chunk documents.
    pub chunks: i64,
    /// Top languages by file count, most common first.
    pub languages: Vec<(String, i64)>,
}
