//! Search sink collaborator.
//!
//! The pipeline hands chunk documents to a [`SearchSink`] in micro-batches.
//! Sinks are expected to upsert by document id, so resubmitting a file's
//! chunks overwrites rather than duplicates.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::indexer::Chunk;
use crate::Result;

/// A chunk bound to its file, ready for the search sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDocument {
    /// Derived from `(file_id, start_line, end_line)` only.
    pub id: String,
    pub file_id: i64,
    /// Path relative to the scan root.
    pub path: String,
    pub lang: Option<String>,
    /// Unix milliseconds.
    pub indexed_at: i64,
    #[serde(flatten)]
    pub chunk: Chunk,
}

impl ChunkDocument {
    /// Bind `chunk` to its file.
    #[must_use]
    pub fn new(
        file_id: i64,
        path: impl Into<String>,
        lang: Option<String>,
        chunk: Chunk,
        indexed_at: i64,
    ) -> Self {
        Self {
            id: document_id(file_id, chunk.start_line, chunk.end_line),
            file_id,
            path: path.into(),
            lang,
            indexed_at,
            chunk,
        }
    }
}

/// Deterministic document id; independent of content.
#[must_use]
pub fn document_id(file_id: i64, start_line: usize, end_line: usize) -> String {
    format!("{file_id}:{start_line}-{end_line}")
}

/// Destination for chunk documents.
#[async_trait]
pub trait SearchSink: Send + Sync {
    /// Submit one batch. Must behave as an upsert keyed by document id.
    async fn index_chunks(&self, documents: Vec<ChunkDocument>) -> Result<()>;

    /// Drop every document previously submitted for `file_id`.
    async fn delete_file_chunks(&self, _file_id: i64) -> Result<()> {
        Ok(())
    }
}

/// In-process sink keeping documents in a map.
#[derive(Debug, Default)]
pub struct MemorySink {
    documents: Mutex<BTreeMap<String, ChunkDocument>>,
    submissions: AtomicU64,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }

    /// Whether no documents are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.lock().is_empty()
    }

    /// Number of `index_chunks` calls received.
    #[must_use]
    pub fn submissions(&self) -> u64 {
        self.submissions.load(Ordering::Relaxed)
    }

    /// Documents of one file, ordered by id.
    #[must_use]
    pub fn documents_for(&self, file_id: i64) -> Vec<ChunkDocument> {
        self.documents
            .lock()
            .values()
            .filter(|d| d.file_id == file_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SearchSink for MemorySink {
    async fn index_chunks(&self, documents: Vec<ChunkDocument>) -> Result<()> {
        self.submissions.fetch_add(1, Ordering::Relaxed);
        let mut stored = self.documents.lock();
        for doc in documents {
            stored.insert(doc.id.clone(), doc);
        }
        Ok(())
    }

    async fn delete_file_chunks(&self, file_id: i64) -> Result<()> {
        self.documents.lock().retain(|_, d| d.file_id != file_id);
        Ok(())
    }
}
