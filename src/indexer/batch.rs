//! Micro-batch buffering in front of the search sink.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::sink::{ChunkDocument, SearchSink};

/// A flush that the sink rejected.
///
/// The buffer is cleared either way; the failure names every file whose
/// documents were in it so the caller can report and invalidate them.
#[derive(Debug)]
pub struct FlushFailure {
    /// `(file_id, path)` of every file with documents in the failed batch.
    pub files: Vec<(i64, String)>,
    pub documents: usize,
    pub error: crate::Error,
}

/// Buffers chunk documents and submits them to the sink in fixed-size calls.
pub struct MicroBatcher {
    sink: Arc<dyn SearchSink>,
    batch_size: usize,
    buffer: Vec<ChunkDocument>,
    batches_flushed: u64,
    documents_flushed: u64,
}

impl MicroBatcher {
    /// Create a batcher with the given threshold (at least 1).
    #[must_use]
    pub fn new(sink: Arc<dyn SearchSink>, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            sink,
            batch_size,
            buffer: Vec::with_capacity(batch_size),
            batches_flushed: 0,
            documents_flushed: 0,
        }
    }

    /// Buffer one document, flushing when the threshold is reached.
    ///
    /// # Errors
    ///
    /// Returns the [`FlushFailure`] if a triggered flush was rejected.
    pub async fn push(&mut self, document: ChunkDocument) -> Result<usize, FlushFailure> {
        self.buffer.push(document);
        if self.buffer.len() >= self.batch_size {
            return self.flush().await;
        }
        Ok(0)
    }

    /// Submit everything buffered as one call. An empty buffer is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the [`FlushFailure`] if the sink rejected the batch.
    pub async fn flush(&mut self) -> Result<usize, FlushFailure> {
        if self.buffer.is_empty() {
            return Ok(0);
        }

        let batch = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.batch_size));
        let count = batch.len();
        let files = files_in(&batch);

        match self.sink.index_chunks(batch).await {
            Ok(()) => {
                self.batches_flushed += 1;
                self.documents_flushed += count as u64;
                tracing::debug!(documents = count, files = files.len(), "Flushed micro-batch");
                Ok(count)
            }
            Err(error) => {
                tracing::error!(documents = count, files = files.len(), error = %error, "Micro-batch flush failed");
                Err(FlushFailure {
                    files,
                    documents: count,
                    error,
                })
            }
        }
    }

    /// Whether documents of `file_id` are waiting in the buffer.
    #[must_use]
    pub fn holds_file(&self, file_id: i64) -> bool {
        self.buffer.iter().any(|d| d.file_id == file_id)
    }

    /// Documents currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Successful sink calls so far.
    #[must_use]
    pub const fn batches_flushed(&self) -> u64 {
        self.batches_flushed
    }

    /// Documents accepted by the sink so far.
    #[must_use]
    pub const fn documents_flushed(&self) -> u64 {
        self.documents_flushed
    }
}

fn files_in(batch: &[ChunkDocument]) -> Vec<(i64, String)> {
    let mut files = BTreeMap::new();
    for doc in batch {
        files.entry(doc.file_id).or_insert_with(|| doc.path.clone());
    }
    files.into_iter().collect()
}
