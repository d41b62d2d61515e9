//! Per-file hash → chunk → index pipeline.
//!
//! Shared by the scan run and the directory watcher. Files are processed one
//! at a time; the micro-batch buffer lives behind an async mutex so a flush
//! in flight finishes before the next file touches it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::Instrument;

use super::batch::{FlushFailure, MicroBatcher};
use super::chunker::Chunker;
use super::hasher::{detect_change, hash_content, looks_binary, ChangeDecision};
use super::language::detect_language;
use super::walk::FileInfo;
use crate::config::ChunkerConfig;
use crate::error::FileError;
use crate::sink::{ChunkDocument, SearchSink};
use crate::storage::{now_millis, FileRecord, FileStore, FileUpdate};
use crate::Result;

/// What processing one file did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum FileOutcome {
    /// First index: record inserted, chunks buffered.
    Created { file_id: i64, chunks: usize },
    /// Hash changed: record updated, old chunks purged, new ones buffered.
    Updated { file_id: i64, chunks: usize },
    /// Hash matched: nothing written.
    Unchanged { file_id: i64 },
    /// NUL byte in the first 8 KiB.
    Binary,
    /// Gone before it could be read.
    Missing,
    /// Larger than the size cap when it changed.
    Oversized,
}

/// Running counters for a pipeline.
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub files_created: AtomicU64,
    pub files_updated: AtomicU64,
    pub files_unchanged: AtomicU64,
    pub files_skipped: AtomicU64,
    pub chunks_buffered: AtomicU64,
    pub flush_failures: AtomicU64,
}

impl PipelineStats {
    /// Get a snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            files_created: self.files_created.load(Ordering::Relaxed),
            files_updated: self.files_updated.load(Ordering::Relaxed),
            files_unchanged: self.files_unchanged.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            chunks_buffered: self.chunks_buffered.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of pipeline stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStatsSnapshot {
    pub files_created: u64,
    pub files_updated: u64,
    pub files_unchanged: u64,
    pub files_skipped: u64,
    pub chunks_buffered: u64,
    pub flush_failures: u64,
}

impl PipelineStatsSnapshot {
    /// Files inserted or updated.
    #[must_use]
    pub const fn files_indexed(&self) -> u64 {
        self.files_created + self.files_updated
    }
}

/// Indexing pipeline bound to a file store and a search sink.
pub struct IndexPipeline {
    store: Arc<dyn FileStore>,
    sink: Arc<dyn SearchSink>,
    chunker: Chunker,
    batcher: tokio::sync::Mutex<MicroBatcher>,
    stats: PipelineStats,
    failures: Mutex<Vec<FileError>>,
}

impl IndexPipeline {
    /// Create a pipeline flushing every `batch_size` chunk documents.
    #[must_use]
    pub fn new(
        store: Arc<dyn FileStore>,
        sink: Arc<dyn SearchSink>,
        chunker: ChunkerConfig,
        batch_size: usize,
    ) -> Self {
        let batcher = MicroBatcher::new(Arc::clone(&sink), batch_size);
        Self {
            store,
            sink,
            chunker: Chunker::new(chunker),
            batcher: tokio::sync::Mutex::new(batcher),
            stats: PipelineStats::default(),
            failures: Mutex::new(Vec::new()),
        }
    }

    /// Hash, compare, chunk and buffer one file.
    ///
    /// Buffered documents reach the sink at the batch threshold or on
    /// [`flush`](Self::flush). A rejected flush is recorded for
    /// [`take_flush_failures`](Self::take_flush_failures) and does not fail
    /// this call.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, or the store or the
    /// stale-chunk purge fails.
    pub async fn process_file(&self, info: &FileInfo) -> Result<FileOutcome> {
        let span = crate::observability::spans::file_span(&info.rel_path);
        self.process_inner(info).instrument(span).await
    }

    async fn process_inner(&self, info: &FileInfo) -> Result<FileOutcome> {
        let bytes = match tokio::fs::read(&info.full_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("File no longer exists");
                self.stats.files_skipped.fetch_add(1, Ordering::Relaxed);
                return Ok(FileOutcome::Missing);
            }
            Err(e) => return Err(e.into()),
        };

        if looks_binary(&bytes) {
            tracing::debug!("Skipping binary file");
            self.stats.files_skipped.fetch_add(1, Ordering::Relaxed);
            return Ok(FileOutcome::Binary);
        }

        let hash = hash_content(&bytes);
        let existing = self.store.query_one(&info.rel_path)?;
        let lang = detect_language(&info.full_path);
        let size = i64::try_from(bytes.len()).unwrap_or(i64::MAX);
        let now = now_millis();

        let (file_id, created) = match detect_change(existing.as_ref(), &hash) {
            ChangeDecision::Unchanged { file_id } => {
                tracing::debug!(file_id, "File unchanged");
                self.stats.files_unchanged.fetch_add(1, Ordering::Relaxed);
                return Ok(FileOutcome::Unchanged { file_id });
            }
            ChangeDecision::New => {
                let record = FileRecord {
                    indexed_at: now,
                    ..FileRecord::new(info.rel_path.clone(), hash, info.mtime_ms, size)
                        .with_lang(lang)
                };
                (self.store.insert(&record)?, true)
            }
            ChangeDecision::Changed { file_id } => {
                self.purge_stale(file_id).await?;
                let fields = FileUpdate {
                    hash,
                    mtime: info.mtime_ms,
                    size,
                    indexed_at: now,
                };
                self.store.update(file_id, &fields)?;
                (file_id, false)
            }
        };

        let content = String::from_utf8_lossy(&bytes);
        let chunks = self.chunker.chunk_content(&content, lang);
        let count = chunks.len();

        {
            let mut batcher = self.batcher.lock().await;
            for chunk in chunks {
                let doc = ChunkDocument::new(
                    file_id,
                    info.rel_path.clone(),
                    lang.map(String::from),
                    chunk,
                    now,
                );
                if let Err(failure) = batcher.push(doc).await {
                    self.record_failure(failure);
                }
            }
        }

        self.stats
            .chunks_buffered
            .fetch_add(count as u64, Ordering::Relaxed);

        if created {
            tracing::debug!(file_id, chunks = count, "Indexed new file");
            self.stats.files_created.fetch_add(1, Ordering::Relaxed);
            Ok(FileOutcome::Created { file_id, chunks: count })
        } else {
            tracing::debug!(file_id, chunks = count, "Reindexed changed file");
            self.stats.files_updated.fetch_add(1, Ordering::Relaxed);
            Ok(FileOutcome::Updated { file_id, chunks: count })
        }
    }

    /// Drop a changed file's previous documents before resubmitting.
    async fn purge_stale(&self, file_id: i64) -> Result<()> {
        let mut batcher = self.batcher.lock().await;
        if batcher.holds_file(file_id) {
            if let Err(failure) = batcher.flush().await {
                self.record_failure(failure);
            }
        }
        self.sink.delete_file_chunks(file_id).await
    }

    /// Submit whatever is buffered. Returns the number of documents sent.
    pub async fn flush(&self) -> usize {
        let mut batcher = self.batcher.lock().await;
        match batcher.flush().await {
            Ok(count) => count,
            Err(failure) => {
                self.record_failure(failure);
                0
            }
        }
    }

    /// Drain the per-file errors recorded for rejected flushes.
    pub fn take_flush_failures(&self) -> Vec<FileError> {
        std::mem::take(&mut *self.failures.lock())
    }

    /// Successful sink submissions so far.
    pub async fn batches_flushed(&self) -> u64 {
        self.batcher.lock().await.batches_flushed()
    }

    /// Documents the sink has accepted.
    pub async fn documents_flushed(&self) -> u64 {
        self.batcher.lock().await.documents_flushed()
    }

    /// Get a snapshot of pipeline counters.
    #[must_use]
    pub fn stats(&self) -> PipelineStatsSnapshot {
        self.stats.snapshot()
    }

    /// Report the failure per file and clear the stored hash of each, so the
    /// next scan indexes it again instead of skipping it as unchanged.
    fn record_failure(&self, failure: FlushFailure) {
        self.stats.flush_failures.fetch_add(1, Ordering::Relaxed);
        let message = format!(
            "flush of {} chunk documents failed: {}",
            failure.documents, failure.error
        );

        let mut failures = self.failures.lock();
        for (file_id, path) in failure.files {
            if let Err(e) = self.store.update(file_id, &FileUpdate::invalidated()) {
                tracing::error!(path = %path, error = %e, "Failed to invalidate file record");
            }
            failures.push(FileError::new(path, message.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use crate::storage::{init_storage, Database, SqliteChunkSink};
    use std::fs;
    use tempfile::TempDir;

    fn lines(n: usize) -> String {
        (1..=n).map(|i| format!("line {i}\n")).collect()
    }

    fn setup(batch_size: usize) -> (Database, Arc<MemorySink>, IndexPipeline) {
        let db = Database::open_in_memory().unwrap();
        init_storage(&db).unwrap();
        let sink = Arc::new(MemorySink::new());
        let pipeline = IndexPipeline::new(
            Arc::new(db.clone()),
            sink.clone(),
            ChunkerConfig::new(30),
            batch_size,
        );
        (db, sink, pipeline)
    }

    fn info(tmp: &TempDir, name: &str) -> FileInfo {
        FileInfo::from_path(tmp.path(), &tmp.path().join(name)).unwrap()
    }

    #[tokio::test]
    async fn test_new_then_unchanged() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.rs"), lines(40)).unwrap();
        let (_db, sink, pipeline) = setup(10);

        let first = pipeline.process_file(&info(&tmp, "a.rs")).await.unwrap();
        assert!(matches!(first, FileOutcome::Created { chunks: 2, .. }));
        assert_eq!(pipeline.flush().await, 2);
        assert_eq!(sink.len(), 2);
        assert_eq!(pipeline.batches_flushed().await, 1);

        let second = pipeline.process_file(&info(&tmp, "a.rs")).await.unwrap();
        assert!(matches!(second, FileOutcome::Unchanged { .. }));
        assert_eq!(pipeline.flush().await, 0);
        assert_eq!(sink.submissions(), 1);
    }

    #[tokio::test]
    async fn test_changed_file_replaces_chunks() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.rs"), lines(40)).unwrap();
        let (_db, sink, pipeline) = setup(10);

        let FileOutcome::Created { file_id, .. } =
            pipeline.process_file(&info(&tmp, "a.rs")).await.unwrap()
        else {
            panic!("expected a new file");
        };
        pipeline.flush().await;

        fs::write(tmp.path().join("a.rs"), lines(5)).unwrap();
        let outcome = pipeline.process_file(&info(&tmp, "a.rs")).await.unwrap();
        assert_eq!(outcome, FileOutcome::Updated { file_id, chunks: 1 });
        pipeline.flush().await;

        let docs = sink.documents_for(file_id);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].chunk.end_line, 5);
    }

    #[tokio::test]
    async fn test_binary_and_missing_are_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("blob.dat"), b"\x7fELF\0\0\0").unwrap();
        let (_db, sink, pipeline) = setup(10);

        let outcome = pipeline.process_file(&info(&tmp, "blob.dat")).await.unwrap();
        assert_eq!(outcome, FileOutcome::Binary);

        let gone = FileInfo {
            full_path: tmp.path().join("gone.rs"),
            rel_path: "gone.rs".to_string(),
            size: 0,
            mtime_ms: 0,
        };
        assert_eq!(pipeline.process_file(&gone).await.unwrap(), FileOutcome::Missing);

        pipeline.flush().await;
        assert!(sink.is_empty());
        assert_eq!(pipeline.stats().files_skipped, 2);
    }

    #[tokio::test]
    async fn test_empty_file_has_record_but_no_chunks() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("empty.rs"), "").unwrap();
        let (db, sink, pipeline) = setup(10);

        let outcome = pipeline.process_file(&info(&tmp, "empty.rs")).await.unwrap();
        assert!(matches!(outcome, FileOutcome::Created { chunks: 0, .. }));
        pipeline.flush().await;

        assert!(sink.is_empty());
        assert!(db.query_one("empty.rs").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sqlite_sink_end_to_end() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("lib.rs"), "pub fn run() {}\n").unwrap();

        let db = Database::open_in_memory().unwrap();
        init_storage(&db).unwrap();
        let pipeline = IndexPipeline::new(
            Arc::new(db.clone()),
            Arc::new(SqliteChunkSink::new(db.clone())),
            ChunkerConfig::default(),
            10,
        );

        pipeline.process_file(&info(&tmp, "lib.rs")).await.unwrap();
        pipeline.flush().await;

        let stats = db.with_conn(crate::storage::index_stats).unwrap();
        assert_eq!(stats.files, 1);
        assert_eq!(stats.chunks, 1);
    }
}
