//! Shared test doubles for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use nexus_indexer::error::{SinkError, StorageError};
use nexus_indexer::storage::{FileRecord, FileStore, FileUpdate, StoredFile};
use nexus_indexer::{ChunkDocument, ChunkerConfig, IndexPipeline, SearchSink};

/// In-memory file store counting every call.
#[derive(Default)]
pub struct CountingStore {
    records: Mutex<HashMap<String, (i64, String)>>,
    next_id: AtomicUsize,
    pub queries: AtomicUsize,
    pub inserts: AtomicUsize,
    pub updates: AtomicUsize,
    /// Lookups for this path fail.
    pub fail_on: Mutex<Option<String>>,
}

impl CountingStore {
    pub fn writes(&self) -> usize {
        self.inserts.load(Ordering::SeqCst) + self.updates.load(Ordering::SeqCst)
    }

    pub fn hash_of(&self, path: &str) -> Option<String> {
        self.records.lock().get(path).map(|(_, h)| h.clone())
    }
}

impl FileStore for CountingStore {
    fn query_one(&self, path: &str) -> nexus_indexer::Result<Option<StoredFile>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.lock().as_deref() == Some(path) {
            return Err(StorageError::Database(format!("lookup of {path} failed")).into());
        }
        Ok(self
            .records
            .lock()
            .get(path)
            .map(|(id, hash)| StoredFile {
                id: *id,
                hash: hash.clone(),
            }))
    }

    fn insert(&self, record: &FileRecord) -> nexus_indexer::Result<i64> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        let id = i64::try_from(self.next_id.fetch_add(1, Ordering::SeqCst) + 1).unwrap();
        self.records
            .lock()
            .insert(record.path.clone(), (id, record.hash.clone()));
        Ok(id)
    }

    fn update(&self, id: i64, fields: &FileUpdate) -> nexus_indexer::Result<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock();
        for (record_id, hash) in records.values_mut() {
            if *record_id == id {
                hash.clone_from(&fields.hash);
            }
        }
        Ok(())
    }
}

/// Sink recording every submitted batch; can be told to reject or to stall.
#[derive(Default)]
pub struct RecordingSink {
    pub batches: Mutex<Vec<Vec<ChunkDocument>>>,
    pub purges: Mutex<Vec<i64>>,
    pub reject: AtomicBool,
    /// Milliseconds each submission takes.
    pub delay_ms: AtomicU64,
}

impl RecordingSink {
    pub fn submissions(&self) -> usize {
        self.batches.lock().len()
    }

    pub fn documents(&self) -> usize {
        self.batches.lock().iter().map(Vec::len).sum()
    }
}

#[async_trait]
impl SearchSink for RecordingSink {
    async fn index_chunks(&self, documents: Vec<ChunkDocument>) -> nexus_indexer::Result<()> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.reject.load(Ordering::SeqCst) {
            return Err(SinkError::SubmitFailed {
                documents: documents.len(),
                reason: "sink offline".to_string(),
            }
            .into());
        }
        self.batches.lock().push(documents);
        Ok(())
    }

    async fn delete_file_chunks(&self, file_id: i64) -> nexus_indexer::Result<()> {
        self.purges.lock().push(file_id);
        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<CountingStore>,
    pub sink: Arc<RecordingSink>,
    pub pipeline: Arc<IndexPipeline>,
}

/// Pipeline over fresh doubles.
pub fn harness(max_lines: usize, batch_size: usize) -> Harness {
    let store = Arc::new(CountingStore::default());
    let sink = Arc::new(RecordingSink::default());
    let pipeline = Arc::new(IndexPipeline::new(
        store.clone(),
        sink.clone(),
        ChunkerConfig::new(max_lines),
        batch_size,
    ));
    Harness {
        store,
        sink,
        pipeline,
    }
}

/// `n` numbered lines, newline-terminated.
pub fn lines(n: usize) -> String {
    (1..=n).map(|i| format!("line {i}\n")).collect()
}

pub fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Poll `check` every 20ms until it holds or `timeout` passes.
pub async fn wait_for(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
