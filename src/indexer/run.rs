//! One full index run: scan, per-file pipeline, final flush.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use super::pipeline::IndexPipeline;
use super::scanner::{scan_with_progress, ScanProgress};
use super::walk::StopReason;
use crate::config::ScanConfig;
use crate::error::FileError;
use crate::Result;

/// Outcome of an index run, printed as JSON by the CLI.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Files handed to the pipeline without error.
    pub files_processed: usize,
    /// Files inserted or updated.
    pub files_indexed: u64,
    pub files_unchanged: u64,
    /// Oversized, binary or vanished files.
    pub files_skipped: u64,
    /// Documents accepted by the sink.
    pub chunks_submitted: u64,
    /// Sink calls that succeeded.
    pub batches_submitted: u64,
    pub error_count: usize,
    pub errors: Vec<FileError>,
    pub truncated: bool,
    pub stop_reason: StopReason,
    pub duration_ms: u64,
}

/// Index every eligible file under `config.root_path` through `pipeline`.
///
/// Ends with a final flush so no buffered document is left behind.
///
/// # Errors
///
/// Returns `Error::Config` before scanning if the config is invalid.
/// Per-file and flush failures are reported in the summary instead.
pub async fn index_tree<P>(
    config: &ScanConfig,
    pipeline: Arc<IndexPipeline>,
    on_progress: P,
) -> Result<RunSummary>
where
    P: FnMut(&ScanProgress) -> Result<()>,
{
    let start = Instant::now();
    let before = pipeline.stats();
    let flushed_before = pipeline.documents_flushed().await;
    let batches_before = pipeline.batches_flushed().await;

    let outcome = scan_with_progress(config, on_progress, |info| {
        let pipeline = Arc::clone(&pipeline);
        async move { pipeline.process_file(&info).await.map(|_| ()) }
    })
    .await?;

    pipeline.flush().await;

    let after = pipeline.stats();
    let flushed_after = pipeline.documents_flushed().await;
    let batches_after = pipeline.batches_flushed().await;

    let mut errors = outcome.errors;
    errors.extend(pipeline.take_flush_failures());

    let summary = RunSummary {
        files_processed: outcome.files_processed,
        files_indexed: after.files_indexed() - before.files_indexed(),
        files_unchanged: after.files_unchanged - before.files_unchanged,
        files_skipped: (after.files_skipped - before.files_skipped)
            + outcome.files_skipped as u64,
        chunks_submitted: flushed_after - flushed_before,
        batches_submitted: batches_after - batches_before,
        error_count: errors.len(),
        errors,
        truncated: outcome.truncated,
        stop_reason: outcome.stop_reason,
        duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
    };

    tracing::info!(
        indexed = summary.files_indexed,
        unchanged = summary.files_unchanged,
        chunks = summary.chunks_submitted,
        batches = summary.batches_submitted,
        errors = summary.error_count,
        duration_ms = summary.duration_ms,
        "Index run complete"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkerConfig;
    use crate::sink::MemorySink;
    use crate::storage::{init_storage, Database};
    use std::fs;
    use tempfile::TempDir;

    fn pipeline(db: &Database, sink: Arc<MemorySink>) -> Arc<IndexPipeline> {
        Arc::new(IndexPipeline::new(
            Arc::new(db.clone()),
            sink,
            ChunkerConfig::new(30),
            10,
        ))
    }

    #[tokio::test]
    async fn test_index_tree_summary() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.py"), "def a():\n    pass\n").unwrap();
        fs::write(tmp.path().join("blob.dat"), b"\0\0").unwrap();

        let db = Database::open_in_memory().unwrap();
        init_storage(&db).unwrap();
        let sink = Arc::new(MemorySink::new());

        let config = ScanConfig::new(tmp.path());
        let summary = index_tree(&config, pipeline(&db, sink.clone()), |_| Ok(()))
            .await
            .unwrap();

        assert_eq!(summary.files_processed, 2);
        assert_eq!(summary.files_indexed, 1);
        assert_eq!(summary.files_skipped, 1);
        assert_eq!(summary.chunks_submitted, 1);
        assert_eq!(summary.batches_submitted, 1);
        assert_eq!(summary.error_count, 0);
        assert!(!summary.truncated);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_summary_serializes() {
        let summary = RunSummary {
            errors: vec![FileError::new("bad.rs", "denied")],
            error_count: 1,
            ..Default::default()
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["error_count"], 1);
        assert_eq!(json["errors"][0]["path"], "bad.rs");
        assert_eq!(json["stop_reason"], "completed");
    }
}
