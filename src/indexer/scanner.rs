//! Streaming scanner.
//!
//! The walk runs on the blocking pool and hands files over a channel of
//! capacity one; each file's callback is awaited before the next is taken,
//! so at most one file is in flight at any time.

use std::future::Future;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::Instrument;

use super::walk::{FileInfo, StopReason, TreeWalker, WalkEvent};
use crate::config::ScanConfig;
use crate::error::FileError;
use crate::Result;

/// Progress reported before each file is handed to the callback.
#[derive(Debug, Clone, Serialize)]
pub struct ScanProgress {
    pub current_path: String,
    /// Files handed to the callback so far, including this one.
    pub files_seen: usize,
    /// Rough resident estimate while this file is processed.
    pub estimated_memory_bytes: u64,
}

/// Result of a streaming scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanOutcome {
    /// Files whose callback completed without error.
    pub files_processed: usize,
    /// Oversized files.
    pub files_skipped: usize,
    pub error_count: usize,
    pub errors: Vec<FileError>,
    pub truncated: bool,
    pub stop_reason: StopReason,
}

/// Raw bytes, decoded text and chunk copies of the current file.
const RESIDENT_COPIES: u64 = 3;

/// Scan `config.root_path`, awaiting `on_file` for each eligible file.
///
/// `on_progress` failures are logged and ignored. `on_file` failures are
/// recorded in the outcome and the scan moves on.
///
/// # Errors
///
/// Returns `Error::Config` before any file is visited if the config is
/// invalid, or `Error::Internal` if the walk task dies.
pub async fn scan_with_progress<P, F, Fut>(
    config: &ScanConfig,
    mut on_progress: P,
    mut on_file: F,
) -> Result<ScanOutcome>
where
    P: FnMut(&ScanProgress) -> Result<()>,
    F: FnMut(FileInfo) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    config.validate()?;
    let walker = TreeWalker::new(config)?;

    let span = crate::observability::spans::scan_span(&config.root_path);
    async move {
        tracing::info!(max_files = config.max_files, "Starting scan");

        let (tx, mut rx) = mpsc::channel::<WalkEvent>(1);
        let walk = tokio::task::spawn_blocking(move || {
            for event in walker {
                if tx.blocking_send(event).is_err() {
                    tracing::warn!("Scan receiver closed during walk");
                    break;
                }
            }
        });

        let mut outcome = ScanOutcome::default();
        let mut files_seen = 0usize;

        while let Some(event) = rx.recv().await {
            match event {
                WalkEvent::File(info) => {
                    files_seen += 1;
                    let progress = ScanProgress {
                        current_path: info.rel_path.clone(),
                        files_seen,
                        estimated_memory_bytes: info.size.saturating_mul(RESIDENT_COPIES),
                    };
                    if let Err(e) = on_progress(&progress) {
                        tracing::warn!(path = %info.rel_path, error = %e, "Progress callback failed");
                    }

                    let rel_path = info.rel_path.clone();
                    match on_file(info).await {
                        Ok(()) => outcome.files_processed += 1,
                        Err(e) => {
                            tracing::warn!(path = %rel_path, error = %e, "Failed to process file");
                            outcome.error_count += 1;
                            outcome.errors.push(FileError::new(rel_path, e.to_string()));
                        }
                    }
                }
                WalkEvent::Oversized(info) => {
                    tracing::debug!(path = %info.rel_path, size = info.size, "Skipping oversized file");
                    outcome.files_skipped += 1;
                }
                WalkEvent::DepthExceeded(path) => {
                    tracing::debug!(path = %path.display(), "Skipping directory beyond max depth");
                }
                WalkEvent::Failed(err) => {
                    tracing::warn!(path = %err.path, error = %err.message, "Failed to read entry");
                    outcome.error_count += 1;
                    outcome.errors.push(err);
                }
                WalkEvent::LimitReached => {
                    tracing::info!(max_files = config.max_files, "File limit reached, stopping scan");
                    outcome.truncated = true;
                    outcome.stop_reason = StopReason::MaxFiles;
                }
            }
        }

        walk.await
            .map_err(|e| crate::Error::internal(format!("Scan task failed: {e}")))?;

        tracing::info!(
            processed = outcome.files_processed,
            skipped = outcome.files_skipped,
            errors = outcome.error_count,
            truncated = outcome.truncated,
            "Scan complete"
        );

        Ok(outcome)
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_scan_visits_every_file_once() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("src")).unwrap();
        fs::write(tmp.path().join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(tmp.path().join("src/lib.rs"), "pub fn hello() {}").unwrap();
        fs::write(tmp.path().join("README.md"), "# Readme").unwrap();

        let mut seen = Vec::new();
        let outcome = scan_with_progress(
            &ScanConfig::new(tmp.path()),
            |_| Ok(()),
            |info| {
                seen.push(info.rel_path);
                async { Ok(()) }
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome.files_processed, 3);
        assert_eq!(seen, vec!["README.md", "src/lib.rs", "src/main.rs"]);
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn test_file_failure_is_isolated() {
        let tmp = TempDir::new().unwrap();
        for name in ["a.rs", "b.rs", "c.rs"] {
            fs::write(tmp.path().join(name), name).unwrap();
        }

        let outcome = scan_with_progress(
            &ScanConfig::new(tmp.path()),
            |_| Ok(()),
            |info| async move {
                if info.rel_path == "b.rs" {
                    Err(crate::Error::internal("boom"))
                } else {
                    Ok(())
                }
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome.files_processed, 2);
        assert_eq!(outcome.error_count, 1);
        assert_eq!(outcome.errors[0].path, "b.rs");
        assert!(outcome.errors[0].message.contains("boom"));
    }

    #[tokio::test]
    async fn test_progress_failure_does_not_abort() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.rs"), "a").unwrap();
        fs::write(tmp.path().join("b.rs"), "b").unwrap();

        let mut progress_calls = 0;
        let outcome = scan_with_progress(
            &ScanConfig::new(tmp.path()),
            |p| {
                progress_calls += 1;
                assert!(p.estimated_memory_bytes > 0);
                Err(crate::Error::internal("progress sink down"))
            },
            |_| async { Ok(()) },
        )
        .await
        .unwrap();

        assert_eq!(progress_calls, 2);
        assert_eq!(outcome.files_processed, 2);
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_counted_as_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("big.txt"), "x".repeat(200)).unwrap();
        fs::write(tmp.path().join("small.txt"), "x").unwrap();

        let mut config = ScanConfig::new(tmp.path());
        config.max_file_size = 100;

        let outcome = scan_with_progress(&config, |_| Ok(()), |_| async { Ok(()) })
            .await
            .unwrap();

        assert_eq!(outcome.files_processed, 1);
        assert_eq!(outcome.files_skipped, 1);
        assert_eq!(outcome.error_count, 0);
    }

    #[tokio::test]
    async fn test_max_files_truncates() {
        let tmp = TempDir::new().unwrap();
        for i in 0..6 {
            fs::write(tmp.path().join(format!("f{i}.txt")), "x").unwrap();
        }

        let mut config = ScanConfig::new(tmp.path());
        config.max_files = 4;

        let outcome = scan_with_progress(&config, |_| Ok(()), |_| async { Ok(()) })
            .await
            .unwrap();

        assert_eq!(outcome.files_processed, 4);
        assert!(outcome.truncated);
        assert_eq!(outcome.stop_reason, StopReason::MaxFiles);
    }

    #[tokio::test]
    async fn test_invalid_config_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let mut config = ScanConfig::new(tmp.path());
        config.max_files = 0;

        let mut called = false;
        let err = scan_with_progress(&config, |_| Ok(()), |_| {
            called = true;
            async { Ok(()) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, crate::Error::Config(_)));
        assert!(!called);
    }
}
