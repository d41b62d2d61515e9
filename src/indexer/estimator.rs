//! Read-only capacity estimate ("dry run").
//!
//! Walks the tree under the same caps as a real scan and projects the
//! number of files, bytes and chunks an index run would produce. Only
//! line counting touches file contents, through a fixed-size buffer.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Serialize;

use super::hasher::BINARY_SNIFF_LEN;
use super::walk::{StopReason, TreeWalker, WalkEvent};
use crate::config::{ChunkerConfig, ScanConfig};
use crate::Result;

/// File count above which the dry run warns the operator.
pub const WARN_FILE_COUNT: usize = 5_000;

/// Projected peak memory (MB) above which the dry run warns the operator.
pub const WARN_PEAK_MEMORY_MB: f64 = 512.0;

/// Fixed process overhead assumed by the memory projection.
const BASELINE_MEMORY_MB: f64 = 16.0;

/// Resident copies of a file while it is processed: raw bytes, decoded text, chunks.
const RESIDENT_COPIES: f64 = 3.0;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Projection of an index run; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DryRunResult {
    pub total_files: usize,
    pub total_size: u64,
    pub estimated_chunks: usize,
    /// Size-based heuristic, not measured resident memory.
    pub peak_memory_mb: f64,
    pub truncated: bool,
    pub stop_reason: StopReason,
    /// Oversized, binary and unreadable files.
    pub skipped_files: usize,
    pub largest_file: Option<String>,
    pub warnings: Vec<String>,
}

/// Estimate what indexing `config.root_path` would cost.
///
/// # Errors
///
/// Returns `Error::Config` if the scan or chunker config is invalid.
pub fn dry_run(config: &ScanConfig, chunker: ChunkerConfig) -> Result<DryRunResult> {
    config.validate()?;
    chunker.validate()?;

    let _span = crate::observability::spans::scan_span(&config.root_path).entered();
    tracing::info!(max_files = config.max_files, "Starting dry run");

    let mut result = DryRunResult::default();
    let mut largest: u64 = 0;

    for event in TreeWalker::new(config)? {
        match event {
            WalkEvent::File(info) => {
                let Ok(Some(lines)) = count_lines(&info.full_path) else {
                    tracing::debug!(path = %info.rel_path, "Skipping unreadable or binary file");
                    result.skipped_files += 1;
                    continue;
                };

                result.total_files += 1;
                result.total_size += info.size;
                result.estimated_chunks += lines.div_ceil(chunker.max_lines);

                if info.size > largest || result.largest_file.is_none() {
                    largest = info.size;
                    result.largest_file = Some(info.rel_path);
                }
            }
            WalkEvent::Oversized(info) => {
                tracing::debug!(path = %info.rel_path, size = info.size, "Skipping oversized file");
                result.skipped_files += 1;
            }
            WalkEvent::Failed(err) => {
                tracing::debug!(path = %err.path, error = %err.message, "Skipping unreadable entry");
                result.skipped_files += 1;
            }
            WalkEvent::DepthExceeded(path) => {
                tracing::debug!(path = %path.display(), "Directory exceeds max depth");
                result.truncated = true;
                result.stop_reason = StopReason::MaxDepth;
            }
            WalkEvent::LimitReached => {
                result.truncated = true;
                result.stop_reason = StopReason::MaxFiles;
                break;
            }
        }
    }

    result.peak_memory_mb = estimate_peak_memory_mb(largest);
    result.warnings = warnings_for(&result, config);

    tracing::info!(
        files = result.total_files,
        bytes = result.total_size,
        chunks = result.estimated_chunks,
        truncated = result.truncated,
        "Dry run complete"
    );

    Ok(result)
}

/// Async version of [`dry_run`], run on the blocking pool.
///
/// # Errors
///
/// Same as [`dry_run`], plus `Error::Internal` if the task panics.
pub async fn dry_run_async(config: ScanConfig, chunker: ChunkerConfig) -> Result<DryRunResult> {
    tokio::task::spawn_blocking(move || dry_run(&config, chunker))
        .await
        .map_err(|e| crate::Error::internal(format!("Dry run task failed: {e}")))?
}

/// Count lines the way the chunker sees them.
///
/// Returns `Ok(None)` for binary content.
fn count_lines(path: &Path) -> std::io::Result<Option<usize>> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut newlines = 0usize;
    let mut seen = 0usize;
    let mut last = None;

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        let chunk = &buf[..n];

        if seen < BINARY_SNIFF_LEN {
            let sniff = (BINARY_SNIFF_LEN - seen).min(n);
            if chunk[..sniff].contains(&0) {
                return Ok(None);
            }
        }

        seen += n;
        newlines += chunk.iter().filter(|&&b| b == b'\n').count();
        last = chunk.last().copied();
    }

    Ok(Some(match last {
        None => 0,
        Some(b'\n') => newlines,
        Some(_) => newlines + 1,
    }))
}

#[allow(clippy::cast_precision_loss)]
fn estimate_peak_memory_mb(largest_file: u64) -> f64 {
    BASELINE_MEMORY_MB + (largest_file as f64 * RESIDENT_COPIES) / BYTES_PER_MB
}

fn warnings_for(result: &DryRunResult, config: &ScanConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if result.total_files > WARN_FILE_COUNT {
        warnings.push(format!(
            "{} files would be indexed; consider narrowing the root or adding ignore patterns",
            result.total_files
        ));
    }

    if result.peak_memory_mb > WARN_PEAK_MEMORY_MB {
        warnings.push(format!(
            "projected peak memory {:.0} MB exceeds {WARN_PEAK_MEMORY_MB:.0} MB",
            result.peak_memory_mb
        ));
    }

    match result.stop_reason {
        StopReason::MaxFiles => warnings.push(format!(
            "enumeration stopped at max_files = {}; results are truncated",
            config.max_files
        )),
        StopReason::MaxDepth => warnings.push(format!(
            "directories deeper than max_depth = {} were not entered",
            config.max_depth
        )),
        StopReason::Completed => {}
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn lines(n: usize) -> String {
        (1..=n).map(|i| format!("line {i}\n")).collect()
    }

    #[test]
    fn test_count_lines_matches_str_lines() {
        let tmp = TempDir::new().unwrap();
        for content in ["", "a", "a\n", "a\nb", "a\nb\n", "\n\n", "x\r\ny\r\n"] {
            let path = tmp.path().join("f.txt");
            fs::write(&path, content).unwrap();
            assert_eq!(
                count_lines(&path).unwrap(),
                Some(content.lines().count()),
                "content {content:?}"
            );
        }
    }

    #[test]
    fn test_count_lines_detects_binary() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("blob.dat");
        fs::write(&path, b"abc\0def").unwrap();
        assert_eq!(count_lines(&path).unwrap(), None);
    }

    #[test]
    fn test_dry_run_estimates_chunks() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.rs"), lines(10)).unwrap();
        fs::write(tmp.path().join("b.rs"), lines(40)).unwrap();
        fs::write(tmp.path().join("c.rs"), lines(5)).unwrap();

        let result = dry_run(&ScanConfig::new(tmp.path()), ChunkerConfig::new(30)).unwrap();
        assert_eq!(result.total_files, 3);
        assert_eq!(result.estimated_chunks, 4);
        assert!(!result.truncated);
        assert_eq!(result.largest_file.as_deref(), Some("b.rs"));
        assert!(result.peak_memory_mb > 0.0);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_dry_run_cap_truncates() {
        let tmp = TempDir::new().unwrap();
        for i in 0..8 {
            fs::write(tmp.path().join(format!("f{i}.txt")), "x\n").unwrap();
        }

        let mut config = ScanConfig::new(tmp.path());
        config.max_files = 5;

        let result = dry_run(&config, ChunkerConfig::default()).unwrap();
        assert_eq!(result.total_files, 5);
        assert!(result.truncated);
        assert_eq!(result.stop_reason, StopReason::MaxFiles);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_dry_run_depth_truncates() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("a/b/c")).unwrap();
        fs::write(tmp.path().join("a/b/c/deep.rs"), "x\n").unwrap();
        fs::write(tmp.path().join("top.rs"), "x\n").unwrap();

        let mut config = ScanConfig::new(tmp.path());
        config.max_depth = 1;

        let result = dry_run(&config, ChunkerConfig::default()).unwrap();
        assert_eq!(result.total_files, 1);
        assert!(result.truncated);
        assert_eq!(result.stop_reason, StopReason::MaxDepth);
    }

    #[test]
    fn test_dry_run_counts_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("big.txt"), "x".repeat(100)).unwrap();
        fs::write(tmp.path().join("blob.dat"), b"\0\0\0").unwrap();
        fs::write(tmp.path().join("ok.txt"), "ok\n").unwrap();

        let mut config = ScanConfig::new(tmp.path());
        config.max_file_size = 50;

        let result = dry_run(&config, ChunkerConfig::default()).unwrap();
        assert_eq!(result.total_files, 1);
        assert_eq!(result.skipped_files, 2);
    }

    #[test]
    fn test_dry_run_rejects_missing_root() {
        let config = ScanConfig::new("/definitely/not/a/real/root");
        let err = dry_run(&config, ChunkerConfig::default()).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.rs"), lines(3)).unwrap();

        dry_run(&ScanConfig::new(tmp.path()), ChunkerConfig::default()).unwrap();

        let entries: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_async() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.rs"), lines(81)).unwrap();

        let result = dry_run_async(ScanConfig::new(tmp.path()), ChunkerConfig::default())
            .await
            .unwrap();
        assert_eq!(result.estimated_chunks, 2);
    }
}
