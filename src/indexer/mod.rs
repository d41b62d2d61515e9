//! Ingestion pipeline.
//!
//! Provides:
//! - A read-only capacity estimate ([`dry_run`])
//! - A streaming scanner with hard caps ([`scan_with_progress`])
//! - Content hashing and change detection
//! - Deterministic line-window chunking ([`chunk_file`])
//! - Micro-batched submission to a search sink
//! - A full index run ([`index_tree`]) built on the above

mod batch;
mod chunker;
mod estimator;
mod filter;
mod hasher;
mod language;
mod pipeline;
mod run;
mod scanner;
mod walk;

pub use batch::{FlushFailure, MicroBatcher};
pub use chunker::{chunk_file, Chunk, ChunkedFile, Chunker};
pub use estimator::{dry_run, dry_run_async, DryRunResult, WARN_FILE_COUNT, WARN_PEAK_MEMORY_MB};
pub use filter::FileFilter;
pub use hasher::{detect_change, hash_content, looks_binary, ChangeDecision, BINARY_SNIFF_LEN};
pub use language::detect_language;
pub use pipeline::{FileOutcome, IndexPipeline, PipelineStats, PipelineStatsSnapshot};
pub use run::{index_tree, RunSummary};
pub use scanner::{scan_with_progress, ScanOutcome, ScanProgress};
pub use walk::{exceeds_max_depth, relative_path, FileInfo, StopReason, TreeWalker, WalkEvent};
