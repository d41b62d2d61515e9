//! Nexus indexer library
//!
//! Streaming ingestion of a source tree into searchable chunks, kept in
//! sync with the filesystem by a debounced directory watcher.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod indexer;
pub mod observability;
pub mod sink;
pub mod storage;
pub mod watcher;

pub use config::{ChunkerConfig, Config, ScanConfig, WatcherConfig};
pub use error::{Error, FileError, Result};
pub use indexer::{
    chunk_file, dry_run, index_tree, scan_with_progress, Chunk, DryRunResult, FileInfo,
    IndexPipeline, RunSummary,
};
pub use sink::{ChunkDocument, SearchSink};
pub use storage::FileStore;
pub use watcher::{DirectoryWatcher, WatcherRegistry, WatcherStatus};
