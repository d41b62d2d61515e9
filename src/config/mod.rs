//! Configuration management for the indexer.
//!
//! Supports configuration from:
//! - Command-line arguments (highest priority)
//! - Environment variables
//! - Built-in defaults (lowest priority)

mod settings;

pub use settings::{
    ChunkerConfig, Config, ScanConfig, WatcherConfig, DEFAULT_BATCH_SIZE, DEFAULT_DEBOUNCE_MS,
    DEFAULT_MAX_DEPTH, DEFAULT_MAX_FILES, DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_LINES,
};
