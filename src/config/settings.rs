//! Configuration settings and validation.

use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Default cap on files processed in one run.
pub const DEFAULT_MAX_FILES: usize = 10_000;

/// Default per-file size cap (1 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Default directory depth limit (root is depth 0).
pub const DEFAULT_MAX_DEPTH: usize = 20;

/// Default chunk span in lines.
pub const DEFAULT_MAX_LINES: usize = 80;

/// Default micro-batch size.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default debounce window for watcher events.
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Hard stop conditions for a tree walk.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Root directory to walk.
    pub root_path: PathBuf,
    /// Files larger than this are skipped.
    pub max_file_size: u64,
    /// Walk stops after this many eligible files.
    pub max_files: usize,
    /// Directories deeper than this are not entered.
    pub max_depth: usize,
    /// Gitignore-style patterns applied on top of the defaults.
    pub ignore_patterns: Vec<String>,
}

impl ScanConfig {
    /// Create a scan config for `root_path` with default caps.
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_files: DEFAULT_MAX_FILES,
            max_depth: DEFAULT_MAX_DEPTH,
            ignore_patterns: Vec::new(),
        }
    }

    /// Validate caps and root reachability.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if a cap is zero or the root is not a directory.
    pub fn validate(&self) -> Result<()> {
        if self.max_files == 0 {
            return Err(Error::config("max_files must be greater than 0"));
        }

        if self.max_file_size == 0 {
            return Err(Error::config("max_file_size must be greater than 0"));
        }

        match std::fs::metadata(&self.root_path) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(Error::config(format!(
                "root path '{}' is not a directory",
                self.root_path.display()
            ))),
            Err(e) => Err(Error::config(format!(
                "root path '{}' is unreachable: {e}",
                self.root_path.display()
            ))),
        }
    }
}

/// Chunking configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    /// Maximum chunk span in lines.
    pub max_lines: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_lines: DEFAULT_MAX_LINES,
        }
    }
}

impl ChunkerConfig {
    /// Create a chunker config with the given span.
    #[must_use]
    pub const fn new(max_lines: usize) -> Self {
        Self { max_lines }
    }

    /// Validate chunking parameters.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `max_lines` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_lines == 0 {
            return Err(Error::config("max_lines must be greater than 0"));
        }
        Ok(())
    }
}

/// Directory watcher configuration.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Root to subscribe under, with its ignore rules and size cap.
    pub scan: ScanConfig,
    /// Quiet period required before a path is processed.
    pub debounce: Duration,
    /// Maximum files processed per drain cycle.
    pub batch_size: usize,
}

impl WatcherConfig {
    /// Create a watcher config for `root_path` with default timings.
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            scan: ScanConfig::new(root_path),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Validate watcher parameters.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` on an invalid root or zero batch size.
    pub fn validate(&self) -> Result<()> {
        self.scan.validate()?;
        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be greater than 0"));
        }
        Ok(())
    }
}

/// Main configuration for the indexer.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for the `SQLite` database.
    pub data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Tree walk caps.
    pub scan: ScanConfig,

    /// Chunking parameters.
    pub chunker: ChunkerConfig,

    /// Chunk documents per sink submission.
    pub batch_size: usize,

    /// Watcher debounce window in milliseconds.
    pub debounce_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            log_level: "info".to_string(),
            scan: ScanConfig::new("."),
            chunker: ChunkerConfig::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be greater than 0"));
        }

        self.chunker.validate()?;
        self.scan.validate()?;

        Ok(())
    }

    /// Get the path to the `SQLite` database file.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("nexus.db")
    }

    /// Derive the watcher configuration.
    #[must_use]
    pub fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            scan: self.scan.clone(),
            debounce: Duration::from_millis(self.debounce_ms),
            batch_size: self.batch_size,
        }
    }
}
