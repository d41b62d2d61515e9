//! Bounded, ordered tree walk shared by the estimator and the scanner.
//!
//! Entries are visited in file-name order so repeated walks over an
//! unchanged tree yield the same sequence. The root is depth 0; a directory
//! deeper than `max_depth` is reported once and never entered.

use std::fs::Metadata;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::Serialize;
use walkdir::WalkDir;

use super::filter::FileFilter;
use crate::config::ScanConfig;
use crate::error::FileError;
use crate::Result;

/// An eligible file found during a walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    /// Absolute or root-joined path used for reading.
    pub full_path: PathBuf,
    /// Path relative to the root with `/` separators; the record key.
    pub rel_path: String,
    pub size: u64,
    /// Modification time in Unix milliseconds.
    pub mtime_ms: i64,
}

impl FileInfo {
    /// Build from already-fetched metadata.
    #[must_use]
    pub fn from_metadata(root: &Path, full_path: &Path, meta: &Metadata) -> Self {
        let mtime_ms = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .and_then(|d| i64::try_from(d.as_millis()).ok())
            .unwrap_or_default();

        Self {
            full_path: full_path.to_path_buf(),
            rel_path: relative_path(root, full_path),
            size: meta.len(),
            mtime_ms,
        }
    }

    /// Stat `full_path` and build its info.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from `stat`, including `NotFound`.
    pub fn from_path(root: &Path, full_path: &Path) -> std::io::Result<Self> {
        let meta = std::fs::metadata(full_path)?;
        Ok(Self::from_metadata(root, full_path, &meta))
    }
}

/// Render `path` relative to `root` with forward slashes.
#[must_use]
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether `path` lies below a directory the walk never enters.
///
/// The root is depth 0 and a directory deeper than `max_depth` is skipped,
/// so a path is out of reach when its parent is deeper than `max_depth`.
/// Paths outside `root` are never out of reach.
#[must_use]
pub fn exceeds_max_depth(root: &Path, path: &Path, max_depth: usize) -> bool {
    path.strip_prefix(root)
        .is_ok_and(|rel| rel.components().count().saturating_sub(1) > max_depth)
}

/// Why a walk ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every eligible entry was visited.
    #[default]
    Completed,
    /// More eligible files existed than `max_files`.
    MaxFiles,
    /// At least one directory was deeper than `max_depth`.
    MaxDepth,
}

/// One step of a walk.
#[derive(Debug)]
pub enum WalkEvent {
    /// Eligible file within every bound.
    File(FileInfo),
    /// Eligible by name but larger than `max_file_size`.
    Oversized(FileInfo),
    /// Directory not entered because of `max_depth`.
    DepthExceeded(PathBuf),
    /// Entry that could not be read.
    Failed(FileError),
    /// Another eligible file exists past `max_files`; the walk ends here.
    LimitReached,
}

/// Iterator over [`WalkEvent`]s for one root.
pub struct TreeWalker {
    inner: walkdir::IntoIter,
    filter: FileFilter,
    root: PathBuf,
    max_file_size: u64,
    max_files: usize,
    max_depth: usize,
    yielded: usize,
    done: bool,
}

impl TreeWalker {
    /// Prepare a walk over `config.root_path`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the ignore patterns are invalid.
    pub fn new(config: &ScanConfig) -> Result<Self> {
        let filter = FileFilter::new(&config.root_path, &config.ignore_patterns)?;
        let inner = WalkDir::new(&config.root_path)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        Ok(Self {
            inner,
            filter,
            root: config.root_path.clone(),
            max_file_size: config.max_file_size,
            max_files: config.max_files,
            max_depth: config.max_depth,
            yielded: 0,
            done: false,
        })
    }

    /// Files yielded as [`WalkEvent::File`] so far.
    #[must_use]
    pub const fn yielded(&self) -> usize {
        self.yielded
    }
}

impl Iterator for TreeWalker {
    type Item = WalkEvent;

    fn next(&mut self) -> Option<WalkEvent> {
        if self.done {
            return None;
        }

        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.display().to_string(), |p| {
                            relative_path(&self.root, p)
                        });
                    return Some(WalkEvent::Failed(FileError::new(path, e.to_string())));
                }
            };

            if entry.depth() == 0 {
                continue;
            }

            let path = entry.path();
            let file_type = entry.file_type();
            let is_dir = file_type.is_dir();

            if self.filter.is_ignored_entry(path, is_dir) {
                if is_dir {
                    self.inner.skip_current_dir();
                }
                continue;
            }

            if is_dir {
                if entry.depth() > self.max_depth {
                    self.inner.skip_current_dir();
                    return Some(WalkEvent::DepthExceeded(path.to_path_buf()));
                }
                continue;
            }

            if !file_type.is_file() {
                continue;
            }

            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(e) => {
                    let rel = relative_path(&self.root, path);
                    return Some(WalkEvent::Failed(FileError::new(rel, e.to_string())));
                }
            };

            let info = FileInfo::from_metadata(&self.root, path, &meta);
            if info.size > self.max_file_size {
                return Some(WalkEvent::Oversized(info));
            }

            if self.yielded >= self.max_files {
                self.done = true;
                return Some(WalkEvent::LimitReached);
            }

            self.yielded += 1;
            return Some(WalkEvent::File(info));
        }
    }
}
