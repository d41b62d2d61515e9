//! Ignore rules for the tree walk and watcher events.
//!
//! A path is ineligible when any of these hold:
//! - a segment is hidden (`.name`) or a well-known dependency/build/cache dir
//! - the file carries a binary, media or generated extension
//! - it matches the root `.gitignore` or a user-supplied pattern

use std::path::{Component, Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::Result;

/// Directory and file names that are never indexed.
const DEFAULT_IGNORED_NAMES: &[&str] = &[
    // JavaScript
    "node_modules",
    "bower_components",
    // PHP
    "vendor",
    // Python
    "__pycache__",
    "venv",
    "env",
    "site-packages",
    "eggs",
    // Build outputs
    "dist",
    "build",
    "out",
    "target",
    "_build",
    // Framework state
    "var",
    "storage",
    // Coverage
    "coverage",
    "htmlcov",
    // Logs and scratch
    "logs",
    "tmp",
    "temp",
    // OS files
    "Thumbs.db",
];

/// Name suffixes of files that are never indexed.
const IGNORED_SUFFIXES: &[&str] = &[
    ".min.js", ".min.css", ".bundle.js", ".map", ".lock", ".log", ".local", ".bak", ".swp",
    ".swo", "~", ".egg-info", ".db", ".db-shm", ".db-wal", ".pyc", ".pyo", ".so", ".dylib",
    ".dll", ".exe", ".bin", ".png", ".jpg", ".jpeg", ".gif", ".ico", ".svg", ".woff",
    ".woff2", ".ttf", ".eot", ".mp3", ".mp4", ".wav", ".avi", ".mov", ".pdf", ".zip", ".tar",
    ".gz", ".rar", ".7z",
];

/// File filter for indexing.
#[derive(Debug)]
pub struct FileFilter {
    gitignore: Gitignore,
    root: PathBuf,
}

impl FileFilter {
    /// Build a filter rooted at `root`.
    ///
    /// Reads `<root>/.gitignore` when present and adds `patterns` on top.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a pattern is invalid.
    pub fn new(root: impl AsRef<Path>, patterns: &[String]) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let mut builder = GitignoreBuilder::new(&root);

        let gitignore_path = root.join(".gitignore");
        if gitignore_path.is_file() {
            if let Some(e) = builder.add(&gitignore_path) {
                tracing::warn!(error = %e, "Ignoring unreadable .gitignore entries");
            }
        }

        for pattern in patterns {
            builder
                .add_line(None, pattern)
                .map_err(|e| crate::Error::config(format!("invalid ignore pattern '{pattern}': {e}")))?;
        }

        let gitignore = builder
            .build()
            .map_err(|e| crate::Error::config(format!("failed to build ignore rules: {e}")))?;

        Ok(Self { gitignore, root })
    }

    /// Root the filter was built for.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check a single walk entry whose parents were already accepted.
    #[must_use]
    pub fn is_ignored_entry(&self, path: &Path, is_dir: bool) -> bool {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };

        if is_ignored_name(&name) || (!is_dir && has_ignored_suffix(&name)) {
            return true;
        }

        self.gitignore.matched(path, is_dir).is_ignore()
    }

    /// Check an arbitrary path under the root, including every parent segment.
    #[must_use]
    pub fn is_ignored_path(&self, path: &Path, is_dir: bool) -> bool {
        let Ok(rel) = path.strip_prefix(&self.root) else {
            return true;
        };
        if rel.as_os_str().is_empty() {
            return false;
        }

        let segment_ignored = rel.components().any(|c| match c {
            Component::Normal(name) => is_ignored_name(&name.to_string_lossy()),
            _ => false,
        });
        if segment_ignored {
            return true;
        }

        if !is_dir {
            if let Some(name) = path.file_name() {
                if has_ignored_suffix(&name.to_string_lossy()) {
                    return true;
                }
            }
        }

        self.gitignore
            .matched_path_or_any_parents(path, is_dir)
            .is_ignore()
    }
}

fn is_ignored_name(name: &str) -> bool {
    (name.starts_with('.') && name.len() > 1) || DEFAULT_IGNORED_NAMES.contains(&name)
}

fn has_ignored_suffix(name: &str) -> bool {
    let lower = name.to_lowercase();
    IGNORED_SUFFIXES.iter().any(|s| lower.ends_with(s))
}
