//! File system event types and the watcher queue.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use notify::event::{ModifyKind, RenameMode};
use serde::Serialize;

/// Kind of change observed for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Add,
    Change,
    Unlink,
}

/// Map a raw notify event to `(path, kind)` pairs.
///
/// Access and unclassified events map to nothing. A rename with both ends
/// known becomes an unlink of the old path and an add of the new one.
#[must_use]
pub fn classify(event: &notify::Event) -> Vec<(PathBuf, EventKind)> {
    use notify::EventKind as Raw;

    match &event.kind {
        Raw::Create(_) => tagged(&event.paths, EventKind::Add),
        Raw::Remove(_) => tagged(&event.paths, EventKind::Unlink),
        Raw::Modify(ModifyKind::Name(RenameMode::From)) => {
            tagged(&event.paths, EventKind::Unlink)
        }
        Raw::Modify(ModifyKind::Name(RenameMode::To)) => tagged(&event.paths, EventKind::Add),
        Raw::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => vec![
            (event.paths[0].clone(), EventKind::Unlink),
            (event.paths[1].clone(), EventKind::Add),
        ],
        Raw::Modify(_) => tagged(&event.paths, EventKind::Change),
        Raw::Access(_) | Raw::Any | Raw::Other => Vec::new(),
    }
}

fn tagged(paths: &[PathBuf], kind: EventKind) -> Vec<(PathBuf, EventKind)> {
    paths.iter().map(|p| (p.clone(), kind)).collect()
}

/// A debounced path waiting to be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueEntry {
    pub path: PathBuf,
    pub event_type: EventKind,
    pub enqueued_at: DateTime<Utc>,
}

/// FIFO of debounced paths, at most one entry per path.
///
/// A later event for a queued path keeps the entry's position and
/// `enqueued_at` and only updates its kind; processing always reads the
/// latest content from disk.
#[derive(Debug, Default)]
pub struct EventQueue {
    entries: VecDeque<QueueEntry>,
}

impl EventQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue `path`, collapsing into an existing entry. Returns `true`
    /// if a new entry was added.
    pub fn push(&mut self, path: PathBuf, kind: EventKind) -> bool {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.path == path) {
            entry.event_type = kind;
            return false;
        }

        self.entries.push_back(QueueEntry {
            path,
            event_type: kind,
            enqueued_at: Utc::now(),
        });
        true
    }

    /// Take the oldest entry.
    pub fn pop_front(&mut self) -> Option<QueueEntry> {
        self.entries.pop_front()
    }

    /// Whether `path` is queued.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.iter().any(|e| e.path == path)
    }

    /// Point-in-time copy of the queue, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<QueueEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Drop every entry, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }

    /// Check if the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the number of queued paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
