//! Live directory watching.
//!
//! This module provides:
//! - Event classification and a per-path collapsing queue
//! - A deadline-ordered debounce scheduler
//! - The [`DirectoryWatcher`] state machine driving the index pipeline
//! - [`WatcherRegistry`], which keeps one watcher active per process

mod debounce;
mod events;
mod registry;
#[allow(clippy::module_inception)]
mod watcher;

pub use debounce::DebounceScheduler;
pub use events::{classify, EventKind, EventQueue, QueueEntry};
pub use registry::WatcherRegistry;
pub use watcher::{
    DirectoryWatcher, DrainReport, StopReport, WatcherState, WatcherStats, WatcherStatsSnapshot,
    WatcherStatus,
};
