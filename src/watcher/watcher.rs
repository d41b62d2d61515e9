//! Directory watcher state machine.
//!
//! `Stopped -> Running <-> Paused -> Stopped`. One tokio task owns the
//! notify subscription, the debounce timers and the processing of queued
//! paths, so no two files are ever processed at the same time. Control
//! calls reach it over a command channel; status reads go through a small
//! shared snapshot.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant as StdInstant};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::Instrument;

use super::debounce::DebounceScheduler;
use super::events::{classify, EventKind, EventQueue, QueueEntry};
use crate::config::WatcherConfig;
use crate::error::{FileError, WatcherError};
use crate::indexer::{exceeds_max_depth, FileFilter, FileInfo, FileOutcome, IndexPipeline};
use crate::Result;

/// Lifecycle state of a [`DirectoryWatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WatcherState {
    Stopped,
    Running,
    Paused,
}

impl WatcherState {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Paused => "paused",
        }
    }
}

/// Statistics for file watching.
#[derive(Debug, Default)]
pub struct WatcherStats {
    pub events_received: AtomicU64,
    pub events_ignored: AtomicU64,
    pub files_processed: AtomicU64,
    pub errors: AtomicU64,
    pub drain_cycles: AtomicU64,
}

impl WatcherStats {
    /// Get snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> WatcherStatsSnapshot {
        WatcherStatsSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            events_ignored: self.events_ignored.load(Ordering::Relaxed),
            files_processed: self.files_processed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            drain_cycles: self.drain_cycles.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of watcher stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WatcherStatsSnapshot {
    pub events_received: u64,
    pub events_ignored: u64,
    /// Pipeline executions, including missing and unchanged files.
    pub files_processed: u64,
    pub errors: u64,
    pub drain_cycles: u64,
}

/// Point-in-time watcher status.
#[derive(Debug, Clone, Serialize)]
pub struct WatcherStatus {
    /// True while running or paused.
    pub is_running: bool,
    pub is_paused: bool,
    pub queued_files: usize,
    /// Paths still inside their debounce window.
    pub pending_debounce: usize,
    pub watched_paths: Vec<PathBuf>,
    pub uptime: Duration,
    pub stats: WatcherStatsSnapshot,
}

impl WatcherStatus {
    /// Status of a watcher that is not running.
    #[must_use]
    pub fn stopped() -> Self {
        Self {
            is_running: false,
            is_paused: false,
            queued_files: 0,
            pending_debounce: 0,
            watched_paths: Vec::new(),
            uptime: Duration::ZERO,
            stats: WatcherStatsSnapshot::default(),
        }
    }
}

/// Result of draining the queue.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DrainReport {
    pub processed: usize,
    pub cycles: usize,
    pub errors: Vec<FileError>,
}

/// Result of stopping a watcher.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StopReport {
    pub cancelled_timers: usize,
    pub dropped_entries: usize,
    pub flushed_documents: usize,
    pub errors: Vec<FileError>,
}

struct Shared {
    state: WatcherState,
    /// Set by `stop()` so a running drain stops taking entries.
    stopping: bool,
    queue: EventQueue,
    pending_debounce: usize,
    watched_paths: Vec<PathBuf>,
    started_at: Option<StdInstant>,
}

enum Command {
    Drain(oneshot::Sender<DrainReport>),
    Stop(oneshot::Sender<StopReport>),
}

struct LoopHandle {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

/// Watches one root and feeds changed files through an [`IndexPipeline`].
pub struct DirectoryWatcher {
    pipeline: Arc<IndexPipeline>,
    shared: Arc<Mutex<Shared>>,
    stats: Arc<WatcherStats>,
    control: tokio::sync::Mutex<Option<LoopHandle>>,
}

impl std::fmt::Debug for DirectoryWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatcher").finish_non_exhaustive()
    }
}

impl DirectoryWatcher {
    /// Create a stopped watcher.
    #[must_use]
    pub fn new(pipeline: Arc<IndexPipeline>) -> Self {
        Self {
            pipeline,
            shared: Arc::new(Mutex::new(Shared {
                state: WatcherState::Stopped,
                stopping: false,
                queue: EventQueue::new(),
                pending_debounce: 0,
                watched_paths: Vec::new(),
                started_at: None,
            })),
            stats: Arc::new(WatcherStats::default()),
            control: tokio::sync::Mutex::new(None),
        }
    }

    /// Subscribe under `config.scan.root_path` and start processing.
    ///
    /// Nothing changes unless every step succeeds.
    ///
    /// # Errors
    ///
    /// Returns `WatcherError::InvalidState` unless stopped, `Error::Config`
    /// for an invalid config, or `WatcherError::WatchFailed` if the
    /// subscription cannot be created.
    pub async fn start(&self, config: WatcherConfig) -> Result<()> {
        let mut control = self.control.lock().await;

        let state = self.shared.lock().state;
        if state != WatcherState::Stopped {
            return Err(WatcherError::invalid_state("start", state.as_str()).into());
        }

        config.validate()?;
        let root = config.scan.root_path.canonicalize().map_err(|e| {
            crate::Error::config(format!(
                "root path '{}' is unreachable: {e}",
                config.scan.root_path.display()
            ))
        })?;
        let filter = FileFilter::new(&root, &config.scan.ignore_patterns)?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut notifier = notify::recommended_watcher(
            move |result: notify::Result<notify::Event>| match result {
                Ok(event) => {
                    let _ = event_tx.send(event);
                }
                Err(e) => tracing::error!(error = %e, "Watch error"),
            },
        )
        .map_err(|e| watch_failed(&root, &e))?;

        notifier
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| watch_failed(&root, &e))?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let event_loop = EventLoop {
            notifier: Some(notifier),
            events: event_rx,
            commands: command_rx,
            root: root.clone(),
            filter,
            max_file_size: config.scan.max_file_size,
            max_depth: config.scan.max_depth,
            batch_size: config.batch_size,
            debounce: DebounceScheduler::new(config.debounce),
            pipeline: Arc::clone(&self.pipeline),
            shared: Arc::clone(&self.shared),
            stats: Arc::clone(&self.stats),
        };

        {
            let mut shared = self.shared.lock();
            shared.state = WatcherState::Running;
            shared.stopping = false;
            shared.queue.clear();
            shared.pending_debounce = 0;
            shared.watched_paths = vec![root.clone()];
            shared.started_at = Some(StdInstant::now());
        }

        let task = tokio::spawn(event_loop.run());
        *control = Some(LoopHandle {
            commands: command_tx,
            task,
        });

        tracing::info!(
            path = %root.display(),
            debounce = ?config.debounce,
            batch_size = config.batch_size,
            "Watching directory"
        );
        Ok(())
    }

    /// Stop processing; events keep being captured and queued.
    ///
    /// # Errors
    ///
    /// Returns `WatcherError::InvalidState` unless running.
    pub fn pause(&self) -> Result<()> {
        let mut shared = self.shared.lock();
        if shared.state != WatcherState::Running {
            return Err(WatcherError::invalid_state("pause", shared.state.as_str()).into());
        }
        shared.state = WatcherState::Paused;
        tracing::info!(queued = shared.queue.len(), "Watcher paused");
        Ok(())
    }

    /// Resume processing and drain the queue in enqueue order.
    ///
    /// Resolves once the queue has been drained.
    ///
    /// # Errors
    ///
    /// Returns `WatcherError::InvalidState` unless paused.
    pub async fn resume(&self) -> Result<DrainReport> {
        let control = self.control.lock().await;

        {
            let mut shared = self.shared.lock();
            if shared.state != WatcherState::Paused {
                return Err(WatcherError::invalid_state("resume", shared.state.as_str()).into());
            }
            shared.state = WatcherState::Running;
            tracing::info!(queued = shared.queue.len(), "Watcher resumed");
        }

        let handle = control
            .as_ref()
            .ok_or_else(|| WatcherError::LoopTerminated("no event loop".to_string()))?;
        let (reply_tx, reply_rx) = oneshot::channel();
        handle
            .commands
            .send(Command::Drain(reply_tx))
            .map_err(|_| WatcherError::LoopTerminated("event loop is gone".to_string()))?;
        drop(control);

        reply_rx
            .await
            .map_err(|_| WatcherError::LoopTerminated("drain was interrupted".to_string()).into())
    }

    /// Unsubscribe, cancel pending timers, let the current file finish and
    /// flush buffered documents.
    ///
    /// Entries still queued are dropped and counted in the report.
    ///
    /// # Errors
    ///
    /// Returns `WatcherError::InvalidState` if already stopped.
    pub async fn stop(&self) -> Result<StopReport> {
        let mut control = self.control.lock().await;

        {
            let mut shared = self.shared.lock();
            if shared.state == WatcherState::Stopped {
                return Err(WatcherError::invalid_state("stop", shared.state.as_str()).into());
            }
            shared.stopping = true;
        }

        let mut report = StopReport::default();
        if let Some(handle) = control.take() {
            let (reply_tx, reply_rx) = oneshot::channel();
            if handle.commands.send(Command::Stop(reply_tx)).is_ok() {
                if let Ok(r) = reply_rx.await {
                    report = r;
                }
            }
            if let Err(e) = handle.task.await {
                tracing::error!(error = %e, "Watcher event loop failed");
            }
        }

        {
            let mut shared = self.shared.lock();
            shared.state = WatcherState::Stopped;
            shared.stopping = false;
            shared.queue.clear();
            shared.pending_debounce = 0;
            shared.watched_paths.clear();
            shared.started_at = None;
        }

        tracing::info!(
            cancelled_timers = report.cancelled_timers,
            dropped = report.dropped_entries,
            flushed = report.flushed_documents,
            "Watcher stopped"
        );
        Ok(report)
    }

    /// Current status. Never fails, including when stopped.
    #[must_use]
    pub fn get_status(&self) -> WatcherStatus {
        let shared = self.shared.lock();
        WatcherStatus {
            is_running: shared.state != WatcherState::Stopped,
            is_paused: shared.state == WatcherState::Paused,
            queued_files: shared.queue.len(),
            pending_debounce: shared.pending_debounce,
            watched_paths: shared.watched_paths.clone(),
            uptime: shared.started_at.map(|t| t.elapsed()).unwrap_or_default(),
            stats: self.stats.snapshot(),
        }
    }

    /// Point-in-time copy of the queue.
    #[must_use]
    pub fn get_queue(&self) -> Vec<QueueEntry> {
        self.shared.lock().queue.snapshot()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WatcherState {
        self.shared.lock().state
    }
}

fn watch_failed(root: &Path, e: &notify::Error) -> WatcherError {
    WatcherError::WatchFailed {
        path: root.display().to_string(),
        reason: e.to_string(),
    }
}

struct EventLoop {
    notifier: Option<RecommendedWatcher>,
    events: mpsc::UnboundedReceiver<notify::Event>,
    commands: mpsc::UnboundedReceiver<Command>,
    root: PathBuf,
    filter: FileFilter,
    max_file_size: u64,
    max_depth: usize,
    batch_size: usize,
    debounce: DebounceScheduler,
    pipeline: Arc<IndexPipeline>,
    shared: Arc<Mutex<Shared>>,
    stats: Arc<WatcherStats>,
}

impl EventLoop {
    async fn run(mut self) {
        loop {
            let deadline = self.debounce.next_deadline();

            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Drain(reply)) => {
                        let report = self.drain().await;
                        let _ = reply.send(report);
                    }
                    Some(Command::Stop(reply)) => {
                        let report = self.shutdown().await;
                        let _ = reply.send(report);
                        return;
                    }
                    None => {
                        self.shutdown().await;
                        return;
                    }
                },

                Some(event) = self.events.recv() => self.record(&event),

                () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                    if deadline.is_some() =>
                {
                    self.fire_ready().await;
                }
            }
        }
    }

    fn record(&mut self, event: &notify::Event) {
        let now = Instant::now();
        for (path, kind) in classify(event) {
            self.stats.events_received.fetch_add(1, Ordering::Relaxed);

            let is_dir = path.is_dir();
            if (is_dir && kind != EventKind::Unlink)
                || exceeds_max_depth(&self.root, &path, self.max_depth)
                || self.filter.is_ignored_path(&path, is_dir)
            {
                self.stats.events_ignored.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            tracing::trace!(path = %path.display(), ?kind, "Debouncing event");
            self.debounce.record(path, kind, now);
        }
        self.shared.lock().pending_debounce = self.debounce.len();
    }

    async fn fire_ready(&mut self) {
        let ready = self.debounce.take_ready(Instant::now());
        let running = {
            let mut shared = self.shared.lock();
            for (path, kind) in ready {
                shared.queue.push(path, kind);
            }
            shared.pending_debounce = self.debounce.len();
            shared.state == WatcherState::Running && !shared.stopping
        };

        if running {
            let report = self.drain().await;
            if !report.errors.is_empty() {
                tracing::warn!(
                    processed = report.processed,
                    errors = report.errors.len(),
                    "Drain finished with errors"
                );
            }
        }
    }

    /// Process queued paths in cycles of up to `batch_size`, flushing after
    /// each cycle, until the queue is empty or the watcher is paused or
    /// stopping.
    async fn drain(&mut self) -> DrainReport {
        let mut report = DrainReport::default();

        loop {
            let queued = {
                let shared = self.shared.lock();
                if shared.stopping {
                    break;
                }
                shared.queue.len()
            };
            if queued == 0 {
                break;
            }

            let span = crate::observability::spans::drain_span(queued);
            let processed = self.drain_cycle(&mut report).instrument(span).await;
            if processed == 0 {
                break;
            }
        }

        report
    }

    async fn drain_cycle(&mut self, report: &mut DrainReport) -> usize {
        let mut processed = 0;

        while processed < self.batch_size {
            let entry = {
                let mut shared = self.shared.lock();
                if shared.state != WatcherState::Running || shared.stopping {
                    break;
                }
                shared.queue.pop_front()
            };
            let Some(entry) = entry else {
                break;
            };

            match self.process_entry(&entry).await {
                Ok(outcome) => tracing::debug!(path = %entry.path.display(), ?outcome, "Processed change"),
                Err(e) => {
                    let rel = crate::indexer::relative_path(&self.root, &entry.path);
                    tracing::warn!(path = %rel, error = %e, "Failed to process change");
                    self.stats.errors.fetch_add(1, Ordering::Relaxed);
                    report.errors.push(FileError::new(rel, e.to_string()));
                }
            }
            self.stats.files_processed.fetch_add(1, Ordering::Relaxed);
            processed += 1;
        }

        if processed > 0 {
            self.pipeline.flush().await;
            let failures = self.pipeline.take_flush_failures();
            self.stats
                .errors
                .fetch_add(failures.len() as u64, Ordering::Relaxed);
            report.errors.extend(failures);
            report.processed += processed;
            report.cycles += 1;
            self.stats.drain_cycles.fetch_add(1, Ordering::Relaxed);
        }

        processed
    }

    async fn process_entry(&self, entry: &QueueEntry) -> Result<FileOutcome> {
        let info = match FileInfo::from_path(&self.root, &entry.path) {
            Ok(info) => info,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %entry.path.display(), "File no longer exists");
                return Ok(FileOutcome::Missing);
            }
            Err(e) => return Err(e.into()),
        };

        if info.size > self.max_file_size {
            tracing::debug!(path = %info.rel_path, size = info.size, "Skipping oversized file");
            return Ok(FileOutcome::Oversized);
        }

        self.pipeline.process_file(&info).await
    }

    async fn shutdown(&mut self) -> StopReport {
        // Dropping the notifier unsubscribes from the root.
        self.notifier.take();
        self.events.close();

        let cancelled_timers = self.debounce.cancel_all();
        let dropped_entries = {
            let mut shared = self.shared.lock();
            shared.pending_debounce = 0;
            shared.queue.clear()
        };
        if dropped_entries > 0 {
            tracing::warn!(dropped = dropped_entries, "Dropping queued changes on stop");
        }

        let flushed_documents = self.pipeline.flush().await;
        let errors = self.pipeline.take_flush_failures();

        StopReport {
            cancelled_timers,
            dropped_entries,
            flushed_documents,
            errors,
        }
    }
}
