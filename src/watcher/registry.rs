//! Process-level holder enforcing one active watcher.
//!
//! The host creates one registry and passes it where watchers are started;
//! tests build their own.

use std::sync::Arc;

use super::watcher::{DirectoryWatcher, StopReport, WatcherStatus};
use crate::config::WatcherConfig;
use crate::error::WatcherError;
use crate::indexer::IndexPipeline;
use crate::Result;

/// Owner of the single active [`DirectoryWatcher`].
#[derive(Default)]
pub struct WatcherRegistry {
    active: tokio::sync::Mutex<Option<Arc<DirectoryWatcher>>>,
}

impl WatcherRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a watcher unless one is already active.
    ///
    /// # Errors
    ///
    /// Returns `WatcherError::AlreadyActive` if a watcher is running or
    /// paused, leaving it untouched, or any error from
    /// [`DirectoryWatcher::start`].
    pub async fn start(
        &self,
        config: WatcherConfig,
        pipeline: Arc<IndexPipeline>,
    ) -> Result<Arc<DirectoryWatcher>> {
        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(|w| w.get_status().is_running) {
            return Err(WatcherError::AlreadyActive.into());
        }

        let watcher = Arc::new(DirectoryWatcher::new(pipeline));
        watcher.start(config).await?;
        *active = Some(Arc::clone(&watcher));
        Ok(watcher)
    }

    /// The active watcher, if any.
    pub async fn active(&self) -> Option<Arc<DirectoryWatcher>> {
        self.active
            .lock()
            .await
            .as_ref()
            .filter(|w| w.get_status().is_running)
            .cloned()
    }

    /// Stop and release the active watcher.
    ///
    /// # Errors
    ///
    /// Returns `WatcherError::InvalidState` if no watcher is active.
    pub async fn stop(&self) -> Result<StopReport> {
        let mut active = self.active.lock().await;
        if !active.as_ref().is_some_and(|w| w.get_status().is_running) {
            return Err(WatcherError::invalid_state("stop", "stopped").into());
        }
        match active.take() {
            Some(watcher) => watcher.stop().await,
            None => Err(WatcherError::invalid_state("stop", "stopped").into()),
        }
    }

    /// Status of the active watcher; a stopped status when there is none.
    pub async fn status(&self) -> WatcherStatus {
        match self.active.lock().await.as_ref() {
            Some(watcher) => watcher.get_status(),
            None => WatcherStatus::stopped(),
        }
    }
}
