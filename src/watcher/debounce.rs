//! Per-path debounce scheduler.
//!
//! Deadlines live in one ordered map so the owning loop only ever sleeps
//! until the earliest one. Recording an event for a path that is already
//! pending moves its deadline; a path becomes ready once its window passes
//! with no further event.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use tokio::time::Instant;

use super::events::EventKind;

#[derive(Debug, Clone, Copy)]
struct Pending {
    deadline: Instant,
    seq: u64,
    kind: EventKind,
}

/// Deadline-ordered debounce timers keyed by path.
#[derive(Debug)]
pub struct DebounceScheduler {
    window: Duration,
    deadlines: BTreeMap<(Instant, u64), PathBuf>,
    pending: HashMap<PathBuf, Pending>,
    next_seq: u64,
}

impl DebounceScheduler {
    /// Create a scheduler with the given quiet window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadlines: BTreeMap::new(),
            pending: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Record an event at `now`, resetting the path's timer.
    pub fn record(&mut self, path: PathBuf, kind: EventKind, now: Instant) {
        if let Some(old) = self.pending.remove(&path) {
            self.deadlines.remove(&(old.deadline, old.seq));
        }

        let deadline = now + self.window;
        let seq = self.next_seq;
        self.next_seq += 1;

        self.deadlines.insert((deadline, seq), path.clone());
        self.pending.insert(path, Pending { deadline, seq, kind });
    }

    /// Earliest pending deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Remove and return every path whose deadline is at or before `now`,
    /// earliest first.
    pub fn take_ready(&mut self, now: Instant) -> Vec<(PathBuf, EventKind)> {
        let mut ready = Vec::new();

        while let Some(entry) = self.deadlines.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let path = entry.remove();
            if let Some(pending) = self.pending.remove(&path) {
                ready.push((path, pending.kind));
            }
        }

        ready
    }

    /// Cancel every timer, returning how many were pending.
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.pending.len();
        self.deadlines.clear();
        self.pending.clear();
        cancelled
    }

    /// Number of paths waiting on a timer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no timer is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(100);

    #[test]
    fn test_single_event_fires_after_window() {
        let mut scheduler = DebounceScheduler::new(WINDOW);
        let t0 = Instant::now();
        scheduler.record(PathBuf::from("a.rs"), EventKind::Change, t0);

        assert_eq!(scheduler.next_deadline(), Some(t0 + WINDOW));
        assert!(scheduler.take_ready(t0 + Duration::from_millis(99)).is_empty());

        let ready = scheduler.take_ready(t0 + WINDOW);
        assert_eq!(ready, vec![(PathBuf::from("a.rs"), EventKind::Change)]);
        assert!(scheduler.is_empty());
        assert_eq!(scheduler.next_deadline(), None);
    }

    #[test]
    fn test_burst_coalesces_to_one() {
        let mut scheduler = DebounceScheduler::new(WINDOW);
        let t0 = Instant::now();

        for i in 0..20 {
            scheduler.record(
                PathBuf::from("hot.rs"),
                EventKind::Change,
                t0 + Duration::from_millis(i * 10),
            );
        }

        assert_eq!(scheduler.len(), 1);
        assert!(scheduler.take_ready(t0 + Duration::from_millis(250)).is_empty());

        let ready = scheduler.take_ready(t0 + Duration::from_millis(290));
        assert_eq!(ready.len(), 1);
    }

    #[test]
    fn test_latest_kind_wins() {
        let mut scheduler = DebounceScheduler::new(WINDOW);
        let t0 = Instant::now();
        scheduler.record(PathBuf::from("a.rs"), EventKind::Add, t0);
        scheduler.record(PathBuf::from("a.rs"), EventKind::Unlink, t0);

        let ready = scheduler.take_ready(t0 + WINDOW);
        assert_eq!(ready, vec![(PathBuf::from("a.rs"), EventKind::Unlink)]);
    }

    #[test]
    fn test_ready_in_deadline_order() {
        let mut scheduler = DebounceScheduler::new(WINDOW);
        let t0 = Instant::now();
        scheduler.record(PathBuf::from("b.rs"), EventKind::Change, t0);
        scheduler.record(PathBuf::from("a.rs"), EventKind::Change, t0 + Duration::from_millis(5));
        scheduler.record(PathBuf::from("c.rs"), EventKind::Change, t0 + Duration::from_millis(50));

        let ready: Vec<_> = scheduler
            .take_ready(t0 + Duration::from_millis(105))
            .into_iter()
            .map(|(p, _)| p)
            .collect();
        assert_eq!(ready, vec![PathBuf::from("b.rs"), PathBuf::from("a.rs")]);
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_cancel_all() {
        let mut scheduler = DebounceScheduler::new(WINDOW);
        let t0 = Instant::now();
        scheduler.record(PathBuf::from("a.rs"), EventKind::Add, t0);
        scheduler.record(PathBuf::from("b.rs"), EventKind::Add, t0);

        assert_eq!(scheduler.cancel_all(), 2);
        assert!(scheduler.take_ready(t0 + WINDOW * 10).is_empty());
        assert_eq!(scheduler.next_deadline(), None);
    }
}
