//! Last-run summary of the drift poller, shared with the health reporter.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};

/// Counts produced by one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollReport {
    /// Tracked branches whose remote head was compared.
    pub branches_checked: u64,
    /// `repo_sync` jobs newly created.
    pub jobs_enqueued: u64,
    /// Branches skipped because of a lookup, timeout, or enqueue failure.
    pub failures: u64,
}

/// Poller state as exposed on the health endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollerSnapshot {
    /// Start of the most recent cycle.
    pub last_started_at: Option<DateTime<Utc>>,
    /// End of the most recent completed cycle.
    pub last_finished_at: Option<DateTime<Utc>>,
    /// Branches checked by the most recent completed cycle.
    pub branches_checked: u64,
    /// Jobs enqueued by the most recent completed cycle.
    pub jobs_enqueued: u64,
    /// Branch failures in the most recent completed cycle.
    pub failures: u64,
}

/// Cloneable handle to the shared [`PollerSnapshot`].
#[derive(Debug, Clone, Default)]
pub struct PollerSnapshotCell {
    inner: Arc<RwLock<PollerSnapshot>>,
}

impl PollerSnapshotCell {
    /// Creates an empty cell.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current snapshot.
    #[must_use]
    pub fn get(&self) -> PollerSnapshot {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn record_start(&self, at: DateTime<Utc>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .last_started_at = Some(at);
    }

    pub(crate) fn record_finish(&self, at: DateTime<Utc>, report: PollReport) {
        let mut snapshot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        snapshot.last_finished_at = Some(at);
        snapshot.branches_checked = report.branches_checked;
        snapshot.jobs_enqueued = report.jobs_enqueued;
        snapshot.failures = report.failures;
    }
}
