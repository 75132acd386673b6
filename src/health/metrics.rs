//! Externally maintained sync counters consumed by the health reporter.
//!
//! Every recording is also emitted through the `metrics` facade so an
//! installed exporter sees the same counters the health endpoint reports.

use crate::sync_job::domain::SyncJobType;
use ::metrics::{counter, describe_counter, describe_gauge, gauge};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// Jobs leased by workers, labelled by `job_type`.
pub const JOBS_PICKED: &str = "reposync_jobs_picked_total";

/// Jobs completed successfully, labelled by `job_type`.
pub const JOBS_COMPLETED: &str = "reposync_jobs_completed_total";

/// Failures attributed to upstream rate limiting, labelled by `job_type`.
pub const JOBS_THROTTLED: &str = "reposync_jobs_throttled_total";

/// Last reported upstream API quota.
pub const QUOTA_REMAINING: &str = "reposync_quota_remaining";

/// Registers descriptions for the sync metrics.
///
/// Call once at startup after installing a recorder.
pub fn register_metrics() {
    describe_counter!(JOBS_PICKED, "Total sync jobs leased by workers");
    describe_counter!(JOBS_COMPLETED, "Total sync jobs completed");
    describe_counter!(JOBS_THROTTLED, "Total sync job failures caused by rate limiting");
    describe_gauge!(QUOTA_REMAINING, "Remaining upstream API quota");
}

/// Counters for one job type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobTypeCounters {
    /// Jobs leased by workers.
    pub picked: u64,
    /// Jobs completed successfully.
    pub completed: u64,
    /// Failures attributed to upstream rate limiting.
    pub throttled: u64,
}

/// Point-in-time copy of the sync counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Counters keyed by job type tag.
    pub job_types: BTreeMap<String, JobTypeCounters>,
    /// Remaining upstream API quota, when known.
    pub quota_remaining: Option<u64>,
}

/// Read-only source of a [`MetricsSnapshot`].
#[cfg_attr(test, mockall::automock)]
pub trait MetricsSource: Send + Sync {
    /// Returns the current counters.
    fn snapshot(&self) -> MetricsSnapshot;
}

/// In-process counter store.
#[derive(Debug, Default)]
pub struct SyncMetrics {
    state: Mutex<SyncMetricsState>,
}

#[derive(Debug, Default)]
struct SyncMetricsState {
    counters: BTreeMap<SyncJobType, JobTypeCounters>,
    quota_remaining: Option<u64>,
}

impl SyncMetrics {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a leased job.
    pub fn record_picked(&self, job_type: SyncJobType) {
        counter!(JOBS_PICKED, "job_type" => job_type.as_str()).increment(1);
        self.update(job_type, |counters| counters.picked += 1);
    }

    /// Counts a completed job.
    pub fn record_completed(&self, job_type: SyncJobType) {
        counter!(JOBS_COMPLETED, "job_type" => job_type.as_str()).increment(1);
        self.update(job_type, |counters| counters.completed += 1);
    }

    /// Counts a rate-limited failure.
    pub fn record_throttled(&self, job_type: SyncJobType) {
        counter!(JOBS_THROTTLED, "job_type" => job_type.as_str()).increment(1);
        self.update(job_type, |counters| counters.throttled += 1);
    }

    /// Records the latest upstream quota reading.
    pub fn set_quota_remaining(&self, remaining: Option<u64>) {
        if let Some(value) = remaining {
            gauge!(QUOTA_REMAINING).set(f64::from(u32::try_from(value).unwrap_or(u32::MAX)));
        }
        self.lock().quota_remaining = remaining;
    }

    fn update(&self, job_type: SyncJobType, apply: impl FnOnce(&mut JobTypeCounters)) {
        let mut state = self.lock();
        apply(state.counters.entry(job_type).or_default());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SyncMetricsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MetricsSource for SyncMetrics {
    fn snapshot(&self) -> MetricsSnapshot {
        let state = self.lock();
        MetricsSnapshot {
            job_types: state
                .counters
                .iter()
                .map(|(job_type, counters)| (job_type.as_str().to_owned(), *counters))
                .collect(),
            quota_remaining: state.quota_remaining,
        }
    }
}
