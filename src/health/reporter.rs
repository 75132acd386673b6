//! Read-only aggregation of queue, metrics, and poller state.

use super::metrics::{MetricsSnapshot, MetricsSource};
use crate::drift::{PollerSnapshot, PollerSnapshotCell};
use crate::sync_job::ports::{QueueDepth, SyncJobStore, SyncJobStoreError};
use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by [`SyncHealthReporter::report`].
#[derive(Debug, Error)]
pub enum SyncHealthError {
    /// The threshold reaches before the representable time range.
    #[error("stuck threshold {0:?} is out of range")]
    ThresholdOutOfRange(Duration),
    /// The job store failed.
    #[error(transparent)]
    Store(#[from] SyncJobStoreError),
}

/// Health response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncHealthReport {
    /// Queued and in-progress counts per job type.
    pub queue_depth: Vec<QueueDepth>,
    /// In-progress jobs not touched within the threshold.
    pub stuck_jobs: u64,
    /// Threshold used for `stuck_jobs`, in seconds.
    pub stuck_threshold_secs: u64,
    /// Externally maintained counters.
    pub metrics: MetricsSnapshot,
    /// Most recent drift poll.
    pub poller: PollerSnapshot,
    /// When the report was assembled.
    pub generated_at: DateTime<Utc>,
}

/// Assembles [`SyncHealthReport`]s without mutating anything.
pub struct SyncHealthReporter<S, C>
where
    S: SyncJobStore + ?Sized,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
    metrics: Arc<dyn MetricsSource>,
    poller: PollerSnapshotCell,
}

impl<S, C> SyncHealthReporter<S, C>
where
    S: SyncJobStore + ?Sized,
    C: Clock + Send + Sync,
{
    /// Creates a reporter over its read sources.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        clock: Arc<C>,
        metrics: Arc<dyn MetricsSource>,
        poller: PollerSnapshotCell,
    ) -> Self {
        Self {
            store,
            clock,
            metrics,
            poller,
        }
    }

    /// Builds a report, counting in-progress jobs whose last update is older
    /// than `stuck_threshold`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncHealthError`] when the threshold cannot be applied or a
    /// store query fails.
    pub async fn report(&self, stuck_threshold: Duration) -> Result<SyncHealthReport, SyncHealthError> {
        let generated_at = self.clock.utc();
        let cutoff = TimeDelta::from_std(stuck_threshold)
            .ok()
            .and_then(|delta| generated_at.checked_sub_signed(delta))
            .ok_or(SyncHealthError::ThresholdOutOfRange(stuck_threshold))?;

        let queue_depth = self.store.queue_depth().await?;
        let stuck_jobs = self.store.count_stuck(cutoff).await?;

        Ok(SyncHealthReport {
            queue_depth,
            stuck_jobs,
            stuck_threshold_secs: stuck_threshold.as_secs(),
            metrics: self.metrics.snapshot(),
            poller: self.poller.get(),
            generated_at,
        })
    }
}
