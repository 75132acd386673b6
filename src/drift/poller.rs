//! Periodic reconciliation of tracked branches against remote heads.

use super::ports::{BranchHeadError, BranchHeadSource};
use super::snapshot::{PollReport, PollerSnapshotCell};
use crate::binding::{
    domain::{RepoBinding, TrackedBranch},
    ports::{BindingDirectory, BindingDirectoryError},
};
use crate::sync_job::{
    domain::{RepoSyncPayload, SyncJobDomainError, SyncJobType, SyncReason, poller_repo_sync_key},
    ports::SyncJobStore,
    services::{EnqueueRequest, SyncJobQueue, SyncJobQueueError},
};
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default time between poll cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default bound on a single remote head lookup.
pub const DEFAULT_BRANCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors that abort a whole poll cycle.
#[derive(Debug, Error)]
pub enum DriftPollError {
    /// The tracked bindings could not be listed.
    #[error(transparent)]
    Bindings(#[from] BindingDirectoryError),
}

#[derive(Debug, Error)]
enum BranchPollError {
    #[error("poll cancelled")]
    Cancelled,
    #[error("head lookup timed out after {0:?}")]
    TimedOut(Duration),
    #[error(transparent)]
    Head(#[from] BranchHeadError),
    #[error(transparent)]
    Key(#[from] SyncJobDomainError),
    #[error(transparent)]
    Queue(#[from] SyncJobQueueError),
}

enum BranchOutcome {
    UpToDate,
    AlreadyQueued,
    Enqueued,
}

/// Enqueues `repo_sync` work for tracked branches whose remote head moved.
///
/// [`DriftPoller::run_once`] has no re-entrancy guard: callers must not run
/// cycles concurrently. [`DriftPoller::run_every`] awaits each cycle before
/// the next tick and so satisfies this.
pub struct DriftPoller<S, C>
where
    S: SyncJobStore + ?Sized,
    C: Clock + Send + Sync,
{
    queue: Arc<SyncJobQueue<S, C>>,
    bindings: Arc<dyn BindingDirectory>,
    heads: Arc<dyn BranchHeadSource>,
    snapshot: PollerSnapshotCell,
    branch_timeout: Duration,
}

impl<S, C> DriftPoller<S, C>
where
    S: SyncJobStore + ?Sized,
    C: Clock + Send + Sync,
{
    /// Creates a poller with the default branch timeout and a fresh
    /// snapshot cell.
    #[must_use]
    pub fn new(
        queue: Arc<SyncJobQueue<S, C>>,
        bindings: Arc<dyn BindingDirectory>,
        heads: Arc<dyn BranchHeadSource>,
    ) -> Self {
        Self {
            queue,
            bindings,
            heads,
            snapshot: PollerSnapshotCell::new(),
            branch_timeout: DEFAULT_BRANCH_TIMEOUT,
        }
    }

    /// Bounds each remote head lookup.
    #[must_use]
    pub const fn with_branch_timeout(mut self, timeout: Duration) -> Self {
        self.branch_timeout = timeout;
        self
    }

    /// Publishes cycle results into `cell`.
    #[must_use]
    pub fn with_snapshot(mut self, cell: PollerSnapshotCell) -> Self {
        self.snapshot = cell;
        self
    }

    /// Returns the cell this poller publishes into.
    #[must_use]
    pub const fn snapshot(&self) -> &PollerSnapshotCell {
        &self.snapshot
    }

    /// Runs one reconciliation cycle over every enabled binding.
    ///
    /// Each branch is handled independently: a failed or timed-out lookup,
    /// or a failed enqueue, is counted and skipped. Cancellation stops the
    /// cycle after the branch in flight and returns the partial report.
    ///
    /// # Errors
    ///
    /// Returns [`DriftPollError::Bindings`] when the tracked bindings cannot
    /// be listed.
    pub async fn run_once(&self, cancel: &CancellationToken) -> Result<PollReport, DriftPollError> {
        self.snapshot.record_start(self.queue.clock().utc());
        let bindings = self.bindings.tracked_bindings().await?;

        let mut report = PollReport::default();
        'bindings: for binding in &bindings {
            for branch in binding.tracked_branches() {
                if cancel.is_cancelled() {
                    break 'bindings;
                }
                match self.poll_branch(binding, branch, cancel).await {
                    Ok(outcome) => {
                        report.branches_checked += 1;
                        if matches!(outcome, BranchOutcome::Enqueued) {
                            report.jobs_enqueued += 1;
                        }
                    }
                    Err(BranchPollError::Cancelled) => break 'bindings,
                    Err(err) => {
                        report.failures += 1;
                        warn!(
                            project_id = %binding.project_id(),
                            branch = %branch.name(),
                            error = %err,
                            "drift check failed for branch"
                        );
                    }
                }
            }
        }

        self.snapshot.record_finish(self.queue.clock().utc(), report);
        info!(
            branches_checked = report.branches_checked,
            jobs_enqueued = report.jobs_enqueued,
            failures = report.failures,
            cancelled = cancel.is_cancelled(),
            "drift poll cycle finished"
        );
        Ok(report)
    }

    /// Runs a cycle on every tick of `interval` until `cancel` fires.
    ///
    /// The first cycle starts immediately. Ticks missed while a cycle runs
    /// are delayed rather than bunched up.
    pub async fn run_every(&self, interval: Duration, cancel: &CancellationToken) {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _instant = ticker.tick() => {}
            }
            if let Err(err) = self.run_once(cancel).await {
                warn!(error = %err, "drift poll cycle aborted");
            }
        }
        info!("drift poller stopped");
    }

    async fn poll_branch(
        &self,
        binding: &RepoBinding,
        branch: &TrackedBranch,
        cancel: &CancellationToken,
    ) -> Result<BranchOutcome, BranchPollError> {
        let lookup = tokio::time::timeout(
            self.branch_timeout,
            self.heads.branch_head(binding.repository(), branch.name()),
        );
        let head = tokio::select! {
            () = cancel.cancelled() => return Err(BranchPollError::Cancelled),
            result = lookup => result.map_err(|_elapsed| BranchPollError::TimedOut(self.branch_timeout))??,
        };

        if branch.last_synced_sha() == Some(&head) {
            debug!(
                project_id = %binding.project_id(),
                branch = %branch.name(),
                "branch is up to date"
            );
            return Ok(BranchOutcome::UpToDate);
        }

        let key = poller_repo_sync_key(
            binding.project_id(),
            branch.name(),
            &head,
            branch.last_synced_at(),
        )?;
        let payload = RepoSyncPayload::new(
            binding.repository().clone(),
            branch.name().clone(),
            SyncReason::Poller,
        )
        .with_head_sha(head.clone());
        let request = EnqueueRequest::new(binding.org_id(), SyncJobType::RepoSync, payload.to_value())
            .with_project(Some(binding.project_id()))
            .with_source_event_id(key);
        let outcome = self
            .queue
            .enqueue_repo_sync(request, branch.name(), Some(&head))
            .await?;

        if outcome.created {
            info!(
                project_id = %binding.project_id(),
                branch = %branch.name(),
                job_id = %outcome.job.id(),
                "drift detected, repo sync enqueued"
            );
            Ok(BranchOutcome::Enqueued)
        } else {
            Ok(BranchOutcome::AlreadyQueued)
        }
    }
}
