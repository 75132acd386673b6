//! Store port for the durable sync job queue.

use crate::binding::domain::{BranchName, CommitSha, ProjectId};
use crate::sync_job::domain::{
    JobFailure, RetryPolicy, SyncJob, SyncJobDomainError, SyncJobId, SyncJobStatus, SyncJobType,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Result type for sync job store operations.
pub type SyncJobStoreResult<T> = Result<T, SyncJobStoreError>;

/// Outcome of an insert-or-return-existing enqueue.
#[derive(Debug, Clone, PartialEq)]
pub struct EnqueueOutcome {
    /// The stored job: the new row, or the one already holding the key.
    pub job: SyncJob,
    /// `true` when this call inserted the job.
    pub created: bool,
}

/// Aggregate counts for one job type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueDepth {
    /// Job type.
    pub job_type: SyncJobType,
    /// Jobs waiting to be leased.
    pub queued: u64,
    /// Jobs currently leased.
    pub in_progress: u64,
}

/// Durable work queue contract.
///
/// Implementations must enforce the single-claim guarantee of
/// [`Self::pickup_next`] at the storage layer so it holds across processes.
#[async_trait]
pub trait SyncJobStore: Send + Sync {
    /// Inserts a queued job, or returns the job already stored under the same
    /// `(org_id, job_type, source_event_id)` key.
    ///
    /// A conflicting key is never an error.
    async fn enqueue(&self, job: &SyncJob) -> SyncJobStoreResult<EnqueueOutcome>;

    /// Atomically leases the oldest eligible queued job of `job_type`.
    ///
    /// Eligibility means `available_at <= now`; ordering is `available_at`
    /// then `created_at`. Returns `None` when nothing is eligible.
    async fn pickup_next(
        &self,
        job_type: SyncJobType,
        now: DateTime<Utc>,
    ) -> SyncJobStoreResult<Option<SyncJob>>;

    /// Transitions a leased job to `completed`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncJobStoreError::NotFound`] for unknown jobs and
    /// [`SyncJobStoreError::InvalidTransition`] when the job is not in
    /// progress.
    async fn mark_completed(&self, id: SyncJobId, now: DateTime<Utc>) -> SyncJobStoreResult<SyncJob>;

    /// Records a failure against a leased job, re-queueing it with backoff or
    /// dead-lettering it.
    ///
    /// # Errors
    ///
    /// Returns [`SyncJobStoreError::NotFound`] for unknown jobs and
    /// [`SyncJobStoreError::InvalidTransition`] when the job is not in
    /// progress.
    async fn record_failure(
        &self,
        id: SyncJobId,
        failure: &JobFailure,
        policy: &RetryPolicy,
    ) -> SyncJobStoreResult<SyncJob>;

    /// Returns queued and in-progress counts for every job type that has
    /// any, ordered by job type.
    async fn queue_depth(&self) -> SyncJobStoreResult<Vec<QueueDepth>>;

    /// Counts in-progress jobs whose `updated_at` is before `older_than`.
    async fn count_stuck(&self, older_than: DateTime<Utc>) -> SyncJobStoreResult<u64>;

    /// Returns the most recently created job of a type for a project.
    async fn find_latest_by_project_and_type(
        &self,
        project_id: ProjectId,
        job_type: SyncJobType,
    ) -> SyncJobStoreResult<Option<SyncJob>>;

    /// Returns a queued or in-progress `repo_sync` job of `project_id` whose
    /// payload targets `branch` at `head_sha`, whichever channel enqueued it.
    async fn find_pending_repo_sync(
        &self,
        project_id: ProjectId,
        branch: &BranchName,
        head_sha: &CommitSha,
    ) -> SyncJobStoreResult<Option<SyncJob>>;

    /// Finds a job by identifier.
    async fn find_by_id(&self, id: SyncJobId) -> SyncJobStoreResult<Option<SyncJob>>;
}

/// Errors returned by sync job store implementations.
#[derive(Debug, Clone, Error)]
pub enum SyncJobStoreError {
    /// The job does not exist.
    #[error("sync job not found: {0}")]
    NotFound(SyncJobId),

    /// The job is not in a state that permits the requested transition.
    #[error("sync job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Job identifier.
        id: SyncJobId,
        /// Current status.
        from: SyncJobStatus,
        /// Requested status.
        to: SyncJobStatus,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl SyncJobStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

impl From<SyncJobDomainError> for SyncJobStoreError {
    fn from(err: SyncJobDomainError) -> Self {
        match err {
            SyncJobDomainError::InvalidTransition { job_id, from, to } => {
                Self::InvalidTransition { id: job_id, from, to }
            }
            other => Self::persistence(other),
        }
    }
}
