//! Queue service shared by the webhook pipeline, the drift poller, manual
//! triggers, and workers.

use crate::binding::domain::{BranchName, CommitSha, OrgId, ProjectId};
use crate::health::SyncMetrics;
use crate::sync_job::{
    domain::{
        DEFAULT_MAX_ATTEMPTS, JobFailure, NewSyncJob, RetryPolicy, SourceEventId, SyncJob,
        SyncJobDomainError, SyncJobId, SyncJobType,
    },
    ports::{EnqueueOutcome, SyncJobStore, SyncJobStoreError},
};
use mockable::Clock;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Error class workers report for upstream rate limiting.
pub const RATE_LIMITED_ERROR_CLASS: &str = "rate_limited";

/// Request to place work on the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct EnqueueRequest {
    org_id: OrgId,
    project_id: Option<ProjectId>,
    job_type: SyncJobType,
    payload: Value,
    source_event_id: Option<SourceEventId>,
    max_attempts: Option<u32>,
}

impl EnqueueRequest {
    /// Creates a request for a known job type.
    #[must_use]
    pub const fn new(org_id: OrgId, job_type: SyncJobType, payload: Value) -> Self {
        Self {
            org_id,
            project_id: None,
            job_type,
            payload,
            source_event_id: None,
            max_attempts: None,
        }
    }

    /// Creates a request from an untrusted job type tag.
    ///
    /// # Errors
    ///
    /// Returns [`SyncJobDomainError::UnknownJobType`] for tags outside the
    /// closed set.
    pub fn from_tag(org_id: OrgId, job_type: &str, payload: Value) -> Result<Self, SyncJobDomainError> {
        Ok(Self::new(org_id, SyncJobType::try_from(job_type)?, payload))
    }

    /// Scopes the job to a project.
    #[must_use]
    pub const fn with_project(mut self, project_id: Option<ProjectId>) -> Self {
        self.project_id = project_id;
        self
    }

    /// Sets the idempotency key.
    #[must_use]
    pub fn with_source_event_id(mut self, key: SourceEventId) -> Self {
        self.source_event_id = Some(key);
        self
    }

    /// Overrides the queue's default attempt budget.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

/// Tunables applied to every job the queue creates or fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSettings {
    /// Attempt budget used when a request does not set one.
    pub default_max_attempts: u32,
    /// Backoff applied to retryable failures.
    pub retry_policy: RetryPolicy,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            default_max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// Service-level errors for queue operations.
#[derive(Debug, Error)]
pub enum SyncJobQueueError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] SyncJobDomainError),
    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] SyncJobStoreError),
}

/// Result type for queue service operations.
pub type SyncJobQueueResult<T> = Result<T, SyncJobQueueError>;

/// Queue orchestration over a [`SyncJobStore`].
pub struct SyncJobQueue<S, C>
where
    S: SyncJobStore + ?Sized,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
    settings: QueueSettings,
    metrics: Option<Arc<SyncMetrics>>,
}

impl<S, C> SyncJobQueue<S, C>
where
    S: SyncJobStore + ?Sized,
    C: Clock + Send + Sync,
{
    /// Creates a queue with default settings and no metrics.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self {
            store,
            clock,
            settings: QueueSettings::default(),
            metrics: None,
        }
    }

    /// Replaces the queue settings.
    #[must_use]
    pub const fn with_settings(mut self, settings: QueueSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Records lease, completion, and throttling counters.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<SyncMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the queue clock.
    #[must_use]
    pub fn clock(&self) -> &Arc<C> {
        &self.clock
    }

    /// Enqueues a job with insert-or-return-existing semantics.
    ///
    /// # Errors
    ///
    /// Returns [`SyncJobQueueError`] when the attempt budget is invalid or
    /// the store fails.
    pub async fn enqueue(&self, request: EnqueueRequest) -> SyncJobQueueResult<EnqueueOutcome> {
        let EnqueueRequest {
            org_id,
            project_id,
            job_type,
            payload,
            source_event_id,
            max_attempts,
        } = request;

        let mut new_job = NewSyncJob::new(org_id, job_type, payload)
            .with_max_attempts(max_attempts.unwrap_or(self.settings.default_max_attempts))?;
        if let Some(project) = project_id {
            new_job = new_job.with_project(project);
        }
        if let Some(key) = source_event_id {
            new_job = new_job.with_source_event_id(key);
        }

        let job = SyncJob::new(new_job, &*self.clock);
        let outcome = self.store.enqueue(&job).await?;
        if outcome.created {
            info!(
                job_id = %outcome.job.id(),
                job_type = %job_type,
                org_id = %org_id,
                "sync job enqueued"
            );
        } else {
            debug!(
                job_id = %outcome.job.id(),
                job_type = %job_type,
                "sync job already enqueued for idempotency key"
            );
        }
        Ok(outcome)
    }

    /// Enqueues a `repo_sync` job unless one for the same project, branch,
    /// and head is already queued or in progress.
    ///
    /// Webhook and poller jobs carry different idempotency keys, so this
    /// lookup is what keeps the two channels from queuing one observed head
    /// twice. Without a project or head the request is enqueued as is.
    ///
    /// # Errors
    ///
    /// Returns [`SyncJobQueueError`] when the lookup or the enqueue fails.
    pub async fn enqueue_repo_sync(
        &self,
        request: EnqueueRequest,
        branch: &BranchName,
        head_sha: Option<&CommitSha>,
    ) -> SyncJobQueueResult<EnqueueOutcome> {
        if let (Some(project_id), Some(head)) = (request.project_id, head_sha)
            && let Some(pending) = self
                .store
                .find_pending_repo_sync(project_id, branch, head)
                .await?
        {
            debug!(
                job_id = %pending.id(),
                project_id = %project_id,
                branch = %branch,
                "repo sync for this head already pending"
            );
            return Ok(EnqueueOutcome {
                job: pending,
                created: false,
            });
        }
        self.enqueue(request).await
    }

    /// Leases the next eligible job of a type.
    ///
    /// # Errors
    ///
    /// Returns [`SyncJobQueueError::Store`] when the store fails.
    pub async fn pickup_next(&self, job_type: SyncJobType) -> SyncJobQueueResult<Option<SyncJob>> {
        let leased = self.store.pickup_next(job_type, self.clock.utc()).await?;
        if let Some(job) = &leased {
            self.with_counters(|metrics| metrics.record_picked(job_type));
            debug!(job_id = %job.id(), job_type = %job_type, "sync job leased");
        }
        Ok(leased)
    }

    /// Completes a leased job.
    ///
    /// # Errors
    ///
    /// Returns [`SyncJobQueueError::Store`] for unknown jobs, jobs that are
    /// not in progress, and store failures.
    pub async fn mark_completed(&self, id: SyncJobId) -> SyncJobQueueResult<SyncJob> {
        let job = self.store.mark_completed(id, self.clock.utc()).await?;
        self.with_counters(|metrics| metrics.record_completed(job.job_type()));
        info!(job_id = %id, job_type = %job.job_type(), "sync job completed");
        Ok(job)
    }

    /// Records a worker failure against a leased job.
    ///
    /// # Errors
    ///
    /// Returns [`SyncJobQueueError`] for a blank error class, unknown jobs,
    /// jobs that are not in progress, and store failures.
    pub async fn record_failure(
        &self,
        id: SyncJobId,
        error_class: &str,
        error_message: &str,
        retryable: bool,
    ) -> SyncJobQueueResult<SyncJob> {
        let failure = JobFailure::new(error_class, error_message, retryable, self.clock.utc())?;
        let job = self
            .store
            .record_failure(id, &failure, &self.settings.retry_policy)
            .await?;

        if failure.error_class() == RATE_LIMITED_ERROR_CLASS {
            self.with_counters(|metrics| metrics.record_throttled(job.job_type()));
        }
        warn!(
            job_id = %id,
            job_type = %job.job_type(),
            status = %job.status(),
            attempts = job.attempts(),
            error_class = failure.error_class(),
            "sync job failed"
        );
        Ok(job)
    }

    /// Returns the latest job of a type for a project.
    ///
    /// # Errors
    ///
    /// Returns [`SyncJobQueueError::Store`] when the store fails.
    pub async fn latest_for_project(
        &self,
        project_id: ProjectId,
        job_type: SyncJobType,
    ) -> SyncJobQueueResult<Option<SyncJob>> {
        Ok(self
            .store
            .find_latest_by_project_and_type(project_id, job_type)
            .await?)
    }

    fn with_counters(&self, record: impl FnOnce(&SyncMetrics)) {
        if let Some(metrics) = &self.metrics {
            record(metrics);
        }
    }
}
