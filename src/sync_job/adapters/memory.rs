//! In-memory sync job store for tests and single-process runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use crate::binding::domain::{BranchName, CommitSha, OrgId, ProjectId};
use crate::sync_job::{
    domain::{
        JobFailure, RepoSyncPayload, RetryPolicy, SourceEventId, SyncJob, SyncJobId,
        SyncJobStatus, SyncJobType,
    },
    ports::{EnqueueOutcome, QueueDepth, SyncJobStore, SyncJobStoreError, SyncJobStoreResult},
};

type IdempotencyKey = (OrgId, SyncJobType, SourceEventId);

/// Thread-safe in-memory job queue.
///
/// A single write lock serialises every claim, which gives the same
/// at-most-one-leaser guarantee the database adapter gets from row locks.
#[derive(Debug, Clone, Default)]
pub struct InMemorySyncJobStore {
    state: Arc<RwLock<InMemorySyncJobState>>,
}

#[derive(Debug, Default)]
struct InMemorySyncJobState {
    jobs: HashMap<SyncJobId, SyncJob>,
    idempotency_index: HashMap<IdempotencyKey, SyncJobId>,
}

impl InMemorySyncJobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every stored job, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a persistence error when the lock is poisoned.
    pub fn snapshot(&self) -> SyncJobStoreResult<Vec<SyncJob>> {
        let state = self.state.read().map_err(poisoned)?;
        let mut jobs: Vec<SyncJob> = state.jobs.values().cloned().collect();
        jobs.sort_by_key(|job| (job.created_at(), job.id()));
        Ok(jobs)
    }
}

fn poisoned(err: impl std::fmt::Display) -> SyncJobStoreError {
    SyncJobStoreError::persistence(std::io::Error::other(err.to_string()))
}

fn idempotency_key(job: &SyncJob) -> Option<IdempotencyKey> {
    job.source_event_id()
        .map(|key| (job.org_id(), job.job_type(), key.clone()))
}

fn job_mut(state: &mut InMemorySyncJobState, id: SyncJobId) -> SyncJobStoreResult<&mut SyncJob> {
    state.jobs.get_mut(&id).ok_or(SyncJobStoreError::NotFound(id))
}

#[async_trait]
impl SyncJobStore for InMemorySyncJobStore {
    async fn enqueue(&self, job: &SyncJob) -> SyncJobStoreResult<EnqueueOutcome> {
        let mut state = self.state.write().map_err(poisoned)?;
        let key = idempotency_key(job);

        let existing = key
            .as_ref()
            .and_then(|lookup| state.idempotency_index.get(lookup))
            .and_then(|id| state.jobs.get(id))
            .cloned();
        if let Some(existing_job) = existing {
            return Ok(EnqueueOutcome {
                job: existing_job,
                created: false,
            });
        }

        if let Some(index_key) = key {
            state.idempotency_index.insert(index_key, job.id());
        }
        state.jobs.insert(job.id(), job.clone());
        Ok(EnqueueOutcome {
            job: job.clone(),
            created: true,
        })
    }

    async fn pickup_next(
        &self,
        job_type: SyncJobType,
        now: DateTime<Utc>,
    ) -> SyncJobStoreResult<Option<SyncJob>> {
        let mut state = self.state.write().map_err(poisoned)?;
        let next_id = state
            .jobs
            .values()
            .filter(|job| job.job_type() == job_type && job.is_leasable_at(now))
            .min_by_key(|job| (job.available_at(), job.created_at(), job.id()))
            .map(SyncJob::id);

        let Some(id) = next_id else {
            return Ok(None);
        };
        let job = job_mut(&mut state, id)?;
        job.lease(now)?;
        Ok(Some(job.clone()))
    }

    async fn mark_completed(&self, id: SyncJobId, now: DateTime<Utc>) -> SyncJobStoreResult<SyncJob> {
        let mut state = self.state.write().map_err(poisoned)?;
        let job = job_mut(&mut state, id)?;
        job.complete(now)?;
        Ok(job.clone())
    }

    async fn record_failure(
        &self,
        id: SyncJobId,
        failure: &JobFailure,
        policy: &RetryPolicy,
    ) -> SyncJobStoreResult<SyncJob> {
        let mut state = self.state.write().map_err(poisoned)?;
        let job = job_mut(&mut state, id)?;
        job.record_failure(failure, policy)?;
        Ok(job.clone())
    }

    async fn queue_depth(&self) -> SyncJobStoreResult<Vec<QueueDepth>> {
        let state = self.state.read().map_err(poisoned)?;
        let mut depths: BTreeMap<SyncJobType, QueueDepth> = BTreeMap::new();
        for job in state.jobs.values() {
            let entry = depths.entry(job.job_type()).or_insert(QueueDepth {
                job_type: job.job_type(),
                queued: 0,
                in_progress: 0,
            });
            match job.status() {
                SyncJobStatus::Queued => entry.queued += 1,
                SyncJobStatus::InProgress => entry.in_progress += 1,
                SyncJobStatus::Completed | SyncJobStatus::DeadLetter => {}
            }
        }
        Ok(depths
            .into_values()
            .filter(|depth| depth.queued > 0 || depth.in_progress > 0)
            .collect())
    }

    async fn count_stuck(&self, older_than: DateTime<Utc>) -> SyncJobStoreResult<u64> {
        let state = self.state.read().map_err(poisoned)?;
        let count = state
            .jobs
            .values()
            .filter(|job| job.status() == SyncJobStatus::InProgress && job.updated_at() < older_than)
            .count();
        u64::try_from(count).map_err(SyncJobStoreError::persistence)
    }

    async fn find_latest_by_project_and_type(
        &self,
        project_id: ProjectId,
        job_type: SyncJobType,
    ) -> SyncJobStoreResult<Option<SyncJob>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .jobs
            .values()
            .filter(|job| job.project_id() == Some(project_id) && job.job_type() == job_type)
            .max_by_key(|job| (job.created_at(), job.id()))
            .cloned())
    }

    async fn find_pending_repo_sync(
        &self,
        project_id: ProjectId,
        branch: &BranchName,
        head_sha: &CommitSha,
    ) -> SyncJobStoreResult<Option<SyncJob>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .jobs
            .values()
            .filter(|job| {
                job.job_type() == SyncJobType::RepoSync
                    && job.project_id() == Some(project_id)
                    && !job.status().is_terminal()
                    && RepoSyncPayload::targets_head(job.payload(), branch, head_sha)
            })
            .min_by_key(|job| (job.created_at(), job.id()))
            .cloned())
    }

    async fn find_by_id(&self, id: SyncJobId) -> SyncJobStoreResult<Option<SyncJob>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.jobs.get(&id).cloned())
    }
}
