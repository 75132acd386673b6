//! Operator-initiated repo-sync requests.

use super::{EnqueueRequest, SyncJobQueue, SyncJobQueueError};
use crate::binding::{
    domain::ProjectId,
    ports::{BindingDirectory, BindingDirectoryError},
};
use crate::sync_job::{
    domain::{RepoSyncPayload, SyncJob, SyncJobType, SyncReason},
    ports::SyncJobStore,
};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Errors returned by [`SyncTriggerService`].
#[derive(Debug, Error)]
pub enum SyncTriggerError {
    /// No binding exists for the project.
    #[error("project {0} has no repository binding")]
    ProjectNotFound(ProjectId),
    /// The binding exists but sync is disabled.
    #[error("sync is disabled for project {0}")]
    SyncDisabled(ProjectId),
    /// Binding lookup failed.
    #[error(transparent)]
    Bindings(#[from] BindingDirectoryError),
    /// Enqueue failed.
    #[error(transparent)]
    Queue(#[from] SyncJobQueueError),
}

/// Enqueues a `repo_sync` job for every tracked branch of a project.
pub struct SyncTriggerService<S, C>
where
    S: SyncJobStore + ?Sized,
    C: Clock + Send + Sync,
{
    queue: Arc<SyncJobQueue<S, C>>,
    bindings: Arc<dyn BindingDirectory>,
}

impl<S, C> SyncTriggerService<S, C>
where
    S: SyncJobStore + ?Sized,
    C: Clock + Send + Sync,
{
    /// Creates a trigger service.
    #[must_use]
    pub fn new(queue: Arc<SyncJobQueue<S, C>>, bindings: Arc<dyn BindingDirectory>) -> Self {
        Self { queue, bindings }
    }

    /// Enqueues one manual `repo_sync` job per tracked branch, default branch
    /// first.
    ///
    /// Manual jobs carry no idempotency key: every trigger is new work.
    ///
    /// # Errors
    ///
    /// Returns [`SyncTriggerError::ProjectNotFound`] or
    /// [`SyncTriggerError::SyncDisabled`] when the project cannot be synced,
    /// and propagates lookup and enqueue failures.
    pub async fn trigger_manual(&self, project_id: ProjectId) -> Result<Vec<SyncJob>, SyncTriggerError> {
        let binding = self
            .bindings
            .binding_for_project(project_id)
            .await?
            .ok_or(SyncTriggerError::ProjectNotFound(project_id))?;
        if !binding.is_enabled() {
            return Err(SyncTriggerError::SyncDisabled(project_id));
        }

        let mut jobs = Vec::new();
        for branch in binding.tracked_branches() {
            let payload = RepoSyncPayload::new(
                binding.repository().clone(),
                branch.name().clone(),
                SyncReason::Manual,
            );
            let request = EnqueueRequest::new(binding.org_id(), SyncJobType::RepoSync, payload.to_value())
                .with_project(Some(project_id));
            let outcome = self.queue.enqueue(request).await?;
            jobs.push(outcome.job);
        }

        info!(project_id = %project_id, jobs = jobs.len(), "manual sync triggered");
        Ok(jobs)
    }
}
