//! In-memory binding directory for tests and local runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::binding::{
    domain::{
        BranchName, CommitSha, InstallationId, OrgId, ProjectId, RepoBinding, RepositoryFullName,
    },
    ports::{BindingDirectory, BindingDirectoryError, BindingDirectoryResult},
};

/// Thread-safe in-memory binding directory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBindingDirectory {
    state: Arc<RwLock<InMemoryBindingState>>,
}

#[derive(Debug, Default)]
struct InMemoryBindingState {
    installations: HashMap<InstallationId, OrgId>,
    bindings: HashMap<ProjectId, RepoBinding>,
}

impl InMemoryBindingDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a binding keyed by its project.
    ///
    /// # Errors
    ///
    /// Returns a persistence error when the lock is poisoned.
    pub fn upsert_binding(&self, binding: RepoBinding) -> BindingDirectoryResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.bindings.insert(binding.project_id(), binding);
        Ok(())
    }
}

fn poisoned(err: impl std::fmt::Display) -> BindingDirectoryError {
    BindingDirectoryError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl BindingDirectory for InMemoryBindingDirectory {
    async fn workspace_for_installation(
        &self,
        installation_id: InstallationId,
    ) -> BindingDirectoryResult<Option<OrgId>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.installations.get(&installation_id).copied())
    }

    async fn workspace_for_repository(
        &self,
        repository: &RepositoryFullName,
    ) -> BindingDirectoryResult<Option<OrgId>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .bindings
            .values()
            .find(|binding| binding.repository() == repository)
            .map(RepoBinding::org_id))
    }

    async fn binding_for_repository(
        &self,
        org_id: OrgId,
        repository: &RepositoryFullName,
    ) -> BindingDirectoryResult<Option<RepoBinding>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .bindings
            .values()
            .find(|binding| binding.org_id() == org_id && binding.repository() == repository)
            .cloned())
    }

    async fn binding_for_project(
        &self,
        project_id: ProjectId,
    ) -> BindingDirectoryResult<Option<RepoBinding>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.bindings.get(&project_id).cloned())
    }

    async fn tracked_bindings(&self) -> BindingDirectoryResult<Vec<RepoBinding>> {
        let state = self.state.read().map_err(poisoned)?;
        let mut bindings: Vec<RepoBinding> = state
            .bindings
            .values()
            .filter(|binding| binding.is_enabled())
            .cloned()
            .collect();
        bindings.sort_by_key(RepoBinding::project_id);
        Ok(bindings)
    }

    async fn record_installation(
        &self,
        org_id: OrgId,
        installation_id: InstallationId,
    ) -> BindingDirectoryResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.installations.insert(installation_id, org_id);
        Ok(())
    }

    async fn record_synced_commit(
        &self,
        project_id: ProjectId,
        branch: &BranchName,
        sha: &CommitSha,
        synced_at: DateTime<Utc>,
    ) -> BindingDirectoryResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        let binding = state
            .bindings
            .get_mut(&project_id)
            .ok_or(BindingDirectoryError::ProjectNotFound(project_id))?;
        if binding.record_synced_commit(branch, sha.clone(), synced_at) {
            Ok(())
        } else {
            Err(BindingDirectoryError::BranchNotTracked {
                project_id,
                branch: branch.clone(),
            })
        }
    }
}
