//! Lookup port over project bindings, installations, and tracked branches.
//!
//! The entity store behind this port belongs to the settings surface; the
//! sync core only reads it, apart from recording installations and synced
//! commits.

use crate::binding::domain::{
    BranchName, CommitSha, InstallationId, OrgId, ProjectId, RepoBinding, RepositoryFullName,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for binding directory operations.
pub type BindingDirectoryResult<T> = Result<T, BindingDirectoryError>;

/// Read access to bindings plus the two write paths the sync core owns.
#[async_trait]
pub trait BindingDirectory: Send + Sync {
    /// Resolves the workspace that owns an installation.
    async fn workspace_for_installation(
        &self,
        installation_id: InstallationId,
    ) -> BindingDirectoryResult<Option<OrgId>>;

    /// Resolves the workspace that has bound a repository to any project.
    async fn workspace_for_repository(
        &self,
        repository: &RepositoryFullName,
    ) -> BindingDirectoryResult<Option<OrgId>>;

    /// Finds the binding for a repository within a workspace.
    async fn binding_for_repository(
        &self,
        org_id: OrgId,
        repository: &RepositoryFullName,
    ) -> BindingDirectoryResult<Option<RepoBinding>>;

    /// Finds the binding for a project.
    async fn binding_for_project(
        &self,
        project_id: ProjectId,
    ) -> BindingDirectoryResult<Option<RepoBinding>>;

    /// Returns every enabled binding with its tracked branches.
    async fn tracked_bindings(&self) -> BindingDirectoryResult<Vec<RepoBinding>>;

    /// Associates an installation with a workspace, replacing any previous
    /// owner.
    async fn record_installation(
        &self,
        org_id: OrgId,
        installation_id: InstallationId,
    ) -> BindingDirectoryResult<()>;

    /// Stores the commit most recently synced for a tracked branch.
    ///
    /// # Errors
    ///
    /// Returns [`BindingDirectoryError::ProjectNotFound`] or
    /// [`BindingDirectoryError::BranchNotTracked`] when there is nothing to
    /// update.
    async fn record_synced_commit(
        &self,
        project_id: ProjectId,
        branch: &BranchName,
        sha: &CommitSha,
        synced_at: DateTime<Utc>,
    ) -> BindingDirectoryResult<()>;
}

/// Errors returned by binding directory implementations.
#[derive(Debug, Clone, Error)]
pub enum BindingDirectoryError {
    /// No binding exists for the project.
    #[error("no repository binding for project {0}")]
    ProjectNotFound(ProjectId),

    /// The branch is neither the default nor an active branch.
    #[error("branch {branch} is not tracked for project {project_id}")]
    BranchNotTracked {
        /// Project identifier.
        project_id: ProjectId,
        /// Branch that was not found.
        branch: BranchName,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl BindingDirectoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
