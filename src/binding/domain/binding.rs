//! Repository binding aggregate and its tracked branches.

use super::{BranchName, CommitSha, OrgId, ParseBindingEnumError, ProjectId, RepositoryFullName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a project keeps itself in step with its repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Webhooks and the drift poller both schedule synchronisation.
    Automatic,
    /// Synchronisation runs only when triggered by an operator.
    Manual,
}

impl SyncMode {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Automatic => "automatic",
            Self::Manual => "manual",
        }
    }
}

impl TryFrom<&str> for SyncMode {
    type Error = ParseBindingEnumError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "automatic" => Ok(Self::Automatic),
            "manual" => Ok(Self::Manual),
            _ => Err(ParseBindingEnumError::SyncMode(value.to_owned())),
        }
    }
}

/// Whether the last synchronisation detected diverging histories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictState {
    /// No conflict recorded.
    Clear,
    /// Local and remote state diverged and need operator attention.
    Conflicted,
}

impl ConflictState {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Conflicted => "conflicted",
        }
    }
}

impl TryFrom<&str> for ConflictState {
    type Error = ParseBindingEnumError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "clear" => Ok(Self::Clear),
            "conflicted" => Ok(Self::Conflicted),
            _ => Err(ParseBindingEnumError::ConflictState(value.to_owned())),
        }
    }
}

/// A branch tracked for a project, with the last commit this system synced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedBranch {
    name: BranchName,
    last_synced_sha: Option<CommitSha>,
    last_synced_at: Option<DateTime<Utc>>,
}

impl TrackedBranch {
    /// Creates a branch that has never been synced.
    #[must_use]
    pub const fn new(name: BranchName) -> Self {
        Self {
            name,
            last_synced_sha: None,
            last_synced_at: None,
        }
    }

    /// Sets the last synced commit.
    #[must_use]
    pub fn with_last_synced(mut self, sha: CommitSha, at: DateTime<Utc>) -> Self {
        self.record_synced(sha, at);
        self
    }

    /// Returns the branch name.
    #[must_use]
    pub const fn name(&self) -> &BranchName {
        &self.name
    }

    /// Returns the last synced commit, if any.
    #[must_use]
    pub const fn last_synced_sha(&self) -> Option<&CommitSha> {
        self.last_synced_sha.as_ref()
    }

    /// Returns when the branch was last synced, if ever.
    #[must_use]
    pub const fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.last_synced_at
    }

    pub(crate) fn record_synced(&mut self, sha: CommitSha, at: DateTime<Utc>) {
        self.last_synced_sha = Some(sha);
        self.last_synced_at = Some(at);
    }
}

/// Per-project mapping onto a remote repository.
///
/// The default branch carries the binding-level last-synced commit; every
/// additional active branch tracks its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoBinding {
    org_id: OrgId,
    project_id: ProjectId,
    repository: RepositoryFullName,
    default_branch: TrackedBranch,
    active_branches: Vec<TrackedBranch>,
    enabled: bool,
    sync_mode: SyncMode,
    conflict_state: ConflictState,
}

impl RepoBinding {
    /// Creates an enabled, automatic binding with no active branches.
    #[must_use]
    pub const fn new(
        org_id: OrgId,
        project_id: ProjectId,
        repository: RepositoryFullName,
        default_branch: BranchName,
    ) -> Self {
        Self {
            org_id,
            project_id,
            repository,
            default_branch: TrackedBranch::new(default_branch),
            active_branches: Vec::new(),
            enabled: true,
            sync_mode: SyncMode::Automatic,
            conflict_state: ConflictState::Clear,
        }
    }

    /// Replaces the tracked default branch (including its sync state).
    #[must_use]
    pub fn with_default_branch(mut self, branch: TrackedBranch) -> Self {
        self.default_branch = branch;
        self
    }

    /// Adds an active branch. Branches equal to the default branch or already
    /// present are ignored.
    #[must_use]
    pub fn with_active_branch(mut self, branch: TrackedBranch) -> Self {
        if !self.tracks(branch.name()) {
            self.active_branches.push(branch);
        }
        self
    }

    /// Sets whether the binding is enabled.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the sync mode.
    #[must_use]
    pub const fn with_sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = sync_mode;
        self
    }

    /// Sets the conflict state.
    #[must_use]
    pub const fn with_conflict_state(mut self, conflict_state: ConflictState) -> Self {
        self.conflict_state = conflict_state;
        self
    }

    /// Returns the owning workspace.
    #[must_use]
    pub const fn org_id(&self) -> OrgId {
        self.org_id
    }

    /// Returns the bound project.
    #[must_use]
    pub const fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Returns the remote repository.
    #[must_use]
    pub const fn repository(&self) -> &RepositoryFullName {
        &self.repository
    }

    /// Returns the default branch.
    #[must_use]
    pub const fn default_branch(&self) -> &TrackedBranch {
        &self.default_branch
    }

    /// Returns additional branches tracked beyond the default.
    #[must_use]
    pub fn active_branches(&self) -> &[TrackedBranch] {
        &self.active_branches
    }

    /// Returns `true` when the binding is enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the sync mode.
    #[must_use]
    pub const fn sync_mode(&self) -> SyncMode {
        self.sync_mode
    }

    /// Returns the conflict state.
    #[must_use]
    pub const fn conflict_state(&self) -> ConflictState {
        self.conflict_state
    }

    /// Returns the binding-level last synced commit (the default branch's).
    #[must_use]
    pub const fn last_synced_sha(&self) -> Option<&CommitSha> {
        self.default_branch.last_synced_sha()
    }

    /// Returns the binding-level last synced timestamp.
    #[must_use]
    pub const fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.default_branch.last_synced_at()
    }

    /// Returns `true` if `branch` is the default branch or an active branch.
    #[must_use]
    pub fn tracks(&self, branch: &BranchName) -> bool {
        self.tracked_branch(branch).is_some()
    }

    /// Looks up a tracked branch by name.
    #[must_use]
    pub fn tracked_branch(&self, branch: &BranchName) -> Option<&TrackedBranch> {
        self.tracked_branches().find(|tracked| tracked.name() == branch)
    }

    /// Iterates the default branch followed by every active branch.
    pub fn tracked_branches(&self) -> impl Iterator<Item = &TrackedBranch> {
        std::iter::once(&self.default_branch).chain(self.active_branches.iter())
    }

    /// Records a newly synced commit on a tracked branch.
    ///
    /// Returns `false` when the branch is not tracked.
    pub fn record_synced_commit(
        &mut self,
        branch: &BranchName,
        sha: CommitSha,
        at: DateTime<Utc>,
    ) -> bool {
        let tracked = std::iter::once(&mut self.default_branch)
            .chain(self.active_branches.iter_mut())
            .find(|tracked| tracked.name() == branch);
        match tracked {
            Some(found) => {
                found.record_synced(sha, at);
                true
            }
            None => false,
        }
    }
}
