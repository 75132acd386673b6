//! Fixed branch heads for tests and local runs.

use crate::binding::domain::{BranchName, CommitSha, RepositoryFullName};
use crate::drift::ports::{BranchHeadError, BranchHeadResult, BranchHeadSource};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Branch heads held in memory and set by the caller.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBranchHeads {
    heads: Arc<RwLock<HashMap<(RepositoryFullName, BranchName), CommitSha>>>,
}

impl InMemoryBranchHeads {
    /// Creates a source with no known branches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Points `branch` of `repository` at `sha`.
    pub fn set_head(&self, repository: RepositoryFullName, branch: BranchName, sha: CommitSha) {
        self.heads
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((repository, branch), sha);
    }
}

#[async_trait]
impl BranchHeadSource for InMemoryBranchHeads {
    async fn branch_head(
        &self,
        repository: &RepositoryFullName,
        branch: &BranchName,
    ) -> BranchHeadResult<CommitSha> {
        self.heads
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(repository.clone(), branch.clone()))
            .cloned()
            .ok_or_else(|| BranchHeadError::NotFound {
                repository: repository.clone(),
                branch: branch.clone(),
            })
    }
}
