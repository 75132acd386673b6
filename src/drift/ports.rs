//! Remote branch-head lookup consumed by the drift poller.

use crate::binding::domain::{BranchName, CommitSha, RepositoryFullName};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for branch-head lookups.
pub type BranchHeadResult<T> = Result<T, BranchHeadError>;

/// Reads the current head commit of a remote branch.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BranchHeadSource: Send + Sync {
    /// Returns the commit the remote branch currently points at.
    async fn branch_head(
        &self,
        repository: &RepositoryFullName,
        branch: &BranchName,
    ) -> BranchHeadResult<CommitSha>;
}

/// Errors returned by branch-head sources.
#[derive(Debug, Clone, Error)]
pub enum BranchHeadError {
    /// The repository or branch does not exist remotely.
    #[error("branch {branch} not found in {repository}")]
    NotFound {
        /// Repository queried.
        repository: RepositoryFullName,
        /// Branch queried.
        branch: BranchName,
    },

    /// The upstream API refused the request because of rate limiting.
    #[error("upstream rate limit reached")]
    RateLimited,

    /// Transport, decoding, or unexpected-status failure.
    #[error("upstream error: {0}")]
    Upstream(Arc<dyn std::error::Error + Send + Sync>),
}

impl BranchHeadError {
    /// Wraps an upstream failure.
    pub fn upstream(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Upstream(Arc::new(err))
    }
}
