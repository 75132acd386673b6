//! Branch heads read from the GitHub REST API.

use crate::binding::domain::{BranchName, CommitSha, RepositoryFullName};
use crate::drift::ports::{BranchHeadError, BranchHeadResult, BranchHeadSource};
use crate::health::SyncMetrics;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, USER_AGENT};
use serde::Deserialize;
use std::sync::Arc;

/// Public GitHub API root.
pub const DEFAULT_GITHUB_API_BASE: &str = "https://api.github.com";

const CLIENT_USER_AGENT: &str = "reposync-drift-poller";
const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

#[derive(Debug, Deserialize)]
struct BranchResponse {
    commit: BranchCommit,
}

#[derive(Debug, Deserialize)]
struct BranchCommit {
    sha: String,
}

/// Reads `GET /repos/{owner}/{repo}/branches/{branch}`.
///
/// When metrics are attached, every response's remaining rate-limit quota
/// is recorded.
#[derive(Debug, Clone)]
pub struct GitHubBranchHeads {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
    metrics: Option<Arc<SyncMetrics>>,
}

impl GitHubBranchHeads {
    /// Creates an unauthenticated client against `api_base`.
    #[must_use]
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_owned(),
            token: None,
            metrics: None,
        }
    }

    /// Authenticates requests with a bearer token.
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|value| !value.trim().is_empty());
        self
    }

    /// Records the remaining API quota into `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<SyncMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn branch_url(&self, repository: &RepositoryFullName, branch: &BranchName) -> String {
        format!("{}/repos/{repository}/branches/{branch}", self.api_base)
    }

    fn record_quota(&self, headers: &HeaderMap) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        if let Some(remaining) = remaining_quota(headers) {
            metrics.set_quota_remaining(Some(remaining));
        }
    }
}

fn remaining_quota(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RATE_LIMIT_REMAINING)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

#[async_trait]
impl BranchHeadSource for GitHubBranchHeads {
    async fn branch_head(
        &self,
        repository: &RepositoryFullName,
        branch: &BranchName,
    ) -> BranchHeadResult<CommitSha> {
        let mut request = self
            .client
            .get(self.branch_url(repository, branch))
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .header(ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(BranchHeadError::upstream)?;
        self.record_quota(response.headers());

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(BranchHeadError::NotFound {
                    repository: repository.clone(),
                    branch: branch.clone(),
                });
            }
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                return Err(BranchHeadError::RateLimited);
            }
            _ => {}
        }

        let body: BranchResponse = response
            .error_for_status()
            .map_err(BranchHeadError::upstream)?
            .json()
            .await
            .map_err(BranchHeadError::upstream)?;
        CommitSha::new(body.commit.sha).map_err(BranchHeadError::upstream)
    }
}
