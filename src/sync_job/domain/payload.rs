//! Typed payloads carried by sync jobs and their idempotency keys.

use super::{SourceEventId, SyncJobDomainError};
use crate::binding::domain::{BranchName, CommitSha, ProjectId, RepositoryFullName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Why a repo-sync job was enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncReason {
    /// Push webhook fast path.
    Webhook,
    /// Drift poller observed a new head.
    Poller,
    /// Operator requested a sync.
    Manual,
}

impl SyncReason {
    /// Returns the canonical tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::Poller => "poller",
            Self::Manual => "manual",
        }
    }
}

/// Payload of a `repo_sync` job: pull one branch into its project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSyncPayload {
    /// Repository the branch belongs to.
    pub repository: RepositoryFullName,
    /// Branch to synchronise.
    pub branch: BranchName,
    /// Channel that requested the sync.
    pub reason: SyncReason,
    /// Head observed by the requesting channel, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_sha: Option<CommitSha>,
    /// Webhook delivery that triggered the sync, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_id: Option<String>,
}

impl RepoSyncPayload {
    /// Creates a payload without head or delivery metadata.
    #[must_use]
    pub const fn new(repository: RepositoryFullName, branch: BranchName, reason: SyncReason) -> Self {
        Self {
            repository,
            branch,
            reason,
            head_sha: None,
            delivery_id: None,
        }
    }

    /// Attaches the observed head commit.
    #[must_use]
    pub fn with_head_sha(mut self, head_sha: CommitSha) -> Self {
        self.head_sha = Some(head_sha);
        self
    }

    /// Attaches the triggering delivery identifier.
    #[must_use]
    pub fn with_delivery_id(mut self, delivery_id: impl Into<String>) -> Self {
        self.delivery_id = Some(delivery_id.into());
        self
    }

    /// Renders the payload as the job's opaque JSON blob.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut value = json!({
            "repository": self.repository.as_str(),
            "branch": self.branch.as_str(),
            "reason": self.reason.as_str(),
        });
        if let Some(sha) = &self.head_sha {
            value["head_sha"] = Value::String(sha.as_str().to_owned());
        }
        if let Some(delivery) = &self.delivery_id {
            value["delivery_id"] = Value::String(delivery.clone());
        }
        value
    }

    /// Returns `true` when a rendered payload targets `branch` at
    /// `head_sha`.
    #[must_use]
    pub fn targets_head(value: &Value, branch: &BranchName, head_sha: &CommitSha) -> bool {
        value.get("branch").and_then(Value::as_str) == Some(branch.as_str())
            && value.get("head_sha").and_then(Value::as_str) == Some(head_sha.as_str())
    }

    /// Parses a payload previously produced by [`Self::to_value`].
    ///
    /// # Errors
    ///
    /// Returns the deserialisation error when the blob has another shape.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// Payload of a generic `webhook` job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookJobPayload {
    /// Event type header value.
    pub event: String,
    /// Delivery identifier header value.
    pub delivery_id: String,
    /// Raw decoded event body.
    pub payload: Value,
}

impl WebhookJobPayload {
    /// Renders the payload as the job's opaque JSON blob.
    #[must_use]
    pub fn to_value(&self) -> Value {
        json!({
            "event": self.event,
            "delivery_id": self.delivery_id,
            "payload": self.payload,
        })
    }
}

/// Idempotency key of the generic webhook job: the delivery id itself.
///
/// # Errors
///
/// Returns [`SyncJobDomainError::InvalidSourceEventId`] for blank ids.
pub fn webhook_event_key(delivery_id: &str) -> Result<SourceEventId, SyncJobDomainError> {
    SourceEventId::new(delivery_id)
}

/// Idempotency key of the push fast-path job:
/// `<delivery_id>:repo_sync:<branch>`.
///
/// # Errors
///
/// Returns [`SyncJobDomainError::InvalidSourceEventId`] when the combined
/// key is blank or too long.
pub fn webhook_repo_sync_key(
    delivery_id: &str,
    branch: &BranchName,
) -> Result<SourceEventId, SyncJobDomainError> {
    SourceEventId::new(format!("{delivery_id}:repo_sync:{branch}"))
}

/// Idempotency key of a poller job:
/// `poll:<project_id>:<branch>:<head_sha>:<since>`.
///
/// `since` is the millisecond timestamp of the branch's last recorded sync,
/// or `unsynced`. Repeated cycles observing the same drift share a key; once
/// a sync is recorded the next drift gets a fresh one, so a head that returns
/// to an earlier commit is still picked up.
///
/// # Errors
///
/// Returns [`SyncJobDomainError::InvalidSourceEventId`] when the combined
/// key exceeds the column limit.
pub fn poller_repo_sync_key(
    project_id: ProjectId,
    branch: &BranchName,
    head_sha: &CommitSha,
    last_synced_at: Option<DateTime<Utc>>,
) -> Result<SourceEventId, SyncJobDomainError> {
    let since = last_synced_at.map_or_else(
        || "unsynced".to_owned(),
        |at| at.timestamp_millis().to_string(),
    );
    SourceEventId::new(format!("poll:{project_id}:{branch}:{head_sha}:{since}"))
}
