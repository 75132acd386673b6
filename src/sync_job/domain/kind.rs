//! Job type and lifecycle status enums.

use super::{ParseSyncJobStatusError, SyncJobDomainError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of sync job types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncJobType {
    /// Durable record of an accepted webhook delivery.
    Webhook,
    /// Pull the latest commit of one branch into the project.
    RepoSync,
    /// Import issues for a project.
    IssueImport,
}

impl SyncJobType {
    /// Every job type, in storage order.
    pub const ALL: [Self; 3] = [Self::Webhook, Self::RepoSync, Self::IssueImport];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::RepoSync => "repo_sync",
            Self::IssueImport => "issue_import",
        }
    }
}

impl TryFrom<&str> for SyncJobType {
    type Error = SyncJobDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "webhook" => Ok(Self::Webhook),
            "repo_sync" => Ok(Self::RepoSync),
            "issue_import" => Ok(Self::IssueImport),
            _ => Err(SyncJobDomainError::UnknownJobType(value.to_owned())),
        }
    }
}

impl fmt::Display for SyncJobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sync job lifecycle status.
///
/// `queued -> in_progress -> {completed | queued (retry) | dead_letter}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncJobStatus {
    /// Waiting to be leased.
    Queued,
    /// Leased by a worker.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Failed permanently or exhausted its attempts.
    DeadLetter,
}

impl SyncJobStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::DeadLetter => "dead_letter",
        }
    }

    /// Returns `true` for statuses that never change again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::DeadLetter)
    }

    /// Returns whether the lifecycle permits moving from `self` to `target`.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Queued, Self::InProgress)
                | (
                    Self::InProgress,
                    Self::Completed | Self::Queued | Self::DeadLetter
                )
        )
    }
}

impl TryFrom<&str> for SyncJobStatus {
    type Error = ParseSyncJobStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "queued" => Ok(Self::Queued),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "dead_letter" => Ok(Self::DeadLetter),
            _ => Err(ParseSyncJobStatusError(value.to_owned())),
        }
    }
}

impl fmt::Display for SyncJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
