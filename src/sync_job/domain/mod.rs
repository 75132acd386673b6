//! Domain model for durable sync jobs.
//!
//! A sync job is the unit both update channels converge on. The aggregate
//! owns its lifecycle rules so every store applies the same transitions and
//! retry decisions.

mod error;
mod ids;
mod job;
mod kind;
mod payload;
mod retry;

pub use error::{ParseSyncJobStatusError, SyncJobDomainError};
pub use ids::{SourceEventId, SyncJobId};
pub use job::{
    DEFAULT_MAX_ATTEMPTS, FailureDisposition, JobFailure, MAX_ERROR_CLASS_LENGTH, NewSyncJob,
    PersistedSyncJobData, SyncJob,
};
pub use kind::{SyncJobStatus, SyncJobType};
pub use payload::{
    RepoSyncPayload, SyncReason, WebhookJobPayload, poller_repo_sync_key, webhook_event_key,
    webhook_repo_sync_key,
};
pub use retry::RetryPolicy;
