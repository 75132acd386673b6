//! Error types for sync job domain validation and parsing.

use super::{SyncJobId, SyncJobStatus};
use thiserror::Error;

/// Errors returned while constructing or transitioning sync jobs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncJobDomainError {
    /// The job type tag is not one of the known job types.
    #[error("unknown sync job type: {0}")]
    UnknownJobType(String),

    /// The idempotency key is blank or too long.
    #[error("invalid source event id '{0}'")]
    InvalidSourceEventId(String),

    /// `max_attempts` must allow at least one attempt.
    #[error("max_attempts must be at least 1, got {0}")]
    InvalidMaxAttempts(u32),

    /// The error class recorded with a failure is blank.
    #[error("failure error class must not be empty")]
    EmptyErrorClass,

    /// The requested status transition is not permitted.
    #[error("cannot transition job {job_id} from {from} to {to}")]
    InvalidTransition {
        /// Job identifier.
        job_id: SyncJobId,
        /// Current status.
        from: SyncJobStatus,
        /// Requested status.
        to: SyncJobStatus,
    },
}

/// Error returned while parsing job statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown sync job status: {0}")]
pub struct ParseSyncJobStatusError(pub String);
