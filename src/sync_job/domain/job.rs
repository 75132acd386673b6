//! Sync job aggregate root and its lifecycle transitions.

use super::{RetryPolicy, SourceEventId, SyncJobDomainError, SyncJobId, SyncJobStatus, SyncJobType};
use crate::binding::domain::{OrgId, ProjectId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default number of attempts before a retryable job is dead-lettered.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Longest error class the store persists, in characters.
pub const MAX_ERROR_CLASS_LENGTH: usize = 100;

/// Request to enqueue a new sync job.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSyncJob {
    org_id: OrgId,
    project_id: Option<ProjectId>,
    job_type: SyncJobType,
    payload: Value,
    source_event_id: Option<SourceEventId>,
    max_attempts: u32,
}

impl NewSyncJob {
    /// Creates a request for an org-scoped job with default attempts.
    #[must_use]
    pub const fn new(org_id: OrgId, job_type: SyncJobType, payload: Value) -> Self {
        Self {
            org_id,
            project_id: None,
            job_type,
            payload,
            source_event_id: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Scopes the job to a project.
    #[must_use]
    pub const fn with_project(mut self, project_id: ProjectId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    /// Sets the idempotency key.
    #[must_use]
    pub fn with_source_event_id(mut self, source_event_id: SourceEventId) -> Self {
        self.source_event_id = Some(source_event_id);
        self
    }

    /// Sets the attempt budget.
    ///
    /// # Errors
    ///
    /// Returns [`SyncJobDomainError::InvalidMaxAttempts`] when zero.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Result<Self, SyncJobDomainError> {
        if max_attempts == 0 {
            return Err(SyncJobDomainError::InvalidMaxAttempts(max_attempts));
        }
        self.max_attempts = max_attempts;
        Ok(self)
    }

    /// Returns the job type.
    #[must_use]
    pub const fn job_type(&self) -> SyncJobType {
        self.job_type
    }

    /// Returns the idempotency key, if any.
    #[must_use]
    pub const fn source_event_id(&self) -> Option<&SourceEventId> {
        self.source_event_id.as_ref()
    }
}

/// Failure reported by the worker holding a job's lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    error_class: String,
    error_message: String,
    retryable: bool,
    occurred_at: DateTime<Utc>,
}

impl JobFailure {
    /// Creates a failure report.
    ///
    /// The class is trimmed and cut to [`MAX_ERROR_CLASS_LENGTH`]
    /// characters.
    ///
    /// # Errors
    ///
    /// Returns [`SyncJobDomainError::EmptyErrorClass`] when the class is
    /// blank.
    pub fn new(
        error_class: impl Into<String>,
        error_message: impl Into<String>,
        retryable: bool,
        occurred_at: DateTime<Utc>,
    ) -> Result<Self, SyncJobDomainError> {
        let raw_class = error_class.into();
        let trimmed = raw_class.trim();
        if trimmed.is_empty() {
            return Err(SyncJobDomainError::EmptyErrorClass);
        }
        let class: String = trimmed.chars().take(MAX_ERROR_CLASS_LENGTH).collect();
        Ok(Self {
            error_class: class,
            error_message: error_message.into(),
            retryable,
            occurred_at,
        })
    }

    /// Returns the error class.
    #[must_use]
    pub fn error_class(&self) -> &str {
        &self.error_class
    }

    /// Returns the error message.
    #[must_use]
    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    /// Returns whether the caller classified the failure as transient.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Returns when the failure occurred.
    #[must_use]
    pub const fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Outcome of recording a failure against a leased job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// The job was re-queued and becomes eligible at the given time.
    Retry {
        /// Earliest time the job may be leased again.
        available_at: DateTime<Utc>,
    },
    /// The job will not be retried.
    DeadLetter,
}

/// Durable unit of reconciliation work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncJob {
    id: SyncJobId,
    org_id: OrgId,
    project_id: Option<ProjectId>,
    job_type: SyncJobType,
    status: SyncJobStatus,
    payload: Value,
    source_event_id: Option<SourceEventId>,
    attempts: u32,
    max_attempts: u32,
    error_class: Option<String>,
    error_message: Option<String>,
    available_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted job.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedSyncJobData {
    /// Job identifier.
    pub id: SyncJobId,
    /// Owning workspace.
    pub org_id: OrgId,
    /// Project scope, if any.
    pub project_id: Option<ProjectId>,
    /// Job type.
    pub job_type: SyncJobType,
    /// Lifecycle status.
    pub status: SyncJobStatus,
    /// Opaque payload.
    pub payload: Value,
    /// Idempotency key.
    pub source_event_id: Option<SourceEventId>,
    /// Failed attempts so far.
    pub attempts: u32,
    /// Attempt budget.
    pub max_attempts: u32,
    /// Last failure class.
    pub error_class: Option<String>,
    /// Last failure message.
    pub error_message: Option<String>,
    /// Earliest lease time.
    pub available_at: DateTime<Utc>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Latest lifecycle timestamp.
    pub updated_at: DateTime<Utc>,
}

impl SyncJob {
    /// Creates a queued job from an enqueue request.
    #[must_use]
    pub fn new(request: NewSyncJob, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id: SyncJobId::new(),
            org_id: request.org_id,
            project_id: request.project_id,
            job_type: request.job_type,
            status: SyncJobStatus::Queued,
            payload: request.payload,
            source_event_id: request.source_event_id,
            attempts: 0,
            max_attempts: request.max_attempts,
            error_class: None,
            error_message: None,
            available_at: timestamp,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a job from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedSyncJobData) -> Self {
        Self {
            id: data.id,
            org_id: data.org_id,
            project_id: data.project_id,
            job_type: data.job_type,
            status: data.status,
            payload: data.payload,
            source_event_id: data.source_event_id,
            attempts: data.attempts,
            max_attempts: data.max_attempts,
            error_class: data.error_class,
            error_message: data.error_message,
            available_at: data.available_at,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the job identifier.
    #[must_use]
    pub const fn id(&self) -> SyncJobId {
        self.id
    }

    /// Returns the owning workspace.
    #[must_use]
    pub const fn org_id(&self) -> OrgId {
        self.org_id
    }

    /// Returns the project scope, if any.
    #[must_use]
    pub const fn project_id(&self) -> Option<ProjectId> {
        self.project_id
    }

    /// Returns the job type.
    #[must_use]
    pub const fn job_type(&self) -> SyncJobType {
        self.job_type
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> SyncJobStatus {
        self.status
    }

    /// Returns the opaque payload.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// Returns the idempotency key, if any.
    #[must_use]
    pub const fn source_event_id(&self) -> Option<&SourceEventId> {
        self.source_event_id.as_ref()
    }

    /// Returns the number of failed attempts.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns the attempt budget.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the class of the most recent failure.
    #[must_use]
    pub fn error_class(&self) -> Option<&str> {
        self.error_class.as_deref()
    }

    /// Returns the message of the most recent failure.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Returns the earliest time the job may be leased.
    #[must_use]
    pub const fn available_at(&self) -> DateTime<Utc> {
        self.available_at
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest lifecycle timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns `true` when the job is queued and its backoff has elapsed.
    #[must_use]
    pub fn is_leasable_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SyncJobStatus::Queued && self.available_at <= now
    }

    /// Claims the job for processing.
    ///
    /// # Errors
    ///
    /// Returns [`SyncJobDomainError::InvalidTransition`] unless the job is
    /// queued.
    pub fn lease(&mut self, now: DateTime<Utc>) -> Result<(), SyncJobDomainError> {
        self.transition(SyncJobStatus::InProgress)?;
        self.updated_at = now;
        Ok(())
    }

    /// Marks a leased job as completed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncJobDomainError::InvalidTransition`] unless the job is in
    /// progress; terminal jobs are left untouched.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), SyncJobDomainError> {
        self.transition(SyncJobStatus::Completed)?;
        self.updated_at = now;
        Ok(())
    }

    /// Records a failure against a leased job.
    ///
    /// Non-retryable failures dead-letter the job immediately. Retryable
    /// failures re-queue it with backoff until `max_attempts` is reached.
    ///
    /// # Errors
    ///
    /// Returns [`SyncJobDomainError::InvalidTransition`] unless the job is in
    /// progress.
    pub fn record_failure(
        &mut self,
        failure: &JobFailure,
        policy: &RetryPolicy,
    ) -> Result<FailureDisposition, SyncJobDomainError> {
        if self.status != SyncJobStatus::InProgress {
            return Err(self.invalid_transition(SyncJobStatus::DeadLetter));
        }

        let attempts = self.attempts.saturating_add(1);
        let disposition = if failure.is_retryable() && attempts < self.max_attempts {
            FailureDisposition::Retry {
                available_at: policy.next_attempt_at(failure.occurred_at(), attempts),
            }
        } else {
            FailureDisposition::DeadLetter
        };

        match disposition {
            FailureDisposition::Retry { available_at } => {
                self.transition(SyncJobStatus::Queued)?;
                self.available_at = available_at;
            }
            FailureDisposition::DeadLetter => self.transition(SyncJobStatus::DeadLetter)?,
        }
        self.attempts = attempts;
        self.error_class = Some(failure.error_class().to_owned());
        self.error_message = Some(failure.error_message().to_owned());
        self.updated_at = failure.occurred_at();
        Ok(disposition)
    }

    fn transition(&mut self, target: SyncJobStatus) -> Result<(), SyncJobDomainError> {
        if !self.status.can_transition_to(target) {
            return Err(self.invalid_transition(target));
        }
        self.status = target;
        Ok(())
    }

    const fn invalid_transition(&self, target: SyncJobStatus) -> SyncJobDomainError {
        SyncJobDomainError::InvalidTransition {
            job_id: self.id,
            from: self.status,
            to: target,
        }
    }
}
