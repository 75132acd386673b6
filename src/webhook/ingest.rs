//! Webhook ingest pipeline: verification, replay protection, routing, and
//! translation into sync jobs.
//!
//! Processing is split in two so the HTTP layer can stop before reading the
//! body: [`admit`] checks headers only, and [`WebhookIngestService::ingest`]
//! handles a body read under the size cap. No state changes before the
//! signature has been verified.

use super::event::{EventFields, WebhookEventKind};
use super::signature::{WebhookSecret, verify_signature};
use crate::binding::{
    domain::{FallbackRoutes, OrgId, ProjectId, RepoBinding},
    ports::{BindingDirectory, BindingDirectoryError},
};
use crate::coordination::DeliveryDedupStore;
use crate::sync_job::{
    domain::{
        RepoSyncPayload, SyncJobDomainError, SyncJobId, SyncJobType, SyncReason, WebhookJobPayload,
        webhook_event_key, webhook_repo_sync_key,
    },
    ports::SyncJobStore,
    services::{EnqueueRequest, SyncJobQueue, SyncJobQueueError},
};
use mockable::Clock;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Longest delivery identifier accepted.
pub const MAX_DELIVERY_ID_LENGTH: usize = 255;

/// Raw header values relevant to ingestion.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebhookHeaders<'a> {
    /// `X-GitHub-Event`.
    pub event: Option<&'a str>,
    /// `X-Hub-Signature-256`.
    pub signature: Option<&'a str>,
    /// `X-GitHub-Delivery`.
    pub delivery_id: Option<&'a str>,
}

/// A delivery whose headers passed the pre-body checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmittedDelivery {
    event: WebhookEventKind,
    signature: String,
    delivery_id: String,
}

impl AdmittedDelivery {
    /// Returns the allow-listed event type.
    #[must_use]
    pub const fn event(&self) -> WebhookEventKind {
        self.event
    }

    /// Returns the trimmed delivery identifier.
    #[must_use]
    pub fn delivery_id(&self) -> &str {
        &self.delivery_id
    }
}

/// Result of the header checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The event type is outside the allow-list.
    Ignored {
        /// Event header value, empty when absent.
        event: String,
    },
    /// Headers are complete; the body may be read.
    Admitted(AdmittedDelivery),
}

/// Runs the allow-list, signature-presence, and delivery-id checks in that
/// order.
///
/// # Errors
///
/// Returns [`IngestError::MissingSignature`] or
/// [`IngestError::MissingDeliveryId`] for an allow-listed event with
/// incomplete headers. Delivery ids that are blank or longer than
/// [`MAX_DELIVERY_ID_LENGTH`] count as missing.
pub fn admit(headers: WebhookHeaders<'_>) -> Result<Admission, IngestError> {
    let raw_event = headers.event.unwrap_or_default().trim();
    let Some(event) = WebhookEventKind::from_header(raw_event) else {
        return Ok(Admission::Ignored {
            event: raw_event.to_owned(),
        });
    };

    let signature = headers
        .signature
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(IngestError::MissingSignature)?;
    let delivery_id = headers
        .delivery_id
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= MAX_DELIVERY_ID_LENGTH)
        .ok_or(IngestError::MissingDeliveryId)?;

    Ok(Admission::Admitted(AdmittedDelivery {
        event,
        signature: signature.to_owned(),
        delivery_id: delivery_id.to_owned(),
    }))
}

/// Outcome of a processed delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Acknowledged without enqueuing work.
    Ignored {
        /// Event type.
        event: String,
        /// Why no work was enqueued.
        reason: IgnoreReason,
    },
    /// The delivery was seen within the replay window.
    Duplicate {
        /// Event type.
        event: WebhookEventKind,
        /// Delivery identifier.
        delivery_id: String,
    },
    /// Work was recorded.
    Accepted(AcceptedDelivery),
}

/// Why an event was acknowledged without work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The event type is outside the allow-list.
    UnsupportedEvent,
    /// Neither installation nor repository maps to a workspace.
    UnknownWorkspace,
}

impl IgnoreReason {
    /// Returns a stable label for responses and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnsupportedEvent => "unsupported_event",
            Self::UnknownWorkspace => "unknown_workspace",
        }
    }
}

/// Jobs recorded for an accepted delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedDelivery {
    /// Event type.
    pub event: WebhookEventKind,
    /// Delivery identifier.
    pub delivery_id: String,
    /// The generic `webhook` job.
    pub webhook_job_id: SyncJobId,
    /// Whether a targeted `repo_sync` job was enqueued.
    pub repo_sync_queued: bool,
    /// Project bound to the event's repository, when any.
    pub project_id: Option<ProjectId>,
}

/// Errors that reject a delivery.
#[derive(Debug, Error)]
pub enum IngestError {
    /// `X-Hub-Signature-256` is absent.
    #[error("missing webhook signature")]
    MissingSignature,
    /// `X-GitHub-Delivery` is absent or unusable.
    #[error("missing webhook delivery id")]
    MissingDeliveryId,
    /// The body exceeded the configured cap.
    #[error("webhook body exceeds {limit} bytes")]
    PayloadTooLarge {
        /// Configured cap in bytes.
        limit: usize,
    },
    /// The body stream failed before it was fully read.
    #[error("failed to read webhook body")]
    UnreadableBody,
    /// No shared secret is configured.
    #[error("webhook secret is not configured")]
    SecretNotConfigured,
    /// The signature does not match the body.
    #[error("invalid webhook signature")]
    InvalidSignature,
    /// The body is not valid JSON.
    #[error("malformed webhook payload: {0}")]
    MalformedPayload(#[source] serde_json::Error),
    /// Workspace or project lookup failed.
    #[error(transparent)]
    Bindings(#[from] BindingDirectoryError),
    /// Enqueue failed.
    #[error(transparent)]
    Queue(#[from] SyncJobQueueError),
    /// An idempotency key could not be built.
    #[error(transparent)]
    Domain(#[from] SyncJobDomainError),
}

/// Translates verified deliveries into sync jobs.
pub struct WebhookIngestService<S, C>
where
    S: SyncJobStore + ?Sized,
    C: Clock + Send + Sync,
{
    secret: Option<WebhookSecret>,
    dedup: Arc<DeliveryDedupStore<C>>,
    bindings: Arc<dyn BindingDirectory>,
    fallback_routes: FallbackRoutes,
    queue: Arc<SyncJobQueue<S, C>>,
}

impl<S, C> WebhookIngestService<S, C>
where
    S: SyncJobStore + ?Sized,
    C: Clock + Send + Sync,
{
    /// Creates a service with no secret and no fallback routes.
    #[must_use]
    pub fn new(
        queue: Arc<SyncJobQueue<S, C>>,
        dedup: Arc<DeliveryDedupStore<C>>,
        bindings: Arc<dyn BindingDirectory>,
    ) -> Self {
        Self {
            secret: None,
            dedup,
            bindings,
            fallback_routes: FallbackRoutes::new(),
            queue,
        }
    }

    /// Sets the shared secret. `None` makes every delivery fail closed.
    #[must_use]
    pub fn with_secret(mut self, secret: Option<WebhookSecret>) -> Self {
        self.secret = secret;
        self
    }

    /// Sets routes consulted after the directory during workspace
    /// resolution.
    #[must_use]
    pub fn with_fallback_routes(mut self, routes: FallbackRoutes) -> Self {
        self.fallback_routes = routes;
        self
    }

    /// Verifies, deduplicates, routes, and enqueues an admitted delivery.
    ///
    /// When processing fails after the delivery was marked as seen, the
    /// mark is dropped so the sender's redelivery is processed again.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::SecretNotConfigured`],
    /// [`IngestError::InvalidSignature`], [`IngestError::MalformedPayload`],
    /// or a lookup/enqueue failure.
    pub async fn ingest(
        &self,
        delivery: &AdmittedDelivery,
        body: &[u8],
    ) -> Result<IngestOutcome, IngestError> {
        let secret = self.secret.as_ref().ok_or(IngestError::SecretNotConfigured)?;
        if !verify_signature(body, &delivery.signature, secret.as_bytes()) {
            warn!(delivery_id = %delivery.delivery_id, "webhook signature mismatch");
            return Err(IngestError::InvalidSignature);
        }

        if !self.dedup.mark_if_new(&delivery.delivery_id) {
            debug!(delivery_id = %delivery.delivery_id, "duplicate webhook delivery suppressed");
            return Ok(IngestOutcome::Duplicate {
                event: delivery.event,
                delivery_id: delivery.delivery_id.clone(),
            });
        }

        let result = self.process(delivery, body).await;
        if let Err(err) = &result {
            self.dedup.forget(&delivery.delivery_id);
            warn!(delivery_id = %delivery.delivery_id, error = %err, "webhook ingest failed");
        }
        result
    }

    async fn process(
        &self,
        delivery: &AdmittedDelivery,
        body: &[u8],
    ) -> Result<IngestOutcome, IngestError> {
        let payload: Value = serde_json::from_slice(body).map_err(IngestError::MalformedPayload)?;
        let fields = EventFields::extract(&payload);

        let Some(org_id) = self.resolve_workspace(&fields).await? else {
            info!(
                delivery_id = %delivery.delivery_id,
                event = %delivery.event,
                "webhook for unknown workspace ignored"
            );
            return Ok(IngestOutcome::Ignored {
                event: delivery.event.as_str().to_owned(),
                reason: IgnoreReason::UnknownWorkspace,
            });
        };

        let binding = match &fields.repository {
            Some(repository) => self.bindings.binding_for_repository(org_id, repository).await?,
            None => None,
        };
        let project_id = binding.as_ref().map(RepoBinding::project_id);

        let webhook_payload = WebhookJobPayload {
            event: delivery.event.as_str().to_owned(),
            delivery_id: delivery.delivery_id.clone(),
            payload,
        };
        let webhook_request =
            EnqueueRequest::new(org_id, SyncJobType::Webhook, webhook_payload.to_value())
                .with_project(project_id)
                .with_source_event_id(webhook_event_key(&delivery.delivery_id)?);
        let webhook_job = self.queue.enqueue(webhook_request).await?.job;

        let repo_sync_queued = match binding.as_ref() {
            Some(bound) if delivery.event == WebhookEventKind::Push => {
                self.enqueue_push_sync(delivery, bound, &fields).await?
            }
            _ => false,
        };

        info!(
            delivery_id = %delivery.delivery_id,
            event = %delivery.event,
            webhook_job_id = %webhook_job.id(),
            repo_sync_queued,
            "webhook accepted"
        );
        Ok(IngestOutcome::Accepted(AcceptedDelivery {
            event: delivery.event,
            delivery_id: delivery.delivery_id.clone(),
            webhook_job_id: webhook_job.id(),
            repo_sync_queued,
            project_id,
        }))
    }

    /// Installation first, then the directory's repository lookup, then the
    /// static fallback routes.
    async fn resolve_workspace(
        &self,
        fields: &EventFields,
    ) -> Result<Option<OrgId>, BindingDirectoryError> {
        if let Some(installation_id) = fields.installation_id
            && let Some(org_id) = self.bindings.workspace_for_installation(installation_id).await?
        {
            return Ok(Some(org_id));
        }
        let Some(repository) = &fields.repository else {
            return Ok(None);
        };
        if let Some(org_id) = self.bindings.workspace_for_repository(repository).await? {
            return Ok(Some(org_id));
        }
        Ok(self.fallback_routes.workspace_for(repository))
    }

    async fn enqueue_push_sync(
        &self,
        delivery: &AdmittedDelivery,
        binding: &RepoBinding,
        fields: &EventFields,
    ) -> Result<bool, IngestError> {
        let Some(branch) = &fields.branch else {
            return Ok(false);
        };
        if !binding.is_enabled() || !binding.tracks(branch) || fields.is_branch_deletion() {
            debug!(
                delivery_id = %delivery.delivery_id,
                project_id = %binding.project_id(),
                branch = %branch,
                "push does not need a repo sync"
            );
            return Ok(false);
        }

        let Ok(key) = webhook_repo_sync_key(&delivery.delivery_id, branch) else {
            warn!(
                delivery_id = %delivery.delivery_id,
                branch = %branch,
                "repo sync key too long, leaving branch to the drift poller"
            );
            return Ok(false);
        };

        let mut payload = RepoSyncPayload::new(
            binding.repository().clone(),
            branch.clone(),
            SyncReason::Webhook,
        )
        .with_delivery_id(delivery.delivery_id.clone());
        if let Some(sha) = &fields.head_sha {
            payload = payload.with_head_sha(sha.clone());
        }

        let request = EnqueueRequest::new(binding.org_id(), SyncJobType::RepoSync, payload.to_value())
            .with_project(Some(binding.project_id()))
            .with_source_event_id(key);
        self.queue
            .enqueue_repo_sync(request, branch, fields.head_sha.as_ref())
            .await?;
        Ok(true)
    }
}
