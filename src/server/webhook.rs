//! Webhook endpoint handler.

use super::{AppState, error_response};
use crate::sync_job::ports::SyncJobStore;
use crate::webhook::{Admission, IgnoreReason, IngestError, IngestOutcome, WebhookHeaders, admit};
use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use http_body_util::LengthLimitError;
use mockable::Clock;
use std::error::Error as StdError;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

/// Header name for the event type.
const HEADER_EVENT: &str = "x-github-event";
/// Header name for the delivery identifier.
const HEADER_DELIVERY: &str = "x-github-delivery";
/// Header name for the payload signature.
const HEADER_SIGNATURE: &str = "x-hub-signature-256";

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::MissingSignature | Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::MissingDeliveryId | Self::MalformedPayload(_) | Self::UnreadableBody => {
                StatusCode::BAD_REQUEST
            }
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::SecretNotConfigured | Self::Bindings(_) | Self::Queue(_) | Self::Domain(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        error_response(status, &self)
    }
}

/// Webhook handler.
///
/// Header checks run before the body is read. The body is then read under
/// the configured cap and handed to the ingest pipeline.
///
/// # Response
///
/// - 202 Accepted: `{event, delivery_id, webhook_job_id, repo_sync_queued,
///   project_id}`, or `{ignored: true, ...}`, or `{duplicate: true, ...}`
/// - 400 Bad Request: missing delivery id or malformed JSON
/// - 401 Unauthorized: missing or invalid signature
/// - 413 Payload Too Large: body above the cap
/// - 500 Internal Server Error: secret not configured or enqueue failure
pub async fn webhook_handler<S, C>(
    State(app_state): State<AppState<S, C>>,
    headers: HeaderMap,
    body: Body,
) -> Result<(StatusCode, Json<Value>), IngestError>
where
    S: SyncJobStore + ?Sized + 'static,
    C: Clock + Send + Sync + 'static,
{
    let admission = admit(WebhookHeaders {
        event: header(&headers, HEADER_EVENT),
        signature: header(&headers, HEADER_SIGNATURE),
        delivery_id: header(&headers, HEADER_DELIVERY),
    })?;
    let delivery = match admission {
        Admission::Ignored { event } => {
            debug!(event = %event, "unsupported webhook event acknowledged");
            return Ok(accepted(json!({
                "ignored": true,
                "event": event,
                "reason": IgnoreReason::UnsupportedEvent.as_str(),
            })));
        }
        Admission::Admitted(delivery) => delivery,
    };

    let limit = app_state.max_body_bytes();
    let bytes = axum::body::to_bytes(body, limit).await.map_err(|err| {
        warn!(delivery_id = %delivery.delivery_id(), limit, error = %err, "webhook body rejected");
        if exceeds_limit(&err) {
            IngestError::PayloadTooLarge { limit }
        } else {
            IngestError::UnreadableBody
        }
    })?;

    let outcome = app_state.services().ingest.ingest(&delivery, &bytes).await?;
    Ok(accepted(outcome_body(outcome)))
}

fn exceeds_limit(err: &axum::Error) -> bool {
    std::iter::successors(StdError::source(err), |inner: &&(dyn StdError + 'static)| (*inner).source())
        .any(|inner| inner.is::<LengthLimitError>())
}

fn outcome_body(outcome: IngestOutcome) -> Value {
    match outcome {
        IngestOutcome::Ignored { event, reason } => json!({
            "ignored": true,
            "event": event,
            "reason": reason.as_str(),
        }),
        IngestOutcome::Duplicate { event, delivery_id } => json!({
            "duplicate": true,
            "event": event.as_str(),
            "delivery_id": delivery_id,
        }),
        IngestOutcome::Accepted(accepted) => {
            info!(
                delivery_id = %accepted.delivery_id,
                event = %accepted.event,
                job_id = %accepted.webhook_job_id,
                repo_sync_queued = accepted.repo_sync_queued,
                "webhook accepted"
            );
            json!({
                "event": accepted.event.as_str(),
                "delivery_id": accepted.delivery_id,
                "webhook_job_id": accepted.webhook_job_id,
                "repo_sync_queued": accepted.repo_sync_queued,
                "project_id": accepted.project_id,
            })
        }
    }
}

const fn accepted(body: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::ACCEPTED, Json(body))
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
