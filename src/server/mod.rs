//! HTTP surface for the sync core.
//!
//! Handlers are thin: they translate requests into service calls and
//! service errors into status codes. All durable writes happen inside the
//! services before a handler responds.
//!
//! # Endpoints
//!
//! - `POST /webhooks/github` - verified webhook ingestion (202 on accept,
//!   ignore, or duplicate)
//! - `GET /sync/health` - queue, metrics, and poller health report
//! - `POST /projects/{project_id}/sync` - manual repo sync
//! - `GET /connect/github` - begins the install handshake
//! - `GET /connect/github/callback` - completes the install handshake

mod connect;
mod health;
mod trigger;
mod webhook;

pub use connect::{CallbackError, connect_begin_handler, connect_callback_handler};
pub use health::{HealthRequestError, health_handler};
pub use trigger::trigger_handler;
pub use webhook::webhook_handler;

use crate::connect::ConnectService;
use crate::health::SyncHealthReporter;
use crate::sync_job::{ports::SyncJobStore, services::SyncTriggerService};
use crate::webhook::WebhookIngestService;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mockable::Clock;
use serde_json::json;
use std::fmt;
use std::sync::Arc;

/// Default cap on webhook bodies.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Services the handlers dispatch to.
pub struct AppServices<S, C>
where
    S: SyncJobStore + ?Sized,
    C: Clock + Send + Sync,
{
    /// Webhook pipeline.
    pub ingest: WebhookIngestService<S, C>,
    /// Manual trigger.
    pub trigger: SyncTriggerService<S, C>,
    /// Health aggregation.
    pub health: SyncHealthReporter<S, C>,
    /// Install handshake.
    pub connect: ConnectService<C>,
}

/// Shared application state passed to every handler.
pub struct AppState<S, C>
where
    S: SyncJobStore + ?Sized,
    C: Clock + Send + Sync,
{
    inner: Arc<AppStateInner<S, C>>,
}

struct AppStateInner<S, C>
where
    S: SyncJobStore + ?Sized,
    C: Clock + Send + Sync,
{
    services: AppServices<S, C>,
    max_body_bytes: usize,
}

impl<S, C> AppState<S, C>
where
    S: SyncJobStore + ?Sized,
    C: Clock + Send + Sync,
{
    /// Wraps `services` with the given webhook body cap.
    #[must_use]
    pub fn new(services: AppServices<S, C>, max_body_bytes: usize) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                services,
                max_body_bytes,
            }),
        }
    }

    /// Returns the webhook body cap in bytes.
    #[must_use]
    pub fn max_body_bytes(&self) -> usize {
        self.inner.max_body_bytes
    }

    fn services(&self) -> &AppServices<S, C> {
        &self.inner.services
    }
}

impl<S, C> Clone for AppState<S, C>
where
    S: SyncJobStore + ?Sized,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Builds the router with every endpoint.
#[must_use]
pub fn build_router<S, C>(app_state: AppState<S, C>) -> axum::Router
where
    S: SyncJobStore + ?Sized + 'static,
    C: Clock + Send + Sync + 'static,
{
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/webhooks/github", post(webhook_handler::<S, C>))
        .route("/sync/health", get(health_handler::<S, C>))
        .route("/projects/{project_id}/sync", post(trigger_handler::<S, C>))
        .route("/connect/github", get(connect_begin_handler::<S, C>))
        .route("/connect/github/callback", get(connect_callback_handler::<S, C>))
        .with_state(app_state)
}

/// Renders `err` as `{"error": "..."}` with `status`.
fn error_response(status: StatusCode, err: &impl fmt::Display) -> Response {
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}
