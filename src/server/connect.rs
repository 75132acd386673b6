//! Install handshake endpoints.

use super::{AppState, error_response};
use crate::binding::domain::{BindingDomainError, InstallationId, OrgId};
use crate::connect::{ConnectCompletion, ConnectError, ConnectStart};
use crate::sync_job::ports::SyncJobStore;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mockable::Clock;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

/// Query parameters for [`connect_begin_handler`].
#[derive(Debug, Deserialize)]
pub struct BeginQuery {
    org_id: Uuid,
}

/// Query parameters for [`connect_callback_handler`].
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    state: String,
    installation_id: u64,
}

impl IntoResponse for ConnectError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidState => StatusCode::BAD_REQUEST,
            Self::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            Self::TemplateRender { .. } | Self::State(_) | Self::Bindings(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        error_response(status, &self)
    }
}

/// Errors returned by [`connect_callback_handler`].
#[derive(Debug, Error)]
pub enum CallbackError {
    /// `installation_id` is zero or out of range.
    #[error(transparent)]
    InvalidInstallation(#[from] BindingDomainError),
    /// The handshake could not be completed.
    #[error(transparent)]
    Connect(#[from] ConnectError),
}

impl IntoResponse for CallbackError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidInstallation(err) => error_response(StatusCode::BAD_REQUEST, &err),
            Self::Connect(err) => err.into_response(),
        }
    }
}

/// Begins the handshake for `org_id`.
///
/// # Response
///
/// - 200 OK: `{install_url, state, expires_at}`
/// - 400 Bad Request: `org_id` missing or not a UUID
/// - 503 Service Unavailable: no app slug configured
pub async fn connect_begin_handler<S, C>(
    State(app_state): State<AppState<S, C>>,
    Query(query): Query<BeginQuery>,
) -> Result<Json<ConnectStart>, ConnectError>
where
    S: SyncJobStore + ?Sized + 'static,
    C: Clock + Send + Sync + 'static,
{
    let start = app_state
        .services()
        .connect
        .begin(OrgId::from_uuid(query.org_id))?;
    Ok(Json(start))
}

/// Completes the handshake from the install callback.
///
/// # Response
///
/// - 200 OK: `{org_id, installation_id}`
/// - 400 Bad Request: unknown, expired, or reused state, or an invalid
///   installation id
pub async fn connect_callback_handler<S, C>(
    State(app_state): State<AppState<S, C>>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<ConnectCompletion>, CallbackError>
where
    S: SyncJobStore + ?Sized + 'static,
    C: Clock + Send + Sync + 'static,
{
    let installation_id = InstallationId::new(query.installation_id)?;
    let completion = app_state
        .services()
        .connect
        .complete(&query.state, installation_id)
        .await?;
    Ok(Json(completion))
}
