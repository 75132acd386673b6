//! Sync health endpoint.

use super::{AppState, error_response};
use crate::health::{
    DEFAULT_STUCK_THRESHOLD, DurationParseError, SyncHealthError, SyncHealthReport,
    parse_stuck_threshold,
};
use crate::sync_job::ports::SyncJobStore;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mockable::Clock;
use serde::Deserialize;
use thiserror::Error;

/// Query parameters accepted by [`health_handler`].
#[derive(Debug, Default, Deserialize)]
pub struct HealthQuery {
    stuck_threshold: Option<String>,
}

/// Errors returned by [`health_handler`].
#[derive(Debug, Error)]
pub enum HealthRequestError {
    /// `stuck_threshold` is not a positive duration.
    #[error("invalid stuck_threshold: {0}")]
    InvalidThreshold(#[from] DurationParseError),
    /// The report could not be assembled.
    #[error(transparent)]
    Report(#[from] SyncHealthError),
}

impl IntoResponse for HealthRequestError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidThreshold(_) | Self::Report(SyncHealthError::ThresholdOutOfRange(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Report(SyncHealthError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error_response(status, &self)
    }
}

/// Health handler.
///
/// `stuck_threshold` takes a duration string such as `90s`, `15m` or
/// `1h30m` and defaults to fifteen minutes.
///
/// # Response
///
/// - 200 OK with a [`SyncHealthReport`]
/// - 400 Bad Request when `stuck_threshold` is invalid
/// - 500 Internal Server Error when the job store fails
pub async fn health_handler<S, C>(
    State(app_state): State<AppState<S, C>>,
    Query(query): Query<HealthQuery>,
) -> Result<Json<SyncHealthReport>, HealthRequestError>
where
    S: SyncJobStore + ?Sized + 'static,
    C: Clock + Send + Sync + 'static,
{
    let threshold = match query.stuck_threshold.as_deref() {
        Some(raw) => parse_stuck_threshold(raw)?,
        None => DEFAULT_STUCK_THRESHOLD,
    };
    let report = app_state.services().health.report(threshold).await?;
    Ok(Json(report))
}
