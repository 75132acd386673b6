//! Manual sync endpoint.

use super::{AppState, error_response};
use crate::binding::domain::ProjectId;
use crate::sync_job::{
    domain::SyncJob,
    ports::SyncJobStore,
    services::SyncTriggerError,
};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mockable::Clock;
use serde_json::{Value, json};
use uuid::Uuid;

impl IntoResponse for SyncTriggerError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::ProjectNotFound(_) => StatusCode::NOT_FOUND,
            Self::SyncDisabled(_) => StatusCode::CONFLICT,
            Self::Bindings(_) | Self::Queue(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error_response(status, &self)
    }
}

/// Manual trigger handler.
///
/// # Response
///
/// - 202 Accepted: `{project_id, job_ids}`, one job per tracked branch
/// - 404 Not Found: the project has no binding
/// - 409 Conflict: sync is disabled for the project
pub async fn trigger_handler<S, C>(
    State(app_state): State<AppState<S, C>>,
    Path(project_id): Path<Uuid>,
) -> Result<(StatusCode, Json<Value>), SyncTriggerError>
where
    S: SyncJobStore + ?Sized + 'static,
    C: Clock + Send + Sync + 'static,
{
    let project_id = ProjectId::from_uuid(project_id);
    let jobs = app_state.services().trigger.trigger_manual(project_id).await?;
    let job_ids: Vec<_> = jobs.iter().map(SyncJob::id).collect();
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "project_id": project_id, "job_ids": job_ids })),
    ))
}
