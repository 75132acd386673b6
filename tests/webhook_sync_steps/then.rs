//! Then steps for webhook sync BDD scenarios.

use super::world::WebhookSyncWorld;
use axum::http::StatusCode;
use rstest_bdd_macros::then;
use serde_json::Value;

fn last_response(world: &WebhookSyncWorld) -> Result<&(StatusCode, Value), eyre::Report> {
    world
        .last_response
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing response in scenario world"))
}

#[then("the delivery is accepted")]
fn delivery_accepted(world: &WebhookSyncWorld) -> Result<(), eyre::Report> {
    let (status, body) = last_response(world)?;
    if *status != StatusCode::ACCEPTED {
        return Err(eyre::eyre!("expected 202, got {status}: {body}"));
    }
    if body.get("repo_sync_queued") != Some(&Value::Bool(true)) {
        return Err(eyre::eyre!("expected a queued repo sync, got {body}"));
    }
    let project_id = world.binding()?.project_id().to_string();
    if body.get("project_id").and_then(Value::as_str) != Some(project_id.as_str()) {
        return Err(eyre::eyre!("expected project {project_id}, got {body}"));
    }
    Ok(())
}

#[then("the delivery is reported as a duplicate")]
fn delivery_duplicate(world: &WebhookSyncWorld) -> Result<(), eyre::Report> {
    let (status, body) = last_response(world)?;
    if *status != StatusCode::ACCEPTED || body.get("duplicate") != Some(&Value::Bool(true)) {
        return Err(eyre::eyre!("expected a duplicate acknowledgement, got {status}: {body}"));
    }
    Ok(())
}

#[then("the delivery is rejected as unauthorised")]
fn delivery_unauthorised(world: &WebhookSyncWorld) -> Result<(), eyre::Report> {
    let (status, body) = last_response(world)?;
    if *status != StatusCode::UNAUTHORIZED {
        return Err(eyre::eyre!("expected 401, got {status}: {body}"));
    }
    Ok(())
}

#[then("{count:usize} repo sync job is queued")]
fn repo_sync_jobs_queued(world: &WebhookSyncWorld, count: usize) -> Result<(), eyre::Report> {
    let queued = world.repo_sync_count()?;
    if queued != count {
        return Err(eyre::eyre!("expected {count} repo sync jobs, found {queued}"));
    }
    Ok(())
}

#[then("the poll enqueues {count:u64} jobs")]
fn poll_enqueues(world: &WebhookSyncWorld, count: u64) -> Result<(), eyre::Report> {
    let report = world
        .last_poll
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing poll report in scenario world"))?;
    if report.jobs_enqueued != count {
        return Err(eyre::eyre!(
            "expected {count} jobs from the poll, report was {report:?}"
        ));
    }
    Ok(())
}
