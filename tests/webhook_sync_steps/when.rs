//! When steps for webhook sync BDD scenarios.

use super::world::{INSTALLATION, SECRET, WebhookSyncWorld, run_async};
use axum::body::Body;
use axum::http::Request;
use eyre::WrapErr;
use reposync::binding::{
    domain::{BranchName, CommitSha},
    ports::BindingDirectory,
};
use reposync::sync_job::domain::SyncJobType;
use reposync::webhook::sign_payload;
use rstest_bdd_macros::when;
use serde_json::{Value, json};
use std::time::Duration;

fn push_request(
    delivery_id: &str,
    repository: &str,
    branch: &str,
    sha: &str,
    secret: &str,
) -> Result<Request<Body>, eyre::Report> {
    let body = json!({
        "ref": format!("refs/heads/{branch}"),
        "after": sha,
        "installation": { "id": INSTALLATION },
        "repository": { "full_name": repository }
    })
    .to_string()
    .into_bytes();
    let signature = sign_payload(&body, secret.as_bytes())
        .ok_or_else(|| eyre::eyre!("failed to sign scenario payload"))?;
    Request::builder()
        .method("POST")
        .uri("/webhooks/github")
        .header("content-type", "application/json")
        .header("x-github-event", "push")
        .header("x-github-delivery", delivery_id)
        .header("x-hub-signature-256", signature)
        .body(Body::from(body))
        .wrap_err("build webhook request")
}

#[when(r#"push delivery "{delivery_id}" moves "{branch}" to "{sha}""#)]
fn push_delivery(
    world: &mut WebhookSyncWorld,
    delivery_id: String,
    branch: String,
    sha: String,
) -> Result<(), eyre::Report> {
    let repository = world.binding()?.repository().as_str().to_owned();
    let request = push_request(&delivery_id, &repository, &branch, &sha, SECRET)?;
    world.last_push = Some((delivery_id, branch, sha));
    world.send(request)
}

#[when(r#"push delivery "{delivery_id}" is replayed"#)]
fn push_replayed(world: &mut WebhookSyncWorld, delivery_id: String) -> Result<(), eyre::Report> {
    let (previous_id, branch, sha) = world
        .last_push
        .clone()
        .ok_or_else(|| eyre::eyre!("missing previous push in scenario world"))?;
    if previous_id != delivery_id {
        return Err(eyre::eyre!("no earlier push with delivery id {delivery_id}"));
    }
    let repository = world.binding()?.repository().as_str().to_owned();
    let request = push_request(&delivery_id, &repository, &branch, &sha, SECRET)?;
    world.send(request)
}

#[when(r#"push delivery "{delivery_id}" is signed with the wrong secret"#)]
fn push_with_wrong_secret(
    world: &mut WebhookSyncWorld,
    delivery_id: String,
) -> Result<(), eyre::Report> {
    let binding = world.binding()?;
    let repository = binding.repository().as_str().to_owned();
    let branch = binding.default_branch().name().as_str().to_owned();
    let request = push_request(
        &delivery_id,
        &repository,
        &branch,
        "3333333333333333333333333333333333333333",
        "not-the-secret",
    )?;
    world.send(request)
}

#[when(r#""{branch}" is recorded as synced and the remote head has not moved"#)]
fn branch_synced_at_head(world: &mut WebhookSyncWorld, branch: String) -> Result<(), eyre::Report> {
    let (_, pushed_branch, sha) = world
        .last_push
        .clone()
        .ok_or_else(|| eyre::eyre!("missing previous push in scenario world"))?;
    if pushed_branch != branch {
        return Err(eyre::eyre!("last push moved {pushed_branch}, not {branch}"));
    }
    let binding = world.binding()?;
    let project_id = binding.project_id();
    let repository = binding.repository().clone();
    let branch_name = BranchName::new(branch).wrap_err("scenario branch")?;
    let head = CommitSha::new(sha).wrap_err("scenario sha")?;

    let now = world.clock.now();
    run_async(
        world
            .directory
            .record_synced_commit(project_id, &branch_name, &head, now),
    )
    .wrap_err("record synced commit")?;
    world.heads.set_head(repository, branch_name, head);
    Ok(())
}

#[when("the drift poller runs")]
fn poller_runs(world: &mut WebhookSyncWorld) -> Result<(), eyre::Report> {
    let report = run_async(world.poller.run_once(&tokio_util::sync::CancellationToken::new()))
        .wrap_err("run drift poll cycle")?;
    world.last_poll = Some(report);
    Ok(())
}

#[when(r#"the remote head of "{branch}" is the pushed commit"#)]
fn remote_head_is_pushed_commit(
    world: &mut WebhookSyncWorld,
    branch: String,
) -> Result<(), eyre::Report> {
    let (_, pushed_branch, sha) = world
        .last_push
        .clone()
        .ok_or_else(|| eyre::eyre!("missing previous push in scenario world"))?;
    if pushed_branch != branch {
        return Err(eyre::eyre!("last push moved {pushed_branch}, not {branch}"));
    }
    let repository = world.binding()?.repository().clone();
    world.heads.set_head(
        repository,
        BranchName::new(branch).wrap_err("scenario branch")?,
        CommitSha::new(sha).wrap_err("scenario sha")?,
    );
    Ok(())
}

#[when(r#""{branch}" is moved upstream to "{sha}""#)]
fn branch_moved_upstream(
    world: &mut WebhookSyncWorld,
    branch: String,
    sha: String,
) -> Result<(), eyre::Report> {
    let repository = world.binding()?.repository().clone();
    world.heads.set_head(
        repository,
        BranchName::new(branch).wrap_err("scenario branch")?,
        CommitSha::new(sha).wrap_err("scenario sha")?,
    );
    Ok(())
}

#[when(r#"the pending sync of "{branch}" completes"#)]
fn pending_sync_completes(world: &mut WebhookSyncWorld, branch: String) -> Result<(), eyre::Report> {
    let job = run_async(world.queue.pickup_next(SyncJobType::RepoSync))
        .wrap_err("pick up repo sync")?
        .ok_or_else(|| eyre::eyre!("no pending repo sync in scenario world"))?;
    let payload = job.payload();
    if payload.get("branch").and_then(Value::as_str) != Some(branch.as_str()) {
        return Err(eyre::eyre!("pending sync targets another branch: {payload}"));
    }
    let head_sha = payload
        .get("head_sha")
        .and_then(Value::as_str)
        .ok_or_else(|| eyre::eyre!("pending sync has no head: {payload}"))?;
    let head = CommitSha::new(head_sha).wrap_err("payload sha")?;
    let branch_name = BranchName::new(branch).wrap_err("scenario branch")?;
    let project_id = world.binding()?.project_id();

    run_async(world.queue.mark_completed(job.id())).wrap_err("complete repo sync")?;
    let now = world.clock.now();
    run_async(
        world
            .directory
            .record_synced_commit(project_id, &branch_name, &head, now),
    )
    .wrap_err("record synced commit")?;
    world.clock.advance(Duration::from_secs(60));
    Ok(())
}
