//! Given steps for webhook sync BDD scenarios.

use super::world::{WebhookSyncWorld, run_async};
use eyre::WrapErr;
use reposync::binding::{
    domain::{BranchName, CommitSha, OrgId, ProjectId, RepoBinding, RepositoryFullName},
    ports::BindingDirectory,
};
use rstest_bdd_macros::given;

#[given(r#"a project bound to "{repository}" tracking "{branch}""#)]
fn project_bound(
    world: &mut WebhookSyncWorld,
    repository: String,
    branch: String,
) -> Result<(), eyre::Report> {
    let repository = RepositoryFullName::new(repository).wrap_err("scenario repository")?;
    let branch = BranchName::new(branch).wrap_err("scenario branch")?;
    let binding = RepoBinding::new(OrgId::new(), ProjectId::new(), repository, branch);

    world
        .directory
        .upsert_binding(binding.clone())
        .wrap_err("seed binding")?;
    run_async(
        world
            .directory
            .record_installation(binding.org_id(), WebhookSyncWorld::installation()?),
    )
    .wrap_err("seed installation")?;
    world.binding = Some(binding);
    Ok(())
}

#[given(r#""{branch}" was last synced at "{sha}""#)]
fn branch_last_synced(
    world: &mut WebhookSyncWorld,
    branch: String,
    sha: String,
) -> Result<(), eyre::Report> {
    let project_id = world.binding()?.project_id();
    let branch = BranchName::new(branch).wrap_err("scenario branch")?;
    let sha = CommitSha::new(sha).wrap_err("scenario sha")?;
    let now = world.clock.now();
    run_async(world.directory.record_synced_commit(project_id, &branch, &sha, now))
        .wrap_err("record synced commit")?;
    Ok(())
}

#[given(r#"the remote head of "{branch}" is "{sha}""#)]
fn remote_head_is(
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
