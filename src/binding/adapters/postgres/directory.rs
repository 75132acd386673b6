//! `PostgreSQL` implementation of the binding directory.

use super::{
    models::{ActiveBranchRow, NewInstallationRow, RepoBindingRow},
    schema::{active_branches, installations, repo_bindings},
};
use crate::binding::{
    domain::{
        BranchName, CommitSha, ConflictState, InstallationId, OrgId, ProjectId, RepoBinding,
        RepositoryFullName, SyncMode, TrackedBranch,
    },
    ports::{BindingDirectory, BindingDirectoryError, BindingDirectoryResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::upsert::excluded;
use std::collections::HashMap;

/// `PostgreSQL` connection pool type used by binding adapters.
pub type BindingPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed binding directory.
#[derive(Debug, Clone)]
pub struct PostgresBindingDirectory {
    pool: BindingPgPool,
}

impl PostgresBindingDirectory {
    /// Creates a directory from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: BindingPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> BindingDirectoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> BindingDirectoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(BindingDirectoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(BindingDirectoryError::persistence)?
    }
}

impl From<diesel::result::Error> for BindingDirectoryError {
    fn from(err: diesel::result::Error) -> Self {
        Self::persistence(err)
    }
}

#[async_trait]
impl BindingDirectory for PostgresBindingDirectory {
    async fn workspace_for_installation(
        &self,
        installation_id: InstallationId,
    ) -> BindingDirectoryResult<Option<OrgId>> {
        let key = to_bigint(installation_id)?;
        self.run_blocking(move |connection| {
            let org = installations::table
                .filter(installations::installation_id.eq(key))
                .select(installations::org_id)
                .first::<uuid::Uuid>(connection)
                .optional()?;
            Ok(org.map(OrgId::from_uuid))
        })
        .await
    }

    async fn workspace_for_repository(
        &self,
        repository: &RepositoryFullName,
    ) -> BindingDirectoryResult<Option<OrgId>> {
        let name = repository.as_str().to_owned();
        self.run_blocking(move |connection| {
            let org = repo_bindings::table
                .filter(repo_bindings::repository.eq(name))
                .order(repo_bindings::created_at.asc())
                .select(repo_bindings::org_id)
                .first::<uuid::Uuid>(connection)
                .optional()?;
            Ok(org.map(OrgId::from_uuid))
        })
        .await
    }

    async fn binding_for_repository(
        &self,
        org_id: OrgId,
        repository: &RepositoryFullName,
    ) -> BindingDirectoryResult<Option<RepoBinding>> {
        let name = repository.as_str().to_owned();
        self.run_blocking(move |connection| {
            let row = repo_bindings::table
                .filter(repo_bindings::org_id.eq(org_id.into_inner()))
                .filter(repo_bindings::repository.eq(name))
                .select(RepoBindingRow::as_select())
                .first(connection)
                .optional()?;
            row.map(|found| load_binding(connection, found)).transpose()
        })
        .await
    }

    async fn binding_for_project(
        &self,
        project_id: ProjectId,
    ) -> BindingDirectoryResult<Option<RepoBinding>> {
        self.run_blocking(move |connection| {
            let row = repo_bindings::table
                .find(project_id.into_inner())
                .select(RepoBindingRow::as_select())
                .first(connection)
                .optional()?;
            row.map(|found| load_binding(connection, found)).transpose()
        })
        .await
    }

    async fn tracked_bindings(&self) -> BindingDirectoryResult<Vec<RepoBinding>> {
        self.run_blocking(|connection| {
            let rows = repo_bindings::table
                .filter(repo_bindings::enabled.eq(true))
                .order(repo_bindings::project_id.asc())
                .select(RepoBindingRow::as_select())
                .load(connection)?;
            let project_ids: Vec<uuid::Uuid> = rows.iter().map(|row| row.project_id).collect();
            let branch_rows = active_branches::table
                .filter(active_branches::project_id.eq_any(project_ids))
                .order((active_branches::project_id, active_branches::branch))
                .select(ActiveBranchRow::as_select())
                .load(connection)?;

            let mut branches_by_project: HashMap<uuid::Uuid, Vec<ActiveBranchRow>> =
                HashMap::new();
            for branch_row in branch_rows {
                branches_by_project
                    .entry(branch_row.project_id)
                    .or_default()
                    .push(branch_row);
            }

            rows.into_iter()
                .map(|row| {
                    let branches = branches_by_project.remove(&row.project_id).unwrap_or_default();
                    row_to_binding(row, branches)
                })
                .collect()
        })
        .await
    }

    async fn record_installation(
        &self,
        org_id: OrgId,
        installation_id: InstallationId,
    ) -> BindingDirectoryResult<()> {
        let now = Utc::now();
        let new_row = NewInstallationRow {
            installation_id: to_bigint(installation_id)?,
            org_id: org_id.into_inner(),
            created_at: now,
            updated_at: now,
        };
        self.run_blocking(move |connection| {
            diesel::insert_into(installations::table)
                .values(&new_row)
                .on_conflict(installations::installation_id)
                .do_update()
                .set((
                    installations::org_id.eq(excluded(installations::org_id)),
                    installations::updated_at.eq(excluded(installations::updated_at)),
                ))
                .execute(connection)?;
            Ok(())
        })
        .await
    }

    async fn record_synced_commit(
        &self,
        project_id: ProjectId,
        branch: &BranchName,
        sha: &CommitSha,
        synced_at: DateTime<Utc>,
    ) -> BindingDirectoryResult<()> {
        let branch_name = branch.clone();
        let sha_text = sha.as_str().to_owned();
        self.run_blocking(move |connection| {
            connection.transaction(|tx| {
                let default_branch = repo_bindings::table
                    .find(project_id.into_inner())
                    .select(repo_bindings::default_branch)
                    .for_update()
                    .first::<String>(tx)
                    .optional()?
                    .ok_or(BindingDirectoryError::ProjectNotFound(project_id))?;

                let updated = if default_branch == branch_name.as_str() {
                    diesel::update(repo_bindings::table.find(project_id.into_inner()))
                        .set((
                            repo_bindings::last_synced_sha.eq(Some(sha_text)),
                            repo_bindings::last_synced_at.eq(Some(synced_at)),
                            repo_bindings::updated_at.eq(synced_at),
                        ))
                        .execute(tx)?
                } else {
                    diesel::update(
                        active_branches::table
                            .find((project_id.into_inner(), branch_name.as_str().to_owned())),
                    )
                    .set((
                        active_branches::last_synced_sha.eq(Some(sha_text)),
                        active_branches::last_synced_at.eq(Some(synced_at)),
                    ))
                    .execute(tx)?
                };

                if updated == 0 {
                    return Err(BindingDirectoryError::BranchNotTracked {
                        project_id,
                        branch: branch_name,
                    });
                }
                Ok(())
            })
        })
        .await
    }
}

fn to_bigint(installation_id: InstallationId) -> BindingDirectoryResult<i64> {
    i64::try_from(installation_id.value()).map_err(BindingDirectoryError::persistence)
}

fn load_binding(
    connection: &mut PgConnection,
    row: RepoBindingRow,
) -> BindingDirectoryResult<RepoBinding> {
    let branches = active_branches::table
        .filter(active_branches::project_id.eq(row.project_id))
        .order(active_branches::branch.asc())
        .select(ActiveBranchRow::as_select())
        .load(connection)?;
    row_to_binding(row, branches)
}

fn row_to_binding(
    row: RepoBindingRow,
    branches: Vec<ActiveBranchRow>,
) -> BindingDirectoryResult<RepoBinding> {
    let RepoBindingRow {
        project_id,
        org_id,
        repository,
        default_branch,
        enabled,
        sync_mode,
        conflict_state,
        last_synced_sha,
        last_synced_at,
    } = row;

    let default_tracked = tracked_branch(&default_branch, last_synced_sha, last_synced_at)?;
    let mut binding = RepoBinding::new(
        OrgId::from_uuid(org_id),
        ProjectId::from_uuid(project_id),
        RepositoryFullName::new(repository).map_err(BindingDirectoryError::persistence)?,
        default_tracked.name().clone(),
    )
    .with_default_branch(default_tracked)
    .with_enabled(enabled)
    .with_sync_mode(
        SyncMode::try_from(sync_mode.as_str()).map_err(BindingDirectoryError::persistence)?,
    )
    .with_conflict_state(
        ConflictState::try_from(conflict_state.as_str())
            .map_err(BindingDirectoryError::persistence)?,
    );

    for branch_row in branches {
        binding = binding.with_active_branch(tracked_branch(
            &branch_row.branch,
            branch_row.last_synced_sha,
            branch_row.last_synced_at,
        )?);
    }
    Ok(binding)
}

fn tracked_branch(
    name: &str,
    last_synced_sha: Option<String>,
    last_synced_at: Option<DateTime<Utc>>,
) -> BindingDirectoryResult<TrackedBranch> {
    let branch = TrackedBranch::new(BranchName::new(name).map_err(BindingDirectoryError::persistence)?);
    match (last_synced_sha, last_synced_at) {
        (Some(sha), Some(at)) => Ok(branch.with_last_synced(
            CommitSha::new(sha).map_err(BindingDirectoryError::persistence)?,
            at,
        )),
        _ => Ok(branch),
    }
}
