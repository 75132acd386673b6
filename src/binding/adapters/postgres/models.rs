//! Diesel row models for binding persistence.

use super::schema::{active_branches, installations, repo_bindings};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Query result row for repository bindings.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = repo_bindings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RepoBindingRow {
    /// Bound project.
    pub project_id: uuid::Uuid,
    /// Owning workspace.
    pub org_id: uuid::Uuid,
    /// Repository full name.
    pub repository: String,
    /// Default branch.
    pub default_branch: String,
    /// Enabled flag.
    pub enabled: bool,
    /// Sync mode.
    pub sync_mode: String,
    /// Conflict state.
    pub conflict_state: String,
    /// Default-branch last synced commit.
    pub last_synced_sha: Option<String>,
    /// Default-branch last synced timestamp.
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Query result row for active branches.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = active_branches)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ActiveBranchRow {
    /// Owning project.
    pub project_id: uuid::Uuid,
    /// Branch name.
    pub branch: String,
    /// Last synced commit.
    pub last_synced_sha: Option<String>,
    /// Last synced timestamp.
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Insert model for installations.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = installations)]
pub struct NewInstallationRow {
    /// Remote installation identifier.
    pub installation_id: i64,
    /// Owning workspace.
    pub org_id: uuid::Uuid,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}
