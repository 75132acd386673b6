//! Diesel schema for repository bindings.

diesel::table! {
    /// Installations linked to workspaces by the connect handshake.
    installations (installation_id) {
        /// Remote installation identifier.
        installation_id -> Int8,
        /// Owning workspace.
        org_id -> Uuid,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Project to repository bindings.
    repo_bindings (project_id) {
        /// Bound project.
        project_id -> Uuid,
        /// Owning workspace.
        org_id -> Uuid,
        /// Repository full name (`owner/repo`).
        #[max_length = 255]
        repository -> Varchar,
        /// Default branch name.
        #[max_length = 200]
        default_branch -> Varchar,
        /// Whether sync is enabled.
        enabled -> Bool,
        /// Sync mode.
        #[max_length = 50]
        sync_mode -> Varchar,
        /// Conflict state.
        #[max_length = 50]
        conflict_state -> Varchar,
        /// Last synced commit on the default branch.
        #[max_length = 64]
        last_synced_sha -> Nullable<Varchar>,
        /// When the default branch was last synced.
        last_synced_at -> Nullable<Timestamptz>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Additional branches tracked per project.
    active_branches (project_id, branch) {
        /// Owning project.
        project_id -> Uuid,
        /// Branch name.
        #[max_length = 200]
        branch -> Varchar,
        /// Last synced commit on this branch.
        #[max_length = 64]
        last_synced_sha -> Nullable<Varchar>,
        /// When this branch was last synced.
        last_synced_at -> Nullable<Timestamptz>,
    }
}
