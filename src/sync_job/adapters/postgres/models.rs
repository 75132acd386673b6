//! Diesel row models for sync job persistence.

use super::schema::sync_jobs;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for sync jobs.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = sync_jobs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SyncJobRow {
    /// Job identifier.
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pub id: uuid::Uuid,
    /// Owning workspace.
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pub org_id: uuid::Uuid,
    /// Optional project scope.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Uuid>)]
    pub project_id: Option<uuid::Uuid>,
    /// Job type tag.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub job_type: String,
    /// Lifecycle status.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub status: String,
    /// Opaque payload.
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub payload: Value,
    /// Idempotency key.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Varchar>)]
    pub source_event_id: Option<String>,
    /// Failed attempts.
    #[diesel(sql_type = diesel::sql_types::Int4)]
    pub attempts: i32,
    /// Attempt budget.
    #[diesel(sql_type = diesel::sql_types::Int4)]
    pub max_attempts: i32,
    /// Last failure class.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Varchar>)]
    pub error_class: Option<String>,
    /// Last failure message.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    pub error_message: Option<String>,
    /// Earliest lease time.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub available_at: DateTime<Utc>,
    /// Creation timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub created_at: DateTime<Utc>,
    /// Last lifecycle timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub updated_at: DateTime<Utc>,
}

/// Insert model for sync jobs.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = sync_jobs)]
pub struct NewSyncJobRow {
    /// Job identifier.
    pub id: uuid::Uuid,
    /// Owning workspace.
    pub org_id: uuid::Uuid,
    /// Optional project scope.
    pub project_id: Option<uuid::Uuid>,
    /// Job type tag.
    pub job_type: String,
    /// Lifecycle status.
    pub status: String,
    /// Opaque payload.
    pub payload: Value,
    /// Idempotency key.
    pub source_event_id: Option<String>,
    /// Failed attempts.
    pub attempts: i32,
    /// Attempt budget.
    pub max_attempts: i32,
    /// Earliest lease time.
    pub available_at: DateTime<Utc>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last lifecycle timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle columns rewritten after a transition.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = sync_jobs)]
#[diesel(treat_none_as_null = true)]
pub struct SyncJobTransitionRow {
    /// Lifecycle status.
    pub status: String,
    /// Failed attempts.
    pub attempts: i32,
    /// Last failure class.
    pub error_class: Option<String>,
    /// Last failure message.
    pub error_message: Option<String>,
    /// Earliest lease time.
    pub available_at: DateTime<Utc>,
    /// Last lifecycle timestamp.
    pub updated_at: DateTime<Utc>,
}
