//! Diesel schema for the durable sync job queue.

diesel::table! {
    /// Durable, leasable units of reconciliation work.
    sync_jobs (id) {
        /// Job identifier.
        id -> Uuid,
        /// Owning workspace.
        org_id -> Uuid,
        /// Optional project scope.
        project_id -> Nullable<Uuid>,
        /// Job type tag.
        #[max_length = 50]
        job_type -> Varchar,
        /// Lifecycle status.
        #[max_length = 50]
        status -> Varchar,
        /// Opaque worker payload.
        payload -> Jsonb,
        /// Optional idempotency key, unique per workspace and job type.
        #[max_length = 255]
        source_event_id -> Nullable<Varchar>,
        /// Failed attempts so far.
        attempts -> Int4,
        /// Attempt budget.
        max_attempts -> Int4,
        /// Class of the most recent failure.
        #[max_length = 100]
        error_class -> Nullable<Varchar>,
        /// Message of the most recent failure.
        error_message -> Nullable<Text>,
        /// Earliest lease time.
        available_at -> Timestamptz,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last lifecycle timestamp.
        updated_at -> Timestamptz,
    }
}
