//! `PostgreSQL` implementation of the sync job store.

use super::{
    models::{NewSyncJobRow, SyncJobRow, SyncJobTransitionRow},
    schema::sync_jobs,
};
use crate::binding::domain::{BranchName, CommitSha, OrgId, ProjectId};
use crate::sync_job::{
    domain::{
        JobFailure, PersistedSyncJobData, RetryPolicy, SourceEventId, SyncJob, SyncJobDomainError,
        SyncJobId, SyncJobStatus, SyncJobType,
    },
    ports::{EnqueueOutcome, QueueDepth, SyncJobStore, SyncJobStoreError, SyncJobStoreResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use std::collections::BTreeMap;

/// `PostgreSQL` connection pool type used by the sync job store.
pub type SyncJobPgPool = Pool<ConnectionManager<PgConnection>>;

/// Claims one eligible job in a single statement. `SKIP LOCKED` lets
/// concurrent pickers pass over a row another transaction is claiming, so no
/// two callers can return the same job.
const PICKUP_NEXT_SQL: &str = concat!(
    "UPDATE sync_jobs SET status = 'in_progress', updated_at = $2 ",
    "WHERE id = (",
    "SELECT id FROM sync_jobs ",
    "WHERE job_type = $1 AND status = 'queued' AND available_at <= $2 ",
    "ORDER BY available_at, created_at, id ",
    "LIMIT 1 FOR UPDATE SKIP LOCKED",
    ") RETURNING id, org_id, project_id, job_type, status, payload, source_event_id, ",
    "attempts, max_attempts, error_class, error_message, available_at, created_at, updated_at",
);

/// Oldest non-terminal `repo_sync` job of a project targeting one branch
/// head.
const FIND_PENDING_REPO_SYNC_SQL: &str = concat!(
    "SELECT id, org_id, project_id, job_type, status, payload, source_event_id, ",
    "attempts, max_attempts, error_class, error_message, available_at, created_at, updated_at ",
    "FROM sync_jobs ",
    "WHERE project_id = $1 AND job_type = 'repo_sync' ",
    "AND status IN ('queued', 'in_progress') ",
    "AND payload->>'branch' = $2 AND payload->>'head_sha' = $3 ",
    "ORDER BY created_at, id LIMIT 1",
);

/// `PostgreSQL`-backed sync job store.
#[derive(Debug, Clone)]
pub struct PostgresSyncJobStore {
    pool: SyncJobPgPool,
}

impl PostgresSyncJobStore {
    /// Creates a store from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: SyncJobPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> SyncJobStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> SyncJobStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(SyncJobStoreError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(SyncJobStoreError::persistence)?
    }
}

impl From<diesel::result::Error> for SyncJobStoreError {
    fn from(err: diesel::result::Error) -> Self {
        Self::persistence(err)
    }
}

#[async_trait]
impl SyncJobStore for PostgresSyncJobStore {
    async fn enqueue(&self, job: &SyncJob) -> SyncJobStoreResult<EnqueueOutcome> {
        let new_row = to_new_row(job)?;
        let candidate = job.clone();

        self.run_blocking(move |connection| {
            let inserted = diesel::insert_into(sync_jobs::table)
                .values(&new_row)
                .on_conflict_do_nothing()
                .execute(connection)?;
            if inserted == 1 {
                return Ok(EnqueueOutcome {
                    job: candidate,
                    created: true,
                });
            }

            let Some(key) = candidate.source_event_id() else {
                return Err(SyncJobStoreError::persistence(std::io::Error::other(
                    format!("sync job {} already exists", candidate.id()),
                )));
            };
            let existing = find_by_idempotency_key(
                connection,
                candidate.org_id(),
                candidate.job_type(),
                key,
            )?;
            Ok(EnqueueOutcome {
                job: existing,
                created: false,
            })
        })
        .await
    }

    async fn pickup_next(
        &self,
        job_type: SyncJobType,
        now: DateTime<Utc>,
    ) -> SyncJobStoreResult<Option<SyncJob>> {
        self.run_blocking(move |connection| {
            let row = diesel::sql_query(PICKUP_NEXT_SQL)
                .bind::<diesel::sql_types::Varchar, _>(job_type.as_str())
                .bind::<diesel::sql_types::Timestamptz, _>(now)
                .get_result::<SyncJobRow>(connection)
                .optional()?;
            row.map(row_to_job).transpose()
        })
        .await
    }

    async fn mark_completed(&self, id: SyncJobId, now: DateTime<Utc>) -> SyncJobStoreResult<SyncJob> {
        self.run_blocking(move |connection| {
            transition_locked(connection, id, |job| job.complete(now))
        })
        .await
    }

    async fn record_failure(
        &self,
        id: SyncJobId,
        failure: &JobFailure,
        policy: &RetryPolicy,
    ) -> SyncJobStoreResult<SyncJob> {
        let reported = failure.clone();
        let retry_policy = *policy;
        self.run_blocking(move |connection| {
            transition_locked(connection, id, |job| {
                job.record_failure(&reported, &retry_policy).map(|_| ())
            })
        })
        .await
    }

    async fn queue_depth(&self) -> SyncJobStoreResult<Vec<QueueDepth>> {
        self.run_blocking(move |connection| {
            let rows = sync_jobs::table
                .filter(sync_jobs::status.eq_any([
                    SyncJobStatus::Queued.as_str(),
                    SyncJobStatus::InProgress.as_str(),
                ]))
                .group_by((sync_jobs::job_type, sync_jobs::status))
                .select((
                    sync_jobs::job_type,
                    sync_jobs::status,
                    diesel::dsl::count_star(),
                ))
                .load::<(String, String, i64)>(connection)?;
            aggregate_depths(rows)
        })
        .await
    }

    async fn count_stuck(&self, older_than: DateTime<Utc>) -> SyncJobStoreResult<u64> {
        self.run_blocking(move |connection| {
            let count = sync_jobs::table
                .filter(sync_jobs::status.eq(SyncJobStatus::InProgress.as_str()))
                .filter(sync_jobs::updated_at.lt(older_than))
                .count()
                .get_result::<i64>(connection)?;
            u64::try_from(count).map_err(SyncJobStoreError::persistence)
        })
        .await
    }

    async fn find_latest_by_project_and_type(
        &self,
        project_id: ProjectId,
        job_type: SyncJobType,
    ) -> SyncJobStoreResult<Option<SyncJob>> {
        self.run_blocking(move |connection| {
            let row = sync_jobs::table
                .filter(sync_jobs::project_id.eq(project_id.into_inner()))
                .filter(sync_jobs::job_type.eq(job_type.as_str()))
                .order((sync_jobs::created_at.desc(), sync_jobs::id.desc()))
                .select(SyncJobRow::as_select())
                .first(connection)
                .optional()?;
            row.map(row_to_job).transpose()
        })
        .await
    }

    async fn find_pending_repo_sync(
        &self,
        project_id: ProjectId,
        branch: &BranchName,
        head_sha: &CommitSha,
    ) -> SyncJobStoreResult<Option<SyncJob>> {
        let branch_name = branch.as_str().to_owned();
        let head = head_sha.as_str().to_owned();
        self.run_blocking(move |connection| {
            let row = diesel::sql_query(FIND_PENDING_REPO_SYNC_SQL)
                .bind::<diesel::sql_types::Uuid, _>(project_id.into_inner())
                .bind::<diesel::sql_types::Text, _>(branch_name)
                .bind::<diesel::sql_types::Text, _>(head)
                .get_result::<SyncJobRow>(connection)
                .optional()?;
            row.map(row_to_job).transpose()
        })
        .await
    }

    async fn find_by_id(&self, id: SyncJobId) -> SyncJobStoreResult<Option<SyncJob>> {
        self.run_blocking(move |connection| {
            let row = sync_jobs::table
                .find(id.into_inner())
                .select(SyncJobRow::as_select())
                .first(connection)
                .optional()?;
            row.map(row_to_job).transpose()
        })
        .await
    }
}

/// Loads a job under a row lock, applies a domain transition, and writes the
/// lifecycle columns back in the same transaction.
fn transition_locked<F>(
    connection: &mut PgConnection,
    id: SyncJobId,
    apply: F,
) -> SyncJobStoreResult<SyncJob>
where
    F: FnOnce(&mut SyncJob) -> Result<(), SyncJobDomainError>,
{
    connection.transaction(|tx| {
        let row = sync_jobs::table
            .find(id.into_inner())
            .select(SyncJobRow::as_select())
            .for_update()
            .first(tx)
            .optional()?
            .ok_or(SyncJobStoreError::NotFound(id))?;
        let mut job = row_to_job(row)?;
        apply(&mut job)?;

        diesel::update(sync_jobs::table.find(id.into_inner()))
            .set(&to_transition_row(&job)?)
            .execute(tx)?;
        Ok(job)
    })
}

fn find_by_idempotency_key(
    connection: &mut PgConnection,
    org_id: OrgId,
    job_type: SyncJobType,
    key: &SourceEventId,
) -> SyncJobStoreResult<SyncJob> {
    let row = sync_jobs::table
        .filter(sync_jobs::org_id.eq(org_id.into_inner()))
        .filter(sync_jobs::job_type.eq(job_type.as_str()))
        .filter(sync_jobs::source_event_id.eq(key.as_str()))
        .select(SyncJobRow::as_select())
        .first(connection)?;
    row_to_job(row)
}

fn aggregate_depths(rows: Vec<(String, String, i64)>) -> SyncJobStoreResult<Vec<QueueDepth>> {
    let mut depths: BTreeMap<SyncJobType, QueueDepth> = BTreeMap::new();
    for (raw_type, raw_status, count) in rows {
        let job_type =
            SyncJobType::try_from(raw_type.as_str()).map_err(SyncJobStoreError::persistence)?;
        let status =
            SyncJobStatus::try_from(raw_status.as_str()).map_err(SyncJobStoreError::persistence)?;
        let total = u64::try_from(count).map_err(SyncJobStoreError::persistence)?;
        let entry = depths.entry(job_type).or_insert(QueueDepth {
            job_type,
            queued: 0,
            in_progress: 0,
        });
        match status {
            SyncJobStatus::Queued => entry.queued = total,
            SyncJobStatus::InProgress => entry.in_progress = total,
            SyncJobStatus::Completed | SyncJobStatus::DeadLetter => {}
        }
    }
    Ok(depths.into_values().collect())
}

fn to_attempt_column(value: u32) -> SyncJobStoreResult<i32> {
    i32::try_from(value).map_err(SyncJobStoreError::persistence)
}

fn to_new_row(job: &SyncJob) -> SyncJobStoreResult<NewSyncJobRow> {
    Ok(NewSyncJobRow {
        id: job.id().into_inner(),
        org_id: job.org_id().into_inner(),
        project_id: job.project_id().map(ProjectId::into_inner),
        job_type: job.job_type().as_str().to_owned(),
        status: job.status().as_str().to_owned(),
        payload: job.payload().clone(),
        source_event_id: job.source_event_id().map(|key| key.as_str().to_owned()),
        attempts: to_attempt_column(job.attempts())?,
        max_attempts: to_attempt_column(job.max_attempts())?,
        available_at: job.available_at(),
        created_at: job.created_at(),
        updated_at: job.updated_at(),
    })
}

fn to_transition_row(job: &SyncJob) -> SyncJobStoreResult<SyncJobTransitionRow> {
    Ok(SyncJobTransitionRow {
        status: job.status().as_str().to_owned(),
        attempts: to_attempt_column(job.attempts())?,
        error_class: job.error_class().map(str::to_owned),
        error_message: job.error_message().map(str::to_owned),
        available_at: job.available_at(),
        updated_at: job.updated_at(),
    })
}

fn row_to_job(row: SyncJobRow) -> SyncJobStoreResult<SyncJob> {
    let SyncJobRow {
        id,
        org_id,
        project_id,
        job_type: persisted_type,
        status: persisted_status,
        payload,
        source_event_id,
        attempts,
        max_attempts,
        error_class,
        error_message,
        available_at,
        created_at,
        updated_at,
    } = row;

    let job_type = SyncJobType::try_from(persisted_type.as_str())
        .map_err(SyncJobStoreError::persistence)?;
    let status = SyncJobStatus::try_from(persisted_status.as_str())
        .map_err(SyncJobStoreError::persistence)?;
    let source_event_id = source_event_id
        .map(SourceEventId::new)
        .transpose()
        .map_err(SyncJobStoreError::persistence)?;

    let data = PersistedSyncJobData {
        id: SyncJobId::from_uuid(id),
        org_id: OrgId::from_uuid(org_id),
        project_id: project_id.map(ProjectId::from_uuid),
        job_type,
        status,
        payload,
        source_event_id,
        attempts: u32::try_from(attempts).map_err(SyncJobStoreError::persistence)?,
        max_attempts: u32::try_from(max_attempts).map_err(SyncJobStoreError::persistence)?,
        error_class,
        error_message,
        available_at,
        created_at,
        updated_at,
    };
    Ok(SyncJob::from_persisted(data))
}
