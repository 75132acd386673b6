//! Queue and manual-trigger service orchestration tests.

use std::sync::Arc;
use std::time::Duration;

use crate::binding::{
    adapters::memory::InMemoryBindingDirectory,
    domain::{BranchName, OrgId, ProjectId, RepoBinding, RepositoryFullName, TrackedBranch},
};
use crate::health::{MetricsSource, SyncMetrics};
use crate::sync_job::{
    adapters::memory::InMemorySyncJobStore,
    domain::{RepoSyncPayload, RetryPolicy, SyncJobDomainError, SyncJobStatus, SyncJobType, SyncReason},
    services::{
        EnqueueRequest, QueueSettings, RATE_LIMITED_ERROR_CLASS, SyncJobQueue, SyncJobQueueError,
        SyncTriggerError, SyncTriggerService,
    },
};
use crate::test_support::SimulatedClock;
use rstest::{fixture, rstest};
use serde_json::json;

type TestQueue = SyncJobQueue<InMemorySyncJobStore, SimulatedClock>;

struct Harness {
    queue: Arc<TestQueue>,
    metrics: Arc<SyncMetrics>,
    bindings: Arc<InMemoryBindingDirectory>,
}

#[fixture]
fn harness() -> Harness {
    let metrics = Arc::new(SyncMetrics::new());
    let settings = QueueSettings {
        default_max_attempts: 2,
        retry_policy: RetryPolicy::immediate(),
    };
    let queue = SyncJobQueue::new(
        Arc::new(InMemorySyncJobStore::new()),
        Arc::new(SimulatedClock::deterministic()),
    )
    .with_settings(settings)
    .with_metrics(Arc::clone(&metrics));
    Harness {
        queue: Arc::new(queue),
        metrics,
        bindings: Arc::new(InMemoryBindingDirectory::new()),
    }
}

fn binding(enabled: bool) -> RepoBinding {
    RepoBinding::new(
        OrgId::new(),
        ProjectId::new(),
        RepositoryFullName::new("acme/widgets").expect("valid repo"),
        BranchName::new("main").expect("valid branch"),
    )
    .with_active_branch(TrackedBranch::new(BranchName::new("release").expect("valid branch")))
    .with_enabled(enabled)
}

#[rstest]
fn unknown_job_tag_is_rejected_at_enqueue() {
    let result = EnqueueRequest::from_tag(OrgId::new(), "deploy", json!({}));
    assert_eq!(
        result.err(),
        Some(SyncJobDomainError::UnknownJobType("deploy".to_owned()))
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn enqueue_applies_default_attempt_budget(harness: Harness) {
    let request = EnqueueRequest::new(OrgId::new(), SyncJobType::Webhook, json!({}));
    let outcome = harness.queue.enqueue(request).await.expect("enqueue");
    assert_eq!(outcome.job.max_attempts(), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn zero_attempt_override_is_rejected(harness: Harness) {
    let request =
        EnqueueRequest::new(OrgId::new(), SyncJobType::Webhook, json!({})).with_max_attempts(0);
    let result = harness.queue.enqueue(request).await;
    assert!(matches!(
        result,
        Err(SyncJobQueueError::Domain(SyncJobDomainError::InvalidMaxAttempts(0)))
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn lifecycle_updates_metrics(harness: Harness) {
    let request = EnqueueRequest::new(OrgId::new(), SyncJobType::RepoSync, json!({}));
    harness.queue.enqueue(request).await.expect("enqueue");

    let leased = harness
        .queue
        .pickup_next(SyncJobType::RepoSync)
        .await
        .expect("pickup")
        .expect("leased");
    let failed = harness
        .queue
        .record_failure(leased.id(), RATE_LIMITED_ERROR_CLASS, "secondary limit", true)
        .await
        .expect("record failure");
    assert_eq!(failed.status(), SyncJobStatus::Queued);

    let again = harness
        .queue
        .pickup_next(SyncJobType::RepoSync)
        .await
        .expect("pickup")
        .expect("re-leased immediately");
    harness.queue.mark_completed(again.id()).await.expect("complete");

    let snapshot = harness.metrics.snapshot();
    let counters = snapshot.job_types.get("repo_sync").expect("repo_sync counters");
    assert_eq!((counters.picked, counters.completed, counters.throttled), (2, 1, 1));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn exhausting_attempts_dead_letters(harness: Harness) {
    let request = EnqueueRequest::new(OrgId::new(), SyncJobType::IssueImport, json!({}));
    harness.queue.enqueue(request).await.expect("enqueue");

    let mut last = None;
    for _ in 0..2 {
        let leased = harness
            .queue
            .pickup_next(SyncJobType::IssueImport)
            .await
            .expect("pickup")
            .expect("leased");
        last = Some(
            harness
                .queue
                .record_failure(leased.id(), "network", "timeout", true)
                .await
                .expect("record failure"),
        );
    }

    let job = last.expect("job failed twice");
    assert_eq!(job.status(), SyncJobStatus::DeadLetter);
    assert_eq!(job.attempts(), 2);
    assert!(
        harness
            .queue
            .pickup_next(SyncJobType::IssueImport)
            .await
            .expect("pickup")
            .is_none()
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn manual_trigger_enqueues_every_tracked_branch(harness: Harness) {
    let bound = binding(true);
    let project_id = bound.project_id();
    harness.bindings.upsert_binding(bound).expect("upsert");
    let service = SyncTriggerService::new(Arc::clone(&harness.queue), harness.bindings.clone());

    let first = service.trigger_manual(project_id).await.expect("trigger");
    let second = service.trigger_manual(project_id).await.expect("trigger again");

    let branches: Vec<_> = first
        .iter()
        .map(|job| {
            let payload = RepoSyncPayload::from_value(job.payload().clone()).expect("payload");
            assert_eq!(payload.reason, SyncReason::Manual);
            assert!(job.source_event_id().is_none());
            payload.branch.as_str().to_owned()
        })
        .collect();
    assert_eq!(branches, ["main", "release"]);
    assert_eq!(second.len(), 2, "manual triggers are never deduplicated");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn manual_trigger_rejects_unknown_and_disabled_projects(harness: Harness) {
    let disabled = binding(false);
    let disabled_id = disabled.project_id();
    harness.bindings.upsert_binding(disabled).expect("upsert");
    let service = SyncTriggerService::new(Arc::clone(&harness.queue), harness.bindings.clone());

    let unknown = ProjectId::new();
    assert!(matches!(
        service.trigger_manual(unknown).await,
        Err(SyncTriggerError::ProjectNotFound(id)) if id == unknown
    ));
    assert!(matches!(
        service.trigger_manual(disabled_id).await,
        Err(SyncTriggerError::SyncDisabled(id)) if id == disabled_id
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn latest_for_project_reports_last_attempt(harness: Harness) {
    let project = ProjectId::new();
    let request = EnqueueRequest::new(OrgId::new(), SyncJobType::RepoSync, json!({}))
        .with_project(Some(project));
    let created = harness.queue.enqueue(request).await.expect("enqueue").job;
    harness.queue.clock().advance(Duration::from_secs(1));

    let latest = harness
        .queue
        .latest_for_project(project, SyncJobType::RepoSync)
        .await
        .expect("lookup")
        .expect("present");
    assert_eq!(latest.id(), created.id());
}
