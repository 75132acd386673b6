//! Shared world state for webhook sync BDD scenarios.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use reposync::binding::{
    adapters::memory::InMemoryBindingDirectory,
    domain::{InstallationId, RepoBinding},
};
use reposync::connect::ConnectService;
use reposync::coordination::{
    ConnectStateStore, DEFAULT_CONNECT_STATE_TTL, DEFAULT_REPLAY_WINDOW, DeliveryDedupStore,
};
use reposync::drift::{DriftPoller, PollReport, PollerSnapshotCell, adapters::memory::InMemoryBranchHeads};
use reposync::health::{SyncHealthReporter, SyncMetrics};
use reposync::server::{AppServices, AppState, DEFAULT_MAX_BODY_BYTES, build_router};
use reposync::sync_job::{
    adapters::memory::InMemorySyncJobStore,
    domain::SyncJobType,
    services::{SyncJobQueue, SyncTriggerService},
};
use reposync::test_support::SimulatedClock;
use reposync::webhook::WebhookSecret;
use rstest::fixture;
use serde_json::Value;
use tower::ServiceExt;

/// Secret the scenario router verifies deliveries with.
pub const SECRET: &str = "scenario-secret";

/// Installation id carried by every scenario delivery.
pub const INSTALLATION: u64 = 7001;

/// Poller type used by the BDD world.
pub type TestPoller = DriftPoller<InMemorySyncJobStore, SimulatedClock>;

/// Scenario world for webhook sync behaviour tests.
pub struct WebhookSyncWorld {
    pub router: Router,
    pub poller: TestPoller,
    pub queue: Arc<SyncJobQueue<InMemorySyncJobStore, SimulatedClock>>,
    pub store: Arc<InMemorySyncJobStore>,
    pub directory: Arc<InMemoryBindingDirectory>,
    pub heads: Arc<InMemoryBranchHeads>,
    pub clock: Arc<SimulatedClock>,
    pub binding: Option<RepoBinding>,
    pub last_push: Option<(String, String, String)>,
    pub last_response: Option<(StatusCode, Value)>,
    pub last_poll: Option<PollReport>,
}

impl WebhookSyncWorld {
    /// Creates a world with an empty directory and queue.
    #[must_use]
    pub fn new() -> Self {
        let clock = Arc::new(SimulatedClock::deterministic());
        let store = Arc::new(InMemorySyncJobStore::new());
        let directory = Arc::new(InMemoryBindingDirectory::new());
        let heads = Arc::new(InMemoryBranchHeads::new());
        let metrics = Arc::new(SyncMetrics::new());
        let snapshot = PollerSnapshotCell::new();

        let queue = Arc::new(
            SyncJobQueue::new(Arc::clone(&store), Arc::clone(&clock))
                .with_metrics(Arc::clone(&metrics)),
        );
        let dedup = Arc::new(DeliveryDedupStore::new(DEFAULT_REPLAY_WINDOW, Arc::clone(&clock)));
        let states = Arc::new(ConnectStateStore::new(DEFAULT_CONNECT_STATE_TTL, Arc::clone(&clock)));
        let poller = DriftPoller::new(Arc::clone(&queue), directory.clone(), heads.clone())
            .with_snapshot(snapshot.clone());

        let services = AppServices {
            ingest: reposync::webhook::WebhookIngestService::new(
                Arc::clone(&queue),
                dedup,
                directory.clone(),
            )
            .with_secret(WebhookSecret::new(SECRET)),
            trigger: SyncTriggerService::new(Arc::clone(&queue), directory.clone()),
            health: SyncHealthReporter::new(Arc::clone(&store), Arc::clone(&clock), metrics, snapshot),
            connect: ConnectService::new(states, directory.clone()),
        };

        Self {
            router: build_router(AppState::new(services, DEFAULT_MAX_BODY_BYTES)),
            poller,
            queue,
            store,
            directory,
            heads,
            clock,
            binding: None,
            last_push: None,
            last_response: None,
            last_poll: None,
        }
    }

    /// Returns the seeded binding.
    ///
    /// # Errors
    ///
    /// Returns an error when no binding was seeded by a Given step.
    pub fn binding(&self) -> Result<&RepoBinding, eyre::Report> {
        self.binding
            .as_ref()
            .ok_or_else(|| eyre::eyre!("missing binding in scenario world"))
    }

    /// Returns the installation the scenario deliveries carry.
    ///
    /// # Errors
    ///
    /// Returns an error if the constant is rejected as an installation id.
    pub fn installation() -> Result<InstallationId, eyre::Report> {
        InstallationId::new(INSTALLATION).map_err(|err| eyre::eyre!("invalid installation: {err}"))
    }

    /// Counts queued repo sync jobs.
    ///
    /// # Errors
    ///
    /// Returns an error when the store snapshot fails.
    pub fn repo_sync_count(&self) -> Result<usize, eyre::Report> {
        let jobs = self
            .store
            .snapshot()
            .map_err(|err| eyre::eyre!("snapshot store: {err}"))?;
        Ok(jobs
            .iter()
            .filter(|job| job.job_type() == SyncJobType::RepoSync)
            .count())
    }

    /// Sends a request through the router and records the response.
    ///
    /// # Errors
    ///
    /// Returns an error when the router or body collection fails.
    pub fn send(&mut self, request: Request<Body>) -> Result<(), eyre::Report> {
        let router = self.router.clone();
        let (status, body) = run_async(async move {
            let response = router
                .oneshot(request)
                .await
                .map_err(|err| eyre::eyre!("route request: {err}"))?;
            let status = response.status();
            let bytes = response
                .into_body()
                .collect()
                .await
                .map_err(|err| eyre::eyre!("collect body: {err}"))?
                .to_bytes();
            let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            Ok::<_, eyre::Report>((status, body))
        })?;
        self.last_response = Some((status, body));
        Ok(())
    }
}

impl Default for WebhookSyncWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> WebhookSyncWorld {
    WebhookSyncWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
