//! `reposync` service binary.
//!
//! Wires the `PostgreSQL` stores, the in-process coordination stores, and
//! the services into the HTTP router, then runs the drift poller alongside
//! the server until Ctrl-C.
//!
//! Configuration comes from the environment (see [`AppConfig`]); the
//! database schema is expected to be migrated from `migrations/` before the
//! service starts.

use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use mockable::DefaultClock;
use reposync::binding::{adapters::postgres::PostgresBindingDirectory, ports::BindingDirectory};
use reposync::config::AppConfig;
use reposync::connect::ConnectService;
use reposync::coordination::{ConnectStateStore, DeliveryDedupStore};
use reposync::drift::{DriftPoller, PollerSnapshotCell, adapters::github::GitHubBranchHeads};
use reposync::health::{SyncHealthReporter, SyncMetrics, register_metrics};
use reposync::server::{AppServices, AppState, build_router};
use reposync::sync_job::{
    adapters::postgres::PostgresSyncJobStore,
    services::{SyncJobQueue, SyncTriggerService},
};
use reposync::telemetry;
use reposync::webhook::WebhookIngestService;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::from_env()?;
    telemetry::init_tracing(&config.log_level)?;
    register_metrics();
    info!(bind_addr = %config.bind_addr, "starting reposync");
    if config.webhook_secret.is_none() {
        warn!("GITHUB_WEBHOOK_SECRET is not set; webhook deliveries will be rejected");
    }

    let pool = Pool::builder().build(ConnectionManager::<PgConnection>::new(&config.database_url))?;
    let store = Arc::new(PostgresSyncJobStore::new(pool.clone()));
    let directory: Arc<dyn BindingDirectory> = Arc::new(PostgresBindingDirectory::new(pool));
    let clock = Arc::new(DefaultClock);
    let metrics = Arc::new(SyncMetrics::new());

    let queue = Arc::new(
        SyncJobQueue::new(Arc::clone(&store), Arc::clone(&clock))
            .with_settings(config.queue)
            .with_metrics(Arc::clone(&metrics)),
    );
    let dedup = Arc::new(DeliveryDedupStore::new(config.replay_window, Arc::clone(&clock)));
    let states = Arc::new(ConnectStateStore::new(config.connect_state_ttl, Arc::clone(&clock)));
    let poller_snapshot = PollerSnapshotCell::new();

    let heads = GitHubBranchHeads::new(config.github_api_base.clone())
        .with_token(config.github_api_token.clone())
        .with_metrics(Arc::clone(&metrics));
    let poller = DriftPoller::new(Arc::clone(&queue), Arc::clone(&directory), Arc::new(heads))
        .with_branch_timeout(config.branch_timeout)
        .with_snapshot(poller_snapshot.clone());

    let services = AppServices {
        ingest: WebhookIngestService::new(Arc::clone(&queue), dedup, Arc::clone(&directory))
            .with_secret(config.webhook_secret.clone())
            .with_fallback_routes(config.fallback_routes.clone()),
        trigger: SyncTriggerService::new(queue, Arc::clone(&directory)),
        health: SyncHealthReporter::new(store, clock, metrics, poller_snapshot),
        connect: ConnectService::new(states, directory)
            .with_app_slug(config.app_slug.clone())
            .with_install_url_template(config.install_url_template.clone()),
    };
    let router = build_router(AppState::new(services, config.max_body_bytes));

    let cancel = CancellationToken::new();
    let poll_interval = config.poll_interval;
    let poller_token = cancel.clone();
    let poller_task = tokio::spawn(async move { poller.run_every(poll_interval, &poller_token).await });

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(bind_addr = %config.bind_addr, "listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    cancel.cancel();
    poller_task.await?;
    info!("reposync stopped");
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                warn!(error = %err, "failed to listen for shutdown signal");
            }
        }
        () = cancel.cancelled() => {}
    }
    info!("shutdown requested");
    cancel.cancel();
}
