//! Connect handshake tests.

use super::{ConnectError, ConnectService};
use crate::binding::{
    adapters::memory::InMemoryBindingDirectory,
    domain::{InstallationId, OrgId},
    ports::BindingDirectory,
};
use crate::coordination::{ConnectStateStore, DEFAULT_CONNECT_STATE_TTL};
use crate::test_support::SimulatedClock;
use rstest::{fixture, rstest};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    service: ConnectService<SimulatedClock>,
    directory: Arc<InMemoryBindingDirectory>,
    states: Arc<ConnectStateStore<SimulatedClock>>,
    clock: Arc<SimulatedClock>,
}

#[fixture]
fn harness() -> Harness {
    let clock = Arc::new(SimulatedClock::deterministic());
    let states = Arc::new(ConnectStateStore::new(
        DEFAULT_CONNECT_STATE_TTL,
        Arc::clone(&clock),
    ));
    let directory = Arc::new(InMemoryBindingDirectory::new());
    let service = ConnectService::new(Arc::clone(&states), directory.clone())
        .with_app_slug(Some("reposync-app".to_owned()));
    Harness {
        service,
        directory,
        states,
        clock,
    }
}

fn installation() -> InstallationId {
    InstallationId::new(4242).expect("valid installation")
}

#[rstest]
fn begin_renders_install_url_with_state(harness: Harness) {
    let org = OrgId::new();
    let start = harness.service.begin(org).expect("begin");

    assert_eq!(
        start.install_url,
        format!(
            "https://github.com/apps/reposync-app/installations/new?state={}",
            start.state
        )
    );
    assert_eq!(
        start.expires_at,
        harness.clock.now() + chrono::Duration::seconds(600)
    );
    assert_eq!(harness.states.len(), 1);
}

#[rstest]
fn custom_template_is_used(harness: Harness) {
    let service = harness
        .service
        .with_install_url_template("https://ghe.example.com/{{ app_slug }}?s={{ state }}");
    let start = service.begin(OrgId::new()).expect("begin");
    assert!(start.install_url.starts_with("https://ghe.example.com/reposync-app?s="));
}

#[rstest]
fn missing_app_slug_is_not_configured(harness: Harness) {
    let service = harness.service.with_app_slug(Some("  ".to_owned()));
    assert!(matches!(
        service.begin(OrgId::new()),
        Err(ConnectError::NotConfigured)
    ));
    assert!(harness.states.is_empty());
}

#[rstest]
fn broken_template_releases_the_issued_state(harness: Harness) {
    let service = harness.service.with_install_url_template("{{ state ");
    assert!(matches!(
        service.begin(OrgId::new()),
        Err(ConnectError::TemplateRender { .. })
    ));
    assert!(harness.states.is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn complete_records_installation_for_initiating_org(harness: Harness) {
    let org = OrgId::new();
    let start = harness.service.begin(org).expect("begin");

    let completion = harness
        .service
        .complete(&start.state, installation())
        .await
        .expect("complete");

    assert_eq!(completion.org_id, org);
    assert_eq!(
        harness
            .directory
            .workspace_for_installation(installation())
            .await
            .expect("lookup"),
        Some(org)
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn state_is_single_use(harness: Harness) {
    let start = harness.service.begin(OrgId::new()).expect("begin");
    harness
        .service
        .complete(&start.state, installation())
        .await
        .expect("first completion");

    let replay = harness.service.complete(&start.state, installation()).await;
    assert!(matches!(replay, Err(ConnectError::InvalidState)));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn expired_state_is_rejected(harness: Harness) {
    let start = harness.service.begin(OrgId::new()).expect("begin");
    harness.clock.advance(DEFAULT_CONNECT_STATE_TTL + Duration::from_secs(1));

    let result = harness.service.complete(&start.state, installation()).await;

    assert!(matches!(result, Err(ConnectError::InvalidState)));
    assert!(
        harness
            .directory
            .workspace_for_installation(installation())
            .await
            .expect("lookup")
            .is_none()
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_state_is_rejected(harness: Harness) {
    let result = harness.service.complete("forged", installation()).await;
    assert!(matches!(result, Err(ConnectError::InvalidState)));
}
