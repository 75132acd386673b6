//! Expiry and single-use behaviour of the coordination stores.

use super::{ConnectStateStore, DeliveryDedupStore, ExpiringMap};
use crate::binding::domain::OrgId;
use crate::test_support::SimulatedClock;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rstest::{fixture, rstest};
use std::sync::Arc;
use std::time::Duration;

const TTL: Duration = Duration::from_secs(600);

#[fixture]
fn clock() -> Arc<SimulatedClock> {
    Arc::new(SimulatedClock::deterministic())
}

#[rstest]
#[case(Duration::ZERO, false)]
#[case(Duration::from_secs(599), false)]
#[case(Duration::from_millis(599_999), false)]
#[case(TTL, true)]
#[case(Duration::from_secs(601), true)]
fn dedup_rejects_replays_until_window_lapses(
    clock: Arc<SimulatedClock>,
    #[case] lookup_after: Duration,
    #[case] accepted_again: bool,
) {
    let store = DeliveryDedupStore::new(TTL, Arc::clone(&clock));
    assert!(store.mark_if_new("d1"));

    clock.advance(lookup_after);
    assert_eq!(store.mark_if_new("d1"), accepted_again);
}

#[rstest]
fn dedup_tracks_deliveries_independently(clock: Arc<SimulatedClock>) {
    let store = DeliveryDedupStore::new(TTL, Arc::clone(&clock));
    assert!(store.mark_if_new("d1"));
    assert!(store.mark_if_new("d2"));
    assert!(!store.mark_if_new("d2"));
    assert_eq!(store.len(), 2);
    assert_eq!(store.first_seen("d1"), Some(clock.now()));
}

#[rstest]
fn dedup_forget_allows_redelivery(clock: Arc<SimulatedClock>) {
    let store = DeliveryDedupStore::new(TTL, clock);
    assert!(store.mark_if_new("d1"));
    store.forget("d1");
    assert!(store.mark_if_new("d1"));
}

#[rstest]
fn expired_entries_are_pruned_lazily(clock: Arc<SimulatedClock>) {
    let map: ExpiringMap<&str, u8, _> = ExpiringMap::new(TTL, Arc::clone(&clock));
    map.insert_if_absent("a", 1);
    clock.advance(Duration::from_secs(300));
    map.insert_if_absent("b", 2);
    clock.advance(Duration::from_secs(300));

    assert_eq!(map.len(), 1);
    assert_eq!(map.get(&"b"), Some(2));
    assert_eq!(map.get(&"a"), None);
}

#[rstest]
fn connect_state_tokens_are_url_safe_and_distinct(clock: Arc<SimulatedClock>) {
    let store = ConnectStateStore::new(TTL, Arc::clone(&clock));
    let first = store.create(OrgId::new()).expect("token issued");
    let second = store.create(OrgId::new()).expect("token issued");

    assert_ne!(first.token, second.token);
    let decoded = URL_SAFE_NO_PAD.decode(&first.token).expect("url-safe base64");
    assert_eq!(decoded.len(), 32);
    assert_eq!(first.expires_at, clock.now() + chrono::TimeDelta::seconds(600));
}

#[rstest]
fn connect_state_is_single_use(clock: Arc<SimulatedClock>) {
    let store = ConnectStateStore::new(TTL, clock);
    let org = OrgId::new();
    let grant = store.create(org).expect("token issued");

    assert_eq!(store.consume(&grant.token), Some(org));
    assert_eq!(store.consume(&grant.token), None);
    assert!(store.is_empty());
}

#[rstest]
#[case(Duration::from_secs(599), true)]
#[case(TTL, false)]
#[case(Duration::from_secs(3600), false)]
fn connect_state_expires_at_ttl(
    clock: Arc<SimulatedClock>,
    #[case] lookup_after: Duration,
    #[case] redeemable: bool,
) {
    let store = ConnectStateStore::new(TTL, Arc::clone(&clock));
    let org = OrgId::new();
    let grant = store.create(org).expect("token issued");

    clock.advance(lookup_after);
    assert_eq!(store.consume(&grant.token).is_some(), redeemable);
    assert_eq!(store.consume(&grant.token), None);
}

#[rstest]
fn unknown_connect_state_is_rejected(clock: Arc<SimulatedClock>) {
    let store = ConnectStateStore::new(TTL, clock);
    assert_eq!(store.consume("not-a-token"), None);
}
