//! Replay protection for webhook deliveries.

use super::ExpiringMap;
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;

/// Default replay window.
pub const DEFAULT_REPLAY_WINDOW: Duration = Duration::from_secs(10 * 60);

/// Time-bounded set of recently seen delivery identifiers.
///
/// This is a fast path only. Durable `source_event_id` uniqueness in the job
/// store still guards against duplicates across restarts and instances.
#[derive(Debug)]
pub struct DeliveryDedupStore<C>
where
    C: Clock + Send + Sync,
{
    seen: ExpiringMap<String, DateTime<Utc>, C>,
}

impl<C> DeliveryDedupStore<C>
where
    C: Clock + Send + Sync,
{
    /// Creates a store that remembers deliveries for `window`.
    #[must_use]
    pub fn new(window: Duration, clock: Arc<C>) -> Self {
        Self {
            seen: ExpiringMap::new(window, clock),
        }
    }

    /// Records `delivery_id` and returns `true` the first time it is seen
    /// within the window; returns `false` for a replay.
    pub fn mark_if_new(&self, delivery_id: &str) -> bool {
        self.seen
            .insert_with(delivery_id.to_owned(), |now| now)
            .is_some()
    }

    /// Returns when a remembered delivery was first seen.
    #[must_use]
    pub fn first_seen(&self, delivery_id: &str) -> Option<DateTime<Utc>> {
        self.seen.get(&delivery_id.to_owned())
    }

    /// Forgets a delivery so a redelivery is processed again.
    ///
    /// Used when work for an admitted delivery could not be made durable.
    pub fn forget(&self, delivery_id: &str) {
        self.seen.remove(&delivery_id.to_owned());
    }

    /// Returns the number of deliveries currently remembered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns `true` when no deliveries are remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
