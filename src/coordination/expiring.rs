//! Mutex-guarded map whose entries lapse after a fixed time-to-live.

use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Process-local map with lazy expiry.
///
/// An entry written at `T` is visible to every lookup strictly before
/// `T + ttl` and gone from `T + ttl` onwards. Expired entries are pruned at
/// the start of every operation while the lock is held; no I/O happens
/// inside the critical section.
#[derive(Debug)]
pub struct ExpiringMap<K, V, C>
where
    C: Clock + Send + Sync,
{
    ttl: TimeDelta,
    clock: Arc<C>,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

impl<K, V, C> ExpiringMap<K, V, C>
where
    K: Eq + Hash,
    C: Clock + Send + Sync,
{
    /// Creates an empty map.
    #[must_use]
    pub fn new(ttl: Duration, clock: Arc<C>) -> Self {
        Self {
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the configured time-to-live.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl.to_std().unwrap_or(Duration::MAX)
    }

    /// Inserts `value` unless a live entry already holds `key`.
    ///
    /// Returns the expiry of the new entry, or `None` when the key was taken.
    pub fn insert_if_absent(&self, key: K, value: V) -> Option<DateTime<Utc>> {
        self.insert_with(key, |_| value)
    }

    /// Like [`Self::insert_if_absent`], building the value from the insert
    /// time.
    pub fn insert_with(&self, key: K, make: impl FnOnce(DateTime<Utc>) -> V) -> Option<DateTime<Utc>> {
        let now = self.clock.utc();
        let mut entries = self.lock_pruned(now);
        if entries.contains_key(&key) {
            return None;
        }
        let expires_at = now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        entries.insert(
            key,
            Entry {
                value: make(now),
                expires_at,
            },
        );
        Some(expires_at)
    }

    /// Returns a copy of the live value held by `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let now = self.clock.utc();
        self.lock_pruned(now).get(key).map(|entry| entry.value.clone())
    }

    /// Removes `key` and returns its value when the entry was still live.
    pub fn take(&self, key: &K) -> Option<V> {
        let now = self.clock.utc();
        self.lock_pruned(now).remove(key).map(|entry| entry.value)
    }

    /// Drops `key` if present.
    pub fn remove(&self, key: &K) {
        self.take(key);
    }

    /// Returns the number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = self.clock.utc();
        self.lock_pruned(now).len()
    }

    /// Returns `true` when no live entries remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_pruned(&self, now: DateTime<Utc>) -> MutexGuard<'_, HashMap<K, Entry<V>>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, entry| entry.expires_at > now);
        entries
    }
}
