//! Drift detection between remote branch heads and last-synced commits.
//!
//! Webhooks can be lost, so the poller independently compares every
//! tracked branch with its remote head and enqueues a `repo_sync` job when
//! they differ. Poller jobs use a key derived from the observed head, so a
//! cycle racing a webhook for the same head is absorbed by the store.

pub mod adapters;
mod poller;
pub mod ports;
mod snapshot;

pub use poller::{DEFAULT_BRANCH_TIMEOUT, DEFAULT_POLL_INTERVAL, DriftPollError, DriftPoller};
pub use snapshot::{PollReport, PollerSnapshot, PollerSnapshotCell};
