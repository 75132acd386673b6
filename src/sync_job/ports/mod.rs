//! Port contracts for the sync job queue.

pub mod store;

pub use store::{EnqueueOutcome, QueueDepth, SyncJobStore, SyncJobStoreError, SyncJobStoreResult};
