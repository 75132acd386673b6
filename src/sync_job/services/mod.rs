//! Application services over the sync job queue.

mod queue;
mod trigger;

pub use queue::{
    EnqueueRequest, QueueSettings, RATE_LIMITED_ERROR_CLASS, SyncJobQueue, SyncJobQueueError,
    SyncJobQueueResult,
};
pub use trigger::{SyncTriggerError, SyncTriggerService};
