//! `PostgreSQL` adapter for the durable sync job queue.

mod models;
mod schema;
mod store;

pub use store::{PostgresSyncJobStore, SyncJobPgPool};
