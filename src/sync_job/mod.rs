//! Durable sync job queue.
//!
//! Webhook ingestion, drift polling, and manual triggers all converge on
//! this queue. Jobs move through `queued -> in_progress -> completed`, with
//! retryable failures re-queued under bounded exponential backoff and
//! everything else dead-lettered. The module follows the same hexagonal
//! split as the rest of the crate:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
