//! Reposync: repository synchronisation core.
//!
//! This crate keeps internal projects in step with the remote repositories
//! bound to them. Verified webhooks and a periodic drift poller both turn
//! observed changes into durable, idempotent sync jobs that workers lease
//! from a shared queue.
//!
//! # Architecture
//!
//! Reposync follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (database, APIs, etc.)
//!
//! # Modules
//!
//! - [`sync_job`]: Durable job queue with leasing, retry, and dead-lettering
//! - [`binding`]: Project to repository bindings and their lookup port
//! - [`coordination`]: Delivery dedup and connect-state TTL stores
//! - [`webhook`]: Signature verification and the ingest pipeline
//! - [`drift`]: Remote head reconciliation
//! - [`health`]: Queue, metrics, and poller health reporting
//! - [`connect`]: App installation handshake
//! - [`server`]: HTTP surface

pub mod binding;
pub mod config;
pub mod connect;
pub mod coordination;
pub mod drift;
pub mod health;
pub mod server;
pub mod sync_job;
pub mod telemetry;
pub mod test_support;
pub mod webhook;
