//! Project to repository bindings consumed by the sync core.
//!
//! Bindings are owned by the settings surface. This module exposes the
//! domain types and the [`ports::BindingDirectory`] lookup contract that the
//! webhook pipeline, drift poller, and connect handshake depend on:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]

pub mod adapters;
pub mod domain;
pub mod ports;
