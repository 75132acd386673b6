//! Adapter implementations of the sync job store port.

pub mod memory;
pub mod postgres;
