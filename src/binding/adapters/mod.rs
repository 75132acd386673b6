//! Adapter implementations for the binding directory port.

pub mod memory;
pub mod postgres;
