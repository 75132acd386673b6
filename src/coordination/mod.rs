//! Short-lived, process-local coordination stores.
//!
//! Both stores are explicit instances with an injected time-to-live and
//! clock rather than process globals, so handlers receive them through
//! their state and tests drive expiry deterministically.

mod connect_state;
mod dedup;
mod expiring;

pub use connect_state::{
    ConnectStateError, ConnectStateGrant, ConnectStateStore, DEFAULT_CONNECT_STATE_TTL,
};
pub use dedup::{DEFAULT_REPLAY_WINDOW, DeliveryDedupStore};
pub use expiring::ExpiringMap;

#[cfg(test)]
mod tests;
