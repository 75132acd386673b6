//! Install handshake linking a remote app installation to a workspace.
//!
//! `begin` issues a single-use state token and the install URL carrying
//! it; `complete` redeems the token from the callback and records the
//! installation for the workspace that started the flow. The workspace is
//! never taken from the callback itself.

mod service;

pub use service::{
    ConnectCompletion, ConnectError, ConnectService, ConnectStart, DEFAULT_INSTALL_URL_TEMPLATE,
};

#[cfg(test)]
mod tests;
