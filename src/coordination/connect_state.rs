//! Single-use tokens binding an install callback to its workspace.

use super::ExpiringMap;
use crate::binding::domain::OrgId;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use mockable::Clock;
use rand::RngCore;
use rand::rngs::OsRng;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default lifetime of an issued token.
pub const DEFAULT_CONNECT_STATE_TTL: Duration = Duration::from_secs(10 * 60);

/// Random bytes per token before encoding.
const TOKEN_BYTES: usize = 32;

/// Freshly issued connect-state token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectStateGrant {
    /// URL-safe token to round-trip through the remote service.
    pub token: String,
    /// Instant from which the token is no longer accepted.
    pub expires_at: DateTime<Utc>,
}

/// Errors raised while issuing tokens.
#[derive(Debug, Error)]
pub enum ConnectStateError {
    /// The operating system entropy source failed.
    #[error("failed to gather entropy for connect state: {0}")]
    Entropy(#[from] rand::Error),
    /// A freshly generated token collided with a live one.
    #[error("generated connect state collided with a live token")]
    Collision,
}

/// Time-bounded map from opaque token to the initiating workspace.
#[derive(Debug)]
pub struct ConnectStateStore<C>
where
    C: Clock + Send + Sync,
{
    states: ExpiringMap<String, OrgId, C>,
}

impl<C> ConnectStateStore<C>
where
    C: Clock + Send + Sync,
{
    /// Creates a store whose tokens live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration, clock: Arc<C>) -> Self {
        Self {
            states: ExpiringMap::new(ttl, clock),
        }
    }

    /// Issues a token for `org_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectStateError`] when entropy is unavailable.
    pub fn create(&self, org_id: OrgId) -> Result<ConnectStateGrant, ConnectStateError> {
        let mut bytes = [0_u8; TOKEN_BYTES];
        OsRng.try_fill_bytes(&mut bytes)?;
        let token = URL_SAFE_NO_PAD.encode(bytes);
        let expires_at = self
            .states
            .insert_if_absent(token.clone(), org_id)
            .ok_or(ConnectStateError::Collision)?;
        Ok(ConnectStateGrant { token, expires_at })
    }

    /// Consumes a token, returning its workspace when it was live.
    ///
    /// The entry is removed whether or not it is still valid, so a token
    /// can be redeemed at most once.
    pub fn consume(&self, token: &str) -> Option<OrgId> {
        self.states.take(&token.to_owned())
    }

    /// Returns the number of outstanding tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns `true` when no tokens are outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
