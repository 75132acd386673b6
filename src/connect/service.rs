//! Connect handshake service.

use crate::binding::{
    domain::{InstallationId, OrgId},
    ports::{BindingDirectory, BindingDirectoryError},
};
use crate::coordination::{ConnectStateError, ConnectStateStore};
use chrono::{DateTime, Utc};
use minijinja::{Environment, context};
use mockable::Clock;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Install URL used when none is configured.
pub const DEFAULT_INSTALL_URL_TEMPLATE: &str =
    "https://github.com/apps/{{ app_slug }}/installations/new?state={{ state }}";

/// Start of a handshake, returned to the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectStart {
    /// Where to send the user to install the app.
    pub install_url: String,
    /// Single-use state token embedded in `install_url`.
    pub state: String,
    /// When the state token stops being accepted.
    pub expires_at: DateTime<Utc>,
}

/// Completed handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectCompletion {
    /// Workspace that started the flow.
    pub org_id: OrgId,
    /// Installation now owned by the workspace.
    pub installation_id: InstallationId,
}

/// Errors returned by [`ConnectService`].
#[derive(Debug, Error)]
pub enum ConnectError {
    /// No app slug is configured, so no install URL can be built.
    #[error("connect flow is not configured")]
    NotConfigured,
    /// The install URL template failed to render.
    #[error("failed to render install URL: {reason}")]
    TemplateRender {
        /// Renderer error message.
        reason: String,
    },
    /// A state token could not be issued.
    #[error(transparent)]
    State(#[from] ConnectStateError),
    /// The callback's state is unknown, expired, or already used.
    #[error("connect state is invalid or expired")]
    InvalidState,
    /// Recording the installation failed.
    #[error(transparent)]
    Bindings(#[from] BindingDirectoryError),
}

/// Issues and redeems connect-state tokens.
pub struct ConnectService<C>
where
    C: Clock + Send + Sync,
{
    states: Arc<ConnectStateStore<C>>,
    bindings: Arc<dyn BindingDirectory>,
    install_url_template: String,
    app_slug: Option<String>,
}

impl<C> ConnectService<C>
where
    C: Clock + Send + Sync,
{
    /// Creates a service using [`DEFAULT_INSTALL_URL_TEMPLATE`] and no app
    /// slug.
    #[must_use]
    pub fn new(states: Arc<ConnectStateStore<C>>, bindings: Arc<dyn BindingDirectory>) -> Self {
        Self {
            states,
            bindings,
            install_url_template: DEFAULT_INSTALL_URL_TEMPLATE.to_owned(),
            app_slug: None,
        }
    }

    /// Sets the app slug substituted into the template as `app_slug`.
    #[must_use]
    pub fn with_app_slug(mut self, app_slug: Option<String>) -> Self {
        self.app_slug = app_slug.filter(|slug| !slug.trim().is_empty());
        self
    }

    /// Replaces the install URL template. The template sees `app_slug` and
    /// `state`.
    #[must_use]
    pub fn with_install_url_template(mut self, template: impl Into<String>) -> Self {
        self.install_url_template = template.into();
        self
    }

    /// Starts a handshake for `org_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::NotConfigured`] without an app slug,
    /// [`ConnectError::State`] when no token can be issued, and
    /// [`ConnectError::TemplateRender`] when the template is invalid.
    pub fn begin(&self, org_id: OrgId) -> Result<ConnectStart, ConnectError> {
        let app_slug = self.app_slug.as_deref().ok_or(ConnectError::NotConfigured)?;
        let grant = self.states.create(org_id)?;

        let rendered = Environment::new().render_str(
            &self.install_url_template,
            context! { app_slug => app_slug, state => &grant.token },
        );
        let install_url = match rendered {
            Ok(url) => url,
            Err(err) => {
                self.states.consume(&grant.token);
                return Err(ConnectError::TemplateRender {
                    reason: err.to_string(),
                });
            }
        };

        info!(org_id = %org_id, expires_at = %grant.expires_at, "connect flow started");
        Ok(ConnectStart {
            install_url,
            state: grant.token,
            expires_at: grant.expires_at,
        })
    }

    /// Redeems `state` and records `installation_id` for its workspace.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::InvalidState`] for unknown, expired, or
    /// reused tokens and [`ConnectError::Bindings`] when the installation
    /// cannot be recorded.
    pub async fn complete(
        &self,
        state: &str,
        installation_id: InstallationId,
    ) -> Result<ConnectCompletion, ConnectError> {
        let Some(org_id) = self.states.consume(state) else {
            warn!(installation_id = %installation_id, "connect callback with invalid state");
            return Err(ConnectError::InvalidState);
        };
        self.bindings.record_installation(org_id, installation_id).await?;
        info!(org_id = %org_id, installation_id = %installation_id, "installation connected");
        Ok(ConnectCompletion {
            org_id,
            installation_id,
        })
    }
}
