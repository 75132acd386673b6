//! Environment configuration for the service binary.
//!
//! [`AppConfig::from_env`] loads a `.env` file when present and then reads
//! process variables. [`AppConfig::from_env_with`] takes any key lookup so
//! tests never touch the process environment.

use crate::binding::domain::{BindingDomainError, FallbackRoutes};
use crate::connect::DEFAULT_INSTALL_URL_TEMPLATE;
use crate::coordination::{DEFAULT_CONNECT_STATE_TTL, DEFAULT_REPLAY_WINDOW};
use crate::drift::{DEFAULT_BRANCH_TIMEOUT, DEFAULT_POLL_INTERVAL, adapters::github::DEFAULT_GITHUB_API_BASE};
use crate::server::DEFAULT_MAX_BODY_BYTES;
use crate::sync_job::{
    domain::{DEFAULT_MAX_ATTEMPTS, RetryPolicy},
    services::QueueSettings,
};
use crate::webhook::WebhookSecret;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const ENV_DATABASE_URL: &str = "DATABASE_URL";
const ENV_WEBHOOK_SECRET: &str = "GITHUB_WEBHOOK_SECRET";
const ENV_APP_SLUG: &str = "GITHUB_APP_SLUG";
const ENV_INSTALL_URL_TEMPLATE: &str = "GITHUB_INSTALL_URL_TEMPLATE";
const ENV_FALLBACK_REPOSITORIES: &str = "GITHUB_FALLBACK_REPOSITORIES";
const ENV_API_BASE: &str = "GITHUB_API_BASE";
const ENV_API_TOKEN: &str = "GITHUB_API_TOKEN";
const ENV_BIND_ADDR: &str = "BIND_ADDR";
const ENV_MAX_BODY_BYTES: &str = "WEBHOOK_MAX_BODY_BYTES";
const ENV_REPLAY_WINDOW_SECS: &str = "WEBHOOK_REPLAY_WINDOW_SECS";
const ENV_CONNECT_STATE_TTL_SECS: &str = "CONNECT_STATE_TTL_SECS";
const ENV_POLL_INTERVAL_SECS: &str = "DRIFT_POLL_INTERVAL_SECS";
const ENV_BRANCH_TIMEOUT_SECS: &str = "DRIFT_BRANCH_TIMEOUT_SECS";
const ENV_MAX_ATTEMPTS: &str = "SYNC_JOB_MAX_ATTEMPTS";
const ENV_RETRY_BASE_SECS: &str = "SYNC_RETRY_BASE_SECS";
const ENV_RETRY_MAX_SECS: &str = "SYNC_RETRY_MAX_SECS";
const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_REPLAY_WINDOW_SECS: u64 = DEFAULT_REPLAY_WINDOW.as_secs();
const DEFAULT_CONNECT_STATE_TTL_SECS: u64 = DEFAULT_CONNECT_STATE_TTL.as_secs();
const DEFAULT_POLL_INTERVAL_SECS: u64 = DEFAULT_POLL_INTERVAL.as_secs();
const DEFAULT_BRANCH_TIMEOUT_SECS: u64 = DEFAULT_BRANCH_TIMEOUT.as_secs();
const DEFAULT_RETRY_BASE_SECS: u64 = RetryPolicy::DEFAULT_BASE.as_secs();
const DEFAULT_RETRY_MAX_SECS: u64 = RetryPolicy::DEFAULT_CAP.as_secs();
const DEFAULT_LOG_LEVEL: &str = "info";

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is unset or blank.
    #[error("{0} is required but not set")]
    Missing(&'static str),
    /// A variable is set to an unusable value.
    #[error("invalid {key} value '{value}': {reason}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
    /// The fallback repository list is malformed.
    #[error("invalid GITHUB_FALLBACK_REPOSITORIES: {0}")]
    FallbackRoutes(#[source] BindingDomainError),
}

/// Service configuration.
#[derive(Clone)]
pub struct AppConfig {
    /// `PostgreSQL` connection URL.
    pub database_url: String,
    /// Shared webhook secret; `None` makes the webhook endpoint fail closed.
    pub webhook_secret: Option<WebhookSecret>,
    /// App slug for the install URL.
    pub app_slug: Option<String>,
    /// Install URL template.
    pub install_url_template: String,
    /// Static repository to workspace routes.
    pub fallback_routes: FallbackRoutes,
    /// REST root for branch-head lookups.
    pub github_api_base: String,
    /// Bearer token for branch-head lookups.
    pub github_api_token: Option<String>,
    /// HTTP listen address.
    pub bind_addr: SocketAddr,
    /// Webhook body cap in bytes.
    pub max_body_bytes: usize,
    /// Delivery dedup window.
    pub replay_window: Duration,
    /// Connect-state token lifetime.
    pub connect_state_ttl: Duration,
    /// Time between drift poll cycles.
    pub poll_interval: Duration,
    /// Per-branch head lookup timeout.
    pub branch_timeout: Duration,
    /// Attempt budget and backoff applied by the queue.
    pub queue: QueueSettings,
    /// Fallback tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("webhook_secret", &self.webhook_secret)
            .field("app_slug", &self.app_slug)
            .field("install_url_template", &self.install_url_template)
            .field("fallback_routes", &self.fallback_routes.len())
            .field("github_api_base", &self.github_api_base)
            .field("github_api_token", &self.github_api_token.as_ref().map(|_| "<redacted>"))
            .field("bind_addr", &self.bind_addr)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("replay_window", &self.replay_window)
            .field("connect_state_ttl", &self.connect_state_ttl)
            .field("poll_interval", &self.poll_interval)
            .field("branch_timeout", &self.branch_timeout)
            .field("queue", &self.queue)
            .field("log_level", &self.log_level)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Loads configuration from the process environment after a
    /// best-effort `.env` load.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required variable is missing or a
    /// value does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is the normal case in deployment.
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            tracing::warn!(error = %err, "failed to load .env file");
        }
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `get_env`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required variable is missing or a
    /// value does not parse.
    pub fn from_env_with<F>(get_env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| {
            get_env(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let database_url = lookup(ENV_DATABASE_URL).ok_or(ConfigError::Missing(ENV_DATABASE_URL))?;
        let fallback_routes = lookup(ENV_FALLBACK_REPOSITORIES)
            .map(|raw| FallbackRoutes::parse(&raw))
            .transpose()
            .map_err(ConfigError::FallbackRoutes)?
            .unwrap_or_default();

        let max_attempts = parse_positive(&lookup, ENV_MAX_ATTEMPTS, DEFAULT_MAX_ATTEMPTS)?;
        let retry_base = parse_positive(&lookup, ENV_RETRY_BASE_SECS, DEFAULT_RETRY_BASE_SECS)?;
        let retry_max = parse_positive(&lookup, ENV_RETRY_MAX_SECS, DEFAULT_RETRY_MAX_SECS)?;

        Ok(Self {
            database_url,
            webhook_secret: get_env(ENV_WEBHOOK_SECRET).and_then(WebhookSecret::new),
            app_slug: lookup(ENV_APP_SLUG),
            install_url_template: lookup(ENV_INSTALL_URL_TEMPLATE)
                .unwrap_or_else(|| DEFAULT_INSTALL_URL_TEMPLATE.to_owned()),
            fallback_routes,
            github_api_base: lookup(ENV_API_BASE).unwrap_or_else(|| DEFAULT_GITHUB_API_BASE.to_owned()),
            github_api_token: lookup(ENV_API_TOKEN),
            bind_addr: parse_value(&lookup, ENV_BIND_ADDR, DEFAULT_BIND_ADDR)?,
            max_body_bytes: parse_positive(&lookup, ENV_MAX_BODY_BYTES, DEFAULT_MAX_BODY_BYTES)?,
            replay_window: parse_secs(&lookup, ENV_REPLAY_WINDOW_SECS, DEFAULT_REPLAY_WINDOW_SECS)?,
            connect_state_ttl: parse_secs(
                &lookup,
                ENV_CONNECT_STATE_TTL_SECS,
                DEFAULT_CONNECT_STATE_TTL_SECS,
            )?,
            poll_interval: parse_secs(&lookup, ENV_POLL_INTERVAL_SECS, DEFAULT_POLL_INTERVAL_SECS)?,
            branch_timeout: parse_secs(&lookup, ENV_BRANCH_TIMEOUT_SECS, DEFAULT_BRANCH_TIMEOUT_SECS)?,
            queue: QueueSettings {
                default_max_attempts: max_attempts,
                retry_policy: RetryPolicy::new(
                    Duration::from_secs(retry_base),
                    Duration::from_secs(retry_max),
                ),
            },
            log_level: lookup(ENV_LOG_LEVEL).unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_owned()),
        })
    }
}

fn parse_value<T, L>(lookup: &L, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    L: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_owned());
    raw.parse().map_err(|err: T::Err| ConfigError::Invalid {
        key,
        reason: err.to_string(),
        value: raw.clone(),
    })
}

fn parse_positive<T, L>(lookup: &L, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
    T::Err: fmt::Display,
    L: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let parsed: T = raw.parse().map_err(|err: T::Err| ConfigError::Invalid {
        key,
        value: raw.clone(),
        reason: err.to_string(),
    })?;
    if parsed == T::default() {
        return Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: "must be greater than zero".to_owned(),
        });
    }
    Ok(parsed)
}

fn parse_secs<L>(lookup: &L, key: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    L: Fn(&str) -> Option<String>,
{
    parse_positive(lookup, key, default).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        AppConfig::from_env_with(|key| vars.get(key).cloned())
    }

    #[rstest]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = config_from(&[(ENV_DATABASE_URL, "postgres://localhost/reposync")])
            .expect("config");

        assert_eq!(config.database_url, "postgres://localhost/reposync");
        assert!(config.webhook_secret.is_none());
        assert!(config.app_slug.is_none());
        assert_eq!(config.install_url_template, DEFAULT_INSTALL_URL_TEMPLATE);
        assert!(config.fallback_routes.is_empty());
        assert_eq!(config.github_api_base, DEFAULT_GITHUB_API_BASE);
        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().expect("addr"));
        assert_eq!(config.max_body_bytes, 1_048_576);
        assert_eq!(config.replay_window, Duration::from_secs(600));
        assert_eq!(config.connect_state_ttl, Duration::from_secs(600));
        assert_eq!(config.poll_interval, Duration::from_secs(300));
        assert_eq!(config.branch_timeout, Duration::from_secs(15));
        assert_eq!(config.queue, QueueSettings::default());
        assert_eq!(config.log_level, "info");
    }

    #[rstest]
    fn explicit_values_override_defaults() {
        let config = config_from(&[
            (ENV_DATABASE_URL, "postgres://db/reposync"),
            (ENV_WEBHOOK_SECRET, "s3cret"),
            (ENV_APP_SLUG, "reposync"),
            (ENV_FALLBACK_REPOSITORIES, "acme/widgets=6f1c1b8e-2f4b-4a57-9d2e-3c1a5f0f8a11"),
            (ENV_API_TOKEN, "ghp_token"),
            (ENV_BIND_ADDR, "127.0.0.1:9000"),
            (ENV_MAX_ATTEMPTS, "3"),
            (ENV_RETRY_BASE_SECS, "10"),
            (ENV_RETRY_MAX_SECS, "60"),
            (ENV_POLL_INTERVAL_SECS, "30"),
            (ENV_LOG_LEVEL, "debug"),
        ])
        .expect("config");

        assert!(config.webhook_secret.is_some());
        assert_eq!(config.app_slug.as_deref(), Some("reposync"));
        assert_eq!(config.fallback_routes.len(), 1);
        assert_eq!(config.github_api_token.as_deref(), Some("ghp_token"));
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.queue.default_max_attempts, 3);
        assert_eq!(
            config.queue.retry_policy,
            RetryPolicy::new(Duration::from_secs(10), Duration::from_secs(60))
        );
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.log_level, "debug");
    }

    #[rstest]
    fn database_url_is_required() {
        let result = config_from(&[(ENV_DATABASE_URL, "   ")]);
        assert!(matches!(result, Err(ConfigError::Missing(ENV_DATABASE_URL))));
    }

    #[rstest]
    #[case(ENV_MAX_ATTEMPTS, "0")]
    #[case(ENV_MAX_ATTEMPTS, "many")]
    #[case(ENV_MAX_BODY_BYTES, "-1")]
    #[case(ENV_POLL_INTERVAL_SECS, "0")]
    #[case(ENV_BIND_ADDR, "localhost")]
    fn invalid_values_are_rejected(#[case] key: &'static str, #[case] value: &str) {
        let result = config_from(&[(ENV_DATABASE_URL, "postgres://db/reposync"), (key, value)]);
        assert!(
            matches!(result, Err(ConfigError::Invalid { key: rejected, .. }) if rejected == key),
            "expected {key}={value} to be rejected"
        );
    }

    #[rstest]
    fn malformed_fallback_routes_are_rejected() {
        let result = config_from(&[
            (ENV_DATABASE_URL, "postgres://db/reposync"),
            (ENV_FALLBACK_REPOSITORIES, "acme/widgets"),
        ]);
        assert!(matches!(result, Err(ConfigError::FallbackRoutes(_))));
    }

    #[rstest]
    fn debug_output_redacts_credentials() {
        let config = config_from(&[
            (ENV_DATABASE_URL, "postgres://user:pw@db/reposync"),
            (ENV_WEBHOOK_SECRET, "s3cret"),
            (ENV_API_TOKEN, "ghp_token"),
        ])
        .expect("config");

        let rendered = format!("{config:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(!rendered.contains("ghp_token"));
        assert!(!rendered.contains("pw@"));
    }
}
