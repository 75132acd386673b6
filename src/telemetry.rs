//! Tracing subscriber initialisation.

use tracing_subscriber::{
    EnvFilter,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

/// Builds the filter: `RUST_LOG` when set and valid, otherwise
/// `fallback_level`, otherwise `info`.
#[must_use]
pub fn env_filter(fallback_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs a formatted subscriber as the global default.
///
/// # Errors
///
/// Returns [`TryInitError`] when a global subscriber is already installed.
pub fn init_tracing(fallback_level: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter(fallback_level))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn second_initialisation_is_reported() {
        let _first = init_tracing("debug");
        assert!(init_tracing("debug").is_err());
    }

    #[rstest]
    fn invalid_fallback_still_builds_a_filter() {
        let filter = env_filter("not a [valid filter");
        assert!(!filter.to_string().is_empty());
    }
}
