//! Parsing of operator-supplied duration strings such as `15m` or `1h 30m`.

use std::time::Duration;
use thiserror::Error;

/// Threshold applied when a health request does not name one.
pub const DEFAULT_STUCK_THRESHOLD: Duration = Duration::from_secs(15 * 60);

/// Errors returned by [`parse_stuck_threshold`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DurationParseError {
    /// The input is blank.
    #[error("duration must not be empty")]
    Empty,
    /// The input has a leading minus sign.
    #[error("duration '{0}' must not be negative")]
    Negative(String),
    /// The input is not a `humantime` duration.
    #[error("invalid duration '{input}': {source}")]
    Invalid {
        /// The rejected input.
        input: String,
        /// Parser diagnostic.
        #[source]
        source: humantime::DurationError,
    },
    /// The total is zero.
    #[error("duration must be positive")]
    Zero,
}

/// Parses a stuck-job threshold with [`humantime::parse_duration`] and
/// rejects zero.
///
/// # Errors
///
/// Returns [`DurationParseError`] for blank, negative, zero, or malformed
/// input.
///
/// # Examples
///
/// ```
/// use reposync::health::parse_stuck_threshold;
/// use std::time::Duration;
///
/// assert_eq!(parse_stuck_threshold("1h30m"), Ok(Duration::from_secs(5400)));
/// assert_eq!(parse_stuck_threshold("90s"), Ok(Duration::from_secs(90)));
/// assert!(parse_stuck_threshold("0s").is_err());
/// ```
pub fn parse_stuck_threshold(raw: &str) -> Result<Duration, DurationParseError> {
    let input = raw.trim();
    if input.is_empty() {
        return Err(DurationParseError::Empty);
    }
    if input.starts_with('-') {
        return Err(DurationParseError::Negative(input.to_owned()));
    }
    let parsed = humantime::parse_duration(input).map_err(|source| DurationParseError::Invalid {
        input: input.to_owned(),
        source,
    })?;
    if parsed.is_zero() {
        return Err(DurationParseError::Zero);
    }
    Ok(parsed)
}
