//! Bounded exponential backoff for retryable job failures.

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

/// Backoff policy applied when a retryable failure re-queues a job.
///
/// The delay before a job becomes eligible again is
/// `min(base * 2^attempts, cap)` where `attempts` counts failures so far.
/// Re-queued jobs go to the back of the queue: leasing orders by
/// eligibility time, so a retried job never jumps ahead of work that was
/// already waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    base: Duration,
    cap: Duration,
}

impl RetryPolicy {
    /// Default base delay.
    pub const DEFAULT_BASE: Duration = Duration::from_secs(30);
    /// Default maximum delay.
    pub const DEFAULT_CAP: Duration = Duration::from_secs(60 * 60);

    /// Creates a policy. A cap below the base is raised to the base.
    #[must_use]
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap: cap.max(base),
        }
    }

    /// Policy that re-queues immediately, used where backoff is driven
    /// elsewhere.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            base: Duration::ZERO,
            cap: Duration::ZERO,
        }
    }

    /// Returns the base delay.
    #[must_use]
    pub const fn base(&self) -> Duration {
        self.base
    }

    /// Returns the maximum delay.
    #[must_use]
    pub const fn cap(&self) -> Duration {
        self.cap
    }

    /// Returns the delay after the given number of failed attempts.
    #[must_use]
    pub fn delay_for(&self, attempts: u32) -> Duration {
        2_u32
            .checked_pow(attempts)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.cap, |delay| delay.min(self.cap))
    }

    /// Returns when a job that failed at `failed_at` becomes eligible again.
    #[must_use]
    pub fn next_attempt_at(&self, failed_at: DateTime<Utc>, attempts: u32) -> DateTime<Utc> {
        let delay = TimeDelta::from_std(self.delay_for(attempts)).unwrap_or(TimeDelta::MAX);
        failed_at
            .checked_add_signed(delay)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE, Self::DEFAULT_CAP)
    }
}
