//! Sync health reporting.
//!
//! The reporter only reads: queue depth and stuck-job counts from the job
//! store, counters from a [`MetricsSource`], and the drift poller's last
//! snapshot.

mod duration;
mod metrics;
mod reporter;

pub use duration::{DEFAULT_STUCK_THRESHOLD, DurationParseError, parse_stuck_threshold};
pub use self::metrics::{
    JOBS_COMPLETED, JOBS_PICKED, JOBS_THROTTLED, JobTypeCounters, MetricsSnapshot, MetricsSource,
    QUOTA_REMAINING, SyncMetrics, register_metrics,
};
pub use reporter::{SyncHealthError, SyncHealthReport, SyncHealthReporter};

#[cfg(test)]
pub use self::metrics::MockMetricsSource;
