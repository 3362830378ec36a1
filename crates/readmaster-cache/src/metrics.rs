//! Prometheus metrics for cache monitoring.
//!
//! Recording is a no-op until the host application installs a recorder.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use readmaster_config::ObservabilityConfig;
use std::time::Duration;
use tracing::debug;

/// Metric names for the cache layer.
pub mod names {
    /// Total reads that found a value.
    pub const CACHE_HITS_TOTAL: &str = "readmaster_cache_hits_total";
    /// Total reads that found nothing.
    pub const CACHE_MISSES_TOTAL: &str = "readmaster_cache_misses_total";
    /// Total store failures swallowed by the service.
    pub const CACHE_ERRORS_TOTAL: &str = "readmaster_cache_errors_total";
    /// Total keys removed by invalidation.
    pub const CACHE_INVALIDATED_KEYS_TOTAL: &str = "readmaster_cache_invalidated_keys_total";
    /// Background writes and deletions currently in flight.
    pub const CACHE_BACKGROUND_TASKS: &str = "readmaster_cache_background_tasks";
    /// Store operation duration in seconds.
    pub const CACHE_OPERATION_DURATION: &str = "readmaster_cache_operation_duration_seconds";
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(names::CACHE_HITS_TOTAL, "Total number of cache hits");
    describe_counter!(names::CACHE_MISSES_TOTAL, "Total number of cache misses");
    describe_counter!(
        names::CACHE_ERRORS_TOTAL,
        "Total number of cache store failures"
    );
    describe_counter!(
        names::CACHE_INVALIDATED_KEYS_TOTAL,
        "Total number of keys removed by invalidation"
    );
    describe_gauge!(
        names::CACHE_BACKGROUND_TASKS,
        "Background cache tasks currently in flight"
    );
    describe_histogram!(
        names::CACHE_OPERATION_DURATION,
        "Cache store operation duration in seconds"
    );
}

/// Register metric descriptions when `metrics_enabled` is set.
///
/// Returns whether registration ran.
pub fn init_metrics(config: &ObservabilityConfig) -> bool {
    if !config.metrics_enabled {
        debug!("Cache metrics disabled by configuration");
        return false;
    }
    register_metrics();
    true
}

/// Cache metrics recorder.
#[derive(Clone)]
pub struct CacheMetrics;

impl CacheMetrics {
    /// Record a read hit.
    pub fn hit(op: &'static str) {
        counter!(names::CACHE_HITS_TOTAL, "op" => op).increment(1);
    }

    /// Record a read miss.
    pub fn miss(op: &'static str) {
        counter!(names::CACHE_MISSES_TOTAL, "op" => op).increment(1);
    }

    /// Record a swallowed store failure.
    pub fn error(op: &'static str) {
        counter!(names::CACHE_ERRORS_TOTAL, "op" => op).increment(1);
    }

    /// Record keys removed by invalidation.
    pub fn invalidated(count: u64) {
        counter!(names::CACHE_INVALIDATED_KEYS_TOTAL).increment(count);
    }

    /// Set the number of in-flight background tasks.
    #[allow(clippy::cast_precision_loss)]
    pub fn background_tasks(count: usize) {
        gauge!(names::CACHE_BACKGROUND_TASKS).set(count as f64);
    }

    /// Record how long a store operation took.
    pub fn operation(op: &'static str, duration: Duration) {
        histogram!(names::CACHE_OPERATION_DURATION, "op" => op).record(duration.as_secs_f64());
    }
}
