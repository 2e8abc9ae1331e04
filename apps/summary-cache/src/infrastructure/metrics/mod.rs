//! Prometheus Metrics Module
//!
//! Exposes cache and feed instrumentation in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Lookups**: Read-through outcomes and upstream fetch latency
//! - **Feed**: Applied, dropped and malformed push updates
//! - **Subscriptions**: Active listeners and subscribe failures
//! - **Cache**: Number of cached symbols
//!
//! # Integration
//!
//! Metrics are rendered at `/metrics` on the API port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics setup error.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The global recorder could not be installed.
    #[error("failed to install Prometheus recorder: {0}")]
    Install(#[from] BuildError),
}

/// Install the Prometheus recorder. Later calls return the same handle.
///
/// # Errors
///
/// Returns [`MetricsError::Install`] if another global recorder is already
/// installed.
pub fn init_metrics() -> Result<PrometheusHandle, MetricsError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();

    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "summary_cache_lookups_total",
        "Summary lookups by outcome (hit, miss_cached, miss_uncached, error)"
    );
    describe_histogram!(
        "summary_cache_upstream_fetch_seconds",
        "Latency of quote fetches on the miss path"
    );

    describe_counter!(
        "summary_cache_feed_updates_total",
        "Push updates merged into the cache"
    );
    describe_counter!(
        "summary_cache_feed_updates_dropped_total",
        "Push updates dropped because a listener channel was full"
    );
    describe_counter!(
        "summary_cache_field_conversion_failures_total",
        "Push update fields that failed numeric conversion"
    );
    describe_counter!(
        "summary_cache_decode_errors_total",
        "Feed frames that could not be decoded"
    );

    describe_counter!(
        "summary_cache_subscription_failures_total",
        "Per-symbol subscribe failures"
    );
    describe_gauge!(
        "summary_cache_active_subscriptions",
        "Symbols with an active feed listener"
    );
    describe_counter!(
        "summary_cache_feed_connect_attempts_total",
        "WebSocket connection attempts"
    );

    describe_gauge!("summary_cache_entries", "Symbols held in the cache");
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Outcome label for a summary lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    /// Served from the cache.
    Hit,
    /// Fetched and written to the cache.
    MissCached,
    /// Fetched but not cached (unsupported symbol).
    MissUncached,
    /// Upstream fetch failed.
    Error,
}

impl LookupOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::MissCached => "miss_cached",
            Self::MissUncached => "miss_uncached",
            Self::Error => "error",
        }
    }
}

/// Record a lookup outcome.
pub fn record_lookup(outcome: LookupOutcome) {
    counter!(
        "summary_cache_lookups_total",
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record how long an upstream fetch took.
pub fn record_fetch_duration(success: bool, duration: Duration) {
    histogram!(
        "summary_cache_upstream_fetch_seconds",
        "result" => if success { "ok" } else { "error" }
    )
    .record(duration.as_secs_f64());
}

/// Record a push update merged into the cache.
pub fn record_feed_update() {
    counter!("summary_cache_feed_updates_total").increment(1);
}

/// Record a push update dropped at a full channel.
pub fn record_feed_update_dropped() {
    counter!("summary_cache_feed_updates_dropped_total").increment(1);
}

/// Record a field that fell back to zero during conversion.
pub fn record_field_conversion_failure(field: &'static str) {
    counter!(
        "summary_cache_field_conversion_failures_total",
        "field" => field
    )
    .increment(1);
}

/// Record an undecodable feed frame.
pub fn record_decode_error() {
    counter!("summary_cache_decode_errors_total").increment(1);
}

/// Record a failed per-symbol subscribe.
pub fn record_subscription_failure() {
    counter!("summary_cache_subscription_failures_total").increment(1);
}

/// Update the active subscription gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_active_subscriptions(count: usize) {
    gauge!("summary_cache_active_subscriptions").set(count as f64);
}

/// Record a WebSocket connection attempt.
pub fn record_connect_attempt() {
    counter!("summary_cache_feed_connect_attempts_total").increment(1);
}

/// Update the cache size gauge. Sampled when metrics are rendered.
#[allow(clippy::cast_precision_loss)]
pub fn set_cache_entries(count: usize) {
    gauge!("summary_cache_entries").set(count as f64);
}

// =============================================================================
// Tests
// =============================================================================
