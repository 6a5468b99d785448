//! Prometheus Metrics Module
//!
//! Counters and gauges for the market-data pipeline.
//!
//! # Metrics Categories
//!
//! - **Sources**: attempts, failures and rate-limit marks per upstream source
//! - **Feed**: snapshot ticks applied, history cache hits and misses
//! - **Icons**: resolutions by outcome
//! - **Stream**: push stream connection state and reconnects
//! - **Rendering**: frames drawn and frames skipped by the draw guard
//!
//! # Integration
//!
//! There is no HTTP listener. The runner renders the exposition text with
//! the handle and logs it at shutdown.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder, once.
///
/// # Errors
///
/// Returns `BuildError` if another recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
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
        "coin_pulse_source_attempts_total",
        "Requests issued to upstream sources"
    );
    describe_counter!(
        "coin_pulse_source_failures_total",
        "Failed upstream requests by error kind"
    );
    describe_counter!(
        "coin_pulse_source_skipped_total",
        "Requests not issued because the source was rate limited"
    );
    describe_counter!(
        "coin_pulse_rate_limit_marks_total",
        "Times a source was marked rate limited"
    );

    describe_counter!(
        "coin_pulse_snapshots_applied_total",
        "Coin snapshots applied to the feed"
    );
    describe_counter!(
        "coin_pulse_history_cache_total",
        "Historical series lookups by cache result"
    );
    describe_counter!(
        "coin_pulse_history_unavailable_total",
        "Historical requests that no source could serve"
    );

    describe_counter!(
        "coin_pulse_icon_resolutions_total",
        "Icon resolutions by outcome"
    );

    describe_gauge!(
        "coin_pulse_stream_connected",
        "Whether the push stream is connected (1) or not (0)"
    );
    describe_counter!(
        "coin_pulse_stream_reconnects_total",
        "Push stream reconnection attempts"
    );

    describe_counter!("coin_pulse_frames_total", "Chart frames by result");
    describe_histogram!(
        "coin_pulse_frame_render_seconds",
        "Time to paint one chart frame"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Which source operation a metric refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOperation {
    /// Current snapshots.
    Snapshots,
    /// Historical series.
    History,
}

impl SourceOperation {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Snapshots => "snapshots",
            Self::History => "history",
        }
    }
}

/// How an icon resolution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconOutcome {
    /// Served from the memory tier.
    MemoryHit,
    /// Served from the durable tier.
    DurableHit,
    /// Fetched from a source.
    Fetched,
    /// Deny-listed asset.
    Denied,
    /// Known unresolvable.
    Unresolvable,
    /// Overall timeout fired.
    TimedOut,
}

impl IconOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::MemoryHit => "memory_hit",
            Self::DurableHit => "durable_hit",
            Self::Fetched => "fetched",
            Self::Denied => "denied",
            Self::Unresolvable => "unresolvable",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Record a request issued to a source.
pub fn record_source_attempt(source: &str, operation: SourceOperation) {
    counter!(
        "coin_pulse_source_attempts_total",
        "source" => source.to_string(),
        "operation" => operation.as_str()
    )
    .increment(1);
}

/// Record a failed request.
pub fn record_source_failure(source: &str, operation: SourceOperation, kind: &'static str) {
    counter!(
        "coin_pulse_source_failures_total",
        "source" => source.to_string(),
        "operation" => operation.as_str(),
        "kind" => kind
    )
    .increment(1);
}

/// Record a source skipped because it is rate limited.
pub fn record_source_skipped(source: &str, operation: SourceOperation) {
    counter!(
        "coin_pulse_source_skipped_total",
        "source" => source.to_string(),
        "operation" => operation.as_str()
    )
    .increment(1);
}

/// Record a rate-limit mark.
pub fn record_rate_limit_mark(source: &str) {
    counter!(
        "coin_pulse_rate_limit_marks_total",
        "source" => source.to_string()
    )
    .increment(1);
}

/// Record snapshots applied from a source.
pub fn record_snapshots_applied(source: &str, count: u64) {
    counter!(
        "coin_pulse_snapshots_applied_total",
        "source" => source.to_string()
    )
    .increment(count);
}

/// Record a historical cache lookup.
pub fn record_history_cache(hit: bool) {
    counter!(
        "coin_pulse_history_cache_total",
        "result" => if hit { "hit" } else { "miss" }
    )
    .increment(1);
}

/// Record a historical request no source could serve.
pub fn record_history_unavailable() {
    counter!("coin_pulse_history_unavailable_total").increment(1);
}

/// Record an icon resolution.
pub fn record_icon_resolution(outcome: IconOutcome) {
    counter!(
        "coin_pulse_icon_resolutions_total",
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Update the push stream connection gauge.
pub fn set_stream_connected(connected: bool) {
    gauge!("coin_pulse_stream_connected").set(if connected { 1.0 } else { 0.0 });
}

/// Record a push stream reconnection attempt.
pub fn record_stream_reconnect() {
    counter!("coin_pulse_stream_reconnects_total").increment(1);
}

/// Record a frame painted.
pub fn record_frame_rendered(duration: Duration) {
    counter!("coin_pulse_frames_total", "result" => "drawn").increment(1);
    histogram!("coin_pulse_frame_render_seconds").record(duration.as_secs_f64());
}

/// Record a frame dropped because a draw was already in progress.
pub fn record_frame_skipped() {
    counter!("coin_pulse_frames_total", "result" => "skipped").increment(1);
}

// =============================================================================
// Tests
// =============================================================================
