//! Prometheus metrics for the whalewatch pipeline.
//!
//! Covers:
//! - Connection lifecycle per stream
//! - Circuit breaker state and reconnect pressure
//! - Frame throughput and classification outcomes
//! - Alert delivery
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, CounterVec, Encoder, GaugeVec, TextEncoder,
};
use whalewatch_core::{BreakerState, ConnectionState};

/// Connection lifecycle state per stream (1=active state, 0=inactive).
/// Labels: purpose, state (idle/connecting/connected/disconnecting/failed)
pub static CONNECTION_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "whalewatch_connection_state",
        "Connection lifecycle state per stream (1=active, 0=inactive)",
        &["purpose", "state"]
    )
    .unwrap()
});

/// Circuit breaker state per stream (1=active state, 0=inactive).
/// Labels: purpose, state (closed/open/half_open)
pub static BREAKER_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "whalewatch_breaker_state",
        "Circuit breaker state per stream (1=active, 0=inactive)",
        &["purpose", "state"]
    )
    .unwrap()
});

/// Consecutive reconnect attempts since the last subscribed connection.
pub static RECONNECT_ATTEMPTS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "whalewatch_reconnect_attempts",
        "Consecutive reconnect attempts since the last subscribed connection",
        &["purpose"]
    )
    .unwrap()
});

/// Total frames received off the wire.
pub static FRAMES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "whalewatch_frames_total",
        "Total frames received per stream",
        &["purpose"]
    )
    .unwrap()
});

/// Total frames that failed to parse.
pub static PARSE_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "whalewatch_parse_errors_total",
        "Total frames that failed to parse per stream",
        &["purpose"]
    )
    .unwrap()
});

/// Total events accepted by the classifier.
pub static EVENTS_ACCEPTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "whalewatch_events_accepted_total",
        "Total whale transfer events accepted per stream",
        &["purpose"]
    )
    .unwrap()
});

/// Total frames rejected by the classifier.
/// Labels: purpose, reason (type/missing_fields/self_transfer/out_of_range/suspicious/duplicate)
pub static EVENTS_REJECTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "whalewatch_events_rejected_total",
        "Total frames rejected by the classifier per stream",
        &["purpose", "reason"]
    )
    .unwrap()
});

/// Total alert delivery outcomes.
/// Labels: outcome (delivered/failed)
pub static ALERTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "whalewatch_alerts_total",
        "Total alert delivery outcomes",
        &["outcome"]
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Set connection state. Only the active state is 1, all others 0.
    pub fn connection_state(purpose: &str, state: ConnectionState) {
        for s in &["idle", "connecting", "connected", "disconnecting", "failed"] {
            CONNECTION_STATE.with_label_values(&[purpose, s]).set(0.0);
        }
        CONNECTION_STATE
            .with_label_values(&[purpose, &state.to_string()])
            .set(1.0);
    }

    /// Set circuit breaker state. Only the active state is 1, all others 0.
    pub fn breaker_state(purpose: &str, state: BreakerState) {
        for s in &["closed", "open", "half_open"] {
            BREAKER_STATE.with_label_values(&[purpose, s]).set(0.0);
        }
        BREAKER_STATE
            .with_label_values(&[purpose, &state.to_string()])
            .set(1.0);
    }

    /// Update the current reconnect attempt count.
    pub fn reconnect_attempts(purpose: &str, attempts: u32) {
        RECONNECT_ATTEMPTS
            .with_label_values(&[purpose])
            .set(f64::from(attempts));
    }

    /// Record one frame received.
    pub fn frame_received(purpose: &str) {
        FRAMES_TOTAL.with_label_values(&[purpose]).inc();
    }

    /// Add to the parse error total.
    pub fn parse_errors(purpose: &str, count: u64) {
        PARSE_ERRORS_TOTAL
            .with_label_values(&[purpose])
            .inc_by(count as f64);
    }

    /// Add to the accepted event total.
    pub fn events_accepted(purpose: &str, count: u64) {
        EVENTS_ACCEPTED_TOTAL
            .with_label_values(&[purpose])
            .inc_by(count as f64);
    }

    /// Add to a rejection reason total.
    pub fn events_rejected(purpose: &str, reason: &str, count: u64) {
        EVENTS_REJECTED_TOTAL
            .with_label_values(&[purpose, reason])
            .inc_by(count as f64);
    }

    /// Add to the delivered alert total.
    pub fn alerts_delivered(count: u64) {
        ALERTS_TOTAL
            .with_label_values(&["delivered"])
            .inc_by(count as f64);
    }

    /// Add to the failed alert total.
    pub fn alerts_failed(count: u64) {
        ALERTS_TOTAL
            .with_label_values(&["failed"])
            .inc_by(count as f64);
    }

    /// Render all registered metrics in Prometheus text format.
    pub fn render() -> crate::TelemetryResult<String> {
        let metric_families = prometheus::gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
