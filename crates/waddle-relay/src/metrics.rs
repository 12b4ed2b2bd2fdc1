//! Relay metrics.
//!
//! Uses the global OpenTelemetry meter provider, which must be initialized
//! by the host application. Without one, recording is a no-op.

use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use opentelemetry::KeyValue;
use std::sync::OnceLock;

use crate::delivery::DeliveryOutcome;
use crate::error::DeliveryErrorKind;

static METER: OnceLock<Meter> = OnceLock::new();

fn meter() -> &'static Meter {
    METER.get_or_init(|| opentelemetry::global::meter("waddle-relay"))
}

// ============================================================================
// Counters (Cumulative)
// ============================================================================

/// Counter for relay requests accepted by the engine.
pub fn relays_submitted() -> Counter<u64> {
    meter()
        .u64_counter("xmpp.relay.submitted")
        .with_description("Total stanzas accepted for relay")
        .with_unit("stanza")
        .build()
}

/// Counter for relay tasks dropped by the overloaded pool.
pub fn relays_rejected() -> Counter<u64> {
    meter()
        .u64_counter("xmpp.relay.rejected")
        .with_description("Total relay tasks rejected by the worker pool")
        .with_unit("stanza")
        .build()
}

/// Counter for per-target delivery errors.
pub fn delivery_errors() -> Counter<u64> {
    meter()
        .u64_counter("xmpp.relay.delivery.errors")
        .with_description("Total delivery errors by kind")
        .with_unit("error")
        .build()
}

// ============================================================================
// Gauges (Current State)
// ============================================================================

/// Gauge for busy relay workers.
pub fn workers_busy() -> Gauge<i64> {
    meter()
        .i64_gauge("xmpp.relay.workers.busy")
        .with_description("Current number of relay workers running a task")
        .with_unit("worker")
        .build()
}

// ============================================================================
// Histograms (Latency)
// ============================================================================

/// Histogram for relay latency, from submission to completion.
pub fn relay_latency() -> Histogram<f64> {
    meter()
        .f64_histogram("xmpp.relay.latency")
        .with_description("Stanza relay latency")
        .with_unit("ms")
        .build()
}

// ============================================================================
// Metric Recording Helpers
// ============================================================================

/// Record a stanza accepted for relay.
pub fn record_relay_submitted(stanza_type: &str) {
    relays_submitted().add(1, &[KeyValue::new("type", stanza_type.to_string())]);
}

/// Record a relay task rejected by the pool.
pub fn record_relay_rejected() {
    relays_rejected().add(1, &[]);
}

/// Record one delivery error.
pub fn record_delivery_error(kind: DeliveryErrorKind) {
    delivery_errors().add(1, &[KeyValue::new("kind", kind.as_str())]);
}

/// Update the busy worker gauge.
pub fn record_busy_workers(count: i64) {
    workers_busy().record(count, &[]);
}

/// Record relay latency in milliseconds.
pub fn record_relay_latency(latency_ms: f64, stanza_type: &str, outcome: Option<DeliveryOutcome>) {
    let outcome = match outcome {
        Some(DeliveryOutcome::Success) => "success",
        Some(DeliveryOutcome::PartialSuccess) => "partial",
        Some(DeliveryOutcome::Failure) => "failure",
        None => "dropped",
    };
    relay_latency().record(
        latency_ms,
        &[
            KeyValue::new("type", stanza_type.to_string()),
            KeyValue::new("outcome", outcome),
        ],
    );
}
