//! Prometheus metrics collection for chanrelay.
//!
//! Metrics live in `OnceLock` statics registered by [`init`]. Recording
//! helpers are no-ops until then, so library code and tests can call them
//! unconditionally.
//!
//! - `chanrelay_events_delivered_total` - events acknowledged by the sink
//! - `chanrelay_events_dropped_total{reason}` - messages that never became deliveries
//! - `chanrelay_delivery_failures_total{class}` - failed deliveries by sink error
//! - `chanrelay_writers_opened_total` / `chanrelay_writers_open` - writer churn
//! - `chanrelay_channels_joined` - runtime registry size
//! - `chanrelay_reconcile_cycles_total{outcome}` - reconciliation cycles
//! - `chanrelay_delivery_duration_seconds` - write latency including retries

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::{Once, OnceLock};
use std::time::Duration;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Events acknowledged by the sink.
pub static EVENTS_DELIVERED: OnceLock<IntCounter> = OnceLock::new();

/// Messages dropped before delivery, by reason.
pub static EVENTS_DROPPED: OnceLock<IntCounterVec> = OnceLock::new();

/// Deliveries that failed after classification and retries, by error class.
pub static DELIVERY_FAILURES: OnceLock<IntCounterVec> = OnceLock::new();

/// Writers opened against the sink.
pub static WRITERS_OPENED: OnceLock<IntCounter> = OnceLock::new();

/// Reconciliation cycles by outcome.
pub static RECONCILE_CYCLES: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges (can increase/decrease)
// ========================================================================

/// Writers currently cached.
pub static WRITERS_OPEN: OnceLock<IntGauge> = OnceLock::new();

/// Channels in the runtime registry.
pub static CHANNELS_JOINED: OnceLock<IntGauge> = OnceLock::new();

// ========================================================================
// Histograms
// ========================================================================

/// Time spent writing one event, retries included.
pub static DELIVERY_DURATION: OnceLock<Histogram> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Called once at startup; later calls are no-ops.
pub fn init() {
    static INIT: Once = Once::new();
    INIT.call_once(register_all);
}

fn register_all() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            match $init {
                Ok(m) => {
                    if let Err(e) = r.register(Box::new(m.clone())) {
                        tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                    }
                    let _ = $metric.set(m);
                }
                Err(e) => {
                    tracing::error!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                }
            }
        };
    }

    register!(EVENTS_DELIVERED, IntCounter::new("chanrelay_events_delivered_total", "Events acknowledged by the sink"));
    register!(EVENTS_DROPPED, IntCounterVec::new(Opts::new("chanrelay_events_dropped_total", "Messages dropped before delivery"), &["reason"]));
    register!(DELIVERY_FAILURES, IntCounterVec::new(Opts::new("chanrelay_delivery_failures_total", "Failed deliveries by sink error class"), &["class"]));
    register!(WRITERS_OPENED, IntCounter::new("chanrelay_writers_opened_total", "Writers opened against the sink"));
    register!(RECONCILE_CYCLES, IntCounterVec::new(Opts::new("chanrelay_reconcile_cycles_total", "Reconciliation cycles by outcome"), &["outcome"]));
    register!(WRITERS_OPEN, IntGauge::new("chanrelay_writers_open", "Writers currently cached"));
    register!(CHANNELS_JOINED, IntGauge::new("chanrelay_channels_joined", "Channels in the runtime registry"));
    register!(DELIVERY_DURATION, Histogram::with_opts(
        HistogramOpts::new("chanrelay_delivery_duration_seconds", "Event write latency including retries")
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0])));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Recording helpers
// ============================================================================

pub fn record_delivered() {
    if let Some(m) = EVENTS_DELIVERED.get() {
        m.inc();
    }
}

pub fn record_drop(reason: &str) {
    if let Some(m) = EVENTS_DROPPED.get() {
        m.with_label_values(&[reason]).inc();
    }
}

pub fn record_delivery_failure(class: &str) {
    if let Some(m) = DELIVERY_FAILURES.get() {
        m.with_label_values(&[class]).inc();
    }
}

pub fn record_writer_opened() {
    if let Some(m) = WRITERS_OPENED.get() {
        m.inc();
    }
}

/// Record a reconciliation cycle: `"ok"` or an error code.
pub fn record_reconcile(outcome: &str) {
    if let Some(m) = RECONCILE_CYCLES.get() {
        m.with_label_values(&[outcome]).inc();
    }
}

pub fn set_writers_open(count: usize) {
    if let Some(m) = WRITERS_OPEN.get() {
        m.set(count as i64);
    }
}

pub fn set_channels_joined(count: usize) {
    if let Some(m) = CHANNELS_JOINED.get() {
        m.set(count as i64);
    }
}

pub fn observe_delivery(elapsed: Duration) {
    if let Some(m) = DELIVERY_DURATION.get() {
        m.observe(elapsed.as_secs_f64());
    }
}
