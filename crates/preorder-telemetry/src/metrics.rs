//! Prometheus metrics for the preorder bot.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which is a programming error caught at first use.

use once_cell::sync::Lazy;
use prometheus::{
    register_gauge, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, Encoder, Gauge, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    TextEncoder,
};

/// Feed connection state (1 = connected, 0 = disconnected).
pub static FEED_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "preorder_feed_connected",
        "Market data WebSocket connection state (1=connected)"
    )
    .unwrap()
});

/// Total feed reconnections.
pub static FEED_RECONNECT_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "preorder_feed_reconnect_total",
        "Total market data WebSocket reconnections",
        &["reason"]
    )
    .unwrap()
});

/// Trade prints accepted into the pipeline.
pub static TRADES_INGESTED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "preorder_trades_ingested_total",
        "Trade prints accepted by ingest",
        &["symbol"]
    )
    .unwrap()
});

/// Contributions dropped because the aggregation channel stayed full.
pub static CONTRIBUTIONS_DROPPED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "preorder_contributions_dropped_total",
        "Trade contributions dropped under backpressure"
    )
    .unwrap()
});

/// Aggregated prices emitted to the evaluator.
pub static AGGREGATED_PRICES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "preorder_aggregated_prices_total",
        "Aggregated prices emitted",
        &["symbol"]
    )
    .unwrap()
});

/// Preorder evaluations by outcome.
/// Labels: outcome (created/canceled/deferred/failed/ineligible)
pub static EVALUATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "preorder_evaluations_total",
        "Preorder evaluations by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Broker call latency in milliseconds.
pub static BROKER_CALL_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "preorder_broker_call_latency_ms",
        "Broker session call latency in milliseconds",
        &["call"],
        vec![10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0]
    )
    .unwrap()
});

/// Keep-alive task failures.
/// Labels: task (refresh/recreate)
pub static KEEPALIVE_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "preorder_keepalive_failures_total",
        "Keep-alive task iterations that failed or panicked",
        &["task"]
    )
    .unwrap()
});

/// Session replacements.
/// Labels: result (ok/failed)
pub static SESSION_REPLACEMENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "preorder_session_replacements_total",
        "Broker session replacements",
        &["result"]
    )
    .unwrap()
});

/// Preorders still pending after the last evaluation.
pub static PENDING_PREORDERS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "preorder_pending_preorders",
        "Preorders in PENDING status"
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    /// Record feed connection state.
    pub fn feed_connected(connected: bool) {
        FEED_CONNECTED.set(if connected { 1.0 } else { 0.0 });
    }

    /// Record feed reconnection.
    pub fn feed_reconnect(reason: &str) {
        FEED_RECONNECT_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Record accepted trade prints.
    pub fn trades_ingested(symbol: &str, count: u64) {
        TRADES_INGESTED_TOTAL
            .with_label_values(&[symbol])
            .inc_by(count);
    }

    /// Record a dropped contribution.
    pub fn contribution_dropped() {
        CONTRIBUTIONS_DROPPED_TOTAL.inc();
    }

    /// Record an emitted aggregated price.
    pub fn aggregated_price(symbol: &str) {
        AGGREGATED_PRICES_TOTAL.with_label_values(&[symbol]).inc();
    }

    /// Record evaluation outcomes.
    pub fn evaluation(outcome: &str, count: u64) {
        if count > 0 {
            EVALUATIONS_TOTAL
                .with_label_values(&[outcome])
                .inc_by(count);
        }
    }

    /// Record broker call latency.
    pub fn broker_call_latency(call: &str, latency_ms: f64) {
        BROKER_CALL_LATENCY_MS
            .with_label_values(&[call])
            .observe(latency_ms);
    }

    /// Record a keep-alive failure.
    pub fn keepalive_failure(task: &str) {
        KEEPALIVE_FAILURES_TOTAL.with_label_values(&[task]).inc();
    }

    /// Record a session replacement.
    pub fn session_replaced(ok: bool) {
        let result = if ok { "ok" } else { "failed" };
        SESSION_REPLACEMENTS_TOTAL.with_label_values(&[result]).inc();
    }

    /// Set pending preorder count.
    pub fn pending_preorders(count: usize) {
        PENDING_PREORDERS.set(count as i64);
    }

    /// Encode all registered metrics in the Prometheus text format.
    pub fn gather_text() -> String {
        let encoder = TextEncoder::new();
        let families = prometheus::gather();
        let mut buf = Vec::new();
        if encoder.encode(&families, &mut buf).is_err() {
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}
