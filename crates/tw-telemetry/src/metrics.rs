//! Prometheus metrics for the trade-watch pipeline.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A duplicate metric name
//! is a fatal configuration error that should crash at startup, not fail
//! silently. These panics only occur during static initialization.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec,
    register_histogram_vec, Counter, CounterVec, Gauge, GaugeVec, HistogramVec,
};

pub static EVENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!("tw_events_total", "Total number of events received", &["stream"]).unwrap()
});

pub static EVENTS_PER_SECOND: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!("tw_events_per_second", "Current events per second rate", &["stream"]).unwrap()
});

pub static STREAM_STATUS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "tw_stream_status",
        "Stream status (1=active, 0.5=stale, 0=disconnected)",
        &["stream"]
    )
    .unwrap()
});

pub static LAST_EVENT_TIMESTAMP: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!("tw_last_event_timestamp", "Unix timestamp of last event received", &["stream"])
        .unwrap()
});

pub static EVENT_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "tw_event_latency_seconds",
        "Event processing latency in seconds",
        &["stream"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap()
});

pub static HEALTH_STATUS: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("tw_health_status", "Overall health status (1=healthy, 0.5=degraded, 0=unhealthy)").unwrap()
});

pub static TRADE_TIMESTAMP_FALLBACK_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "trade_timestamp_fallback_total",
        "Trades whose feed timestamp was non-integer and fell back to ingest time"
    )
    .unwrap()
});

pub static STREAM_RECONNECT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!("tw_stream_reconnect_total", "Total stream reconnection attempts", &["reason"]).unwrap()
});

pub static DETECTOR_SIGNAL_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!("tw_detector_signal_total", "Total signals emitted per detector", &["detector"]).unwrap()
});

pub static DEDUP_HIT_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!("tw_dedup_hit_total", "Assessments suppressed by dedup").unwrap()
});

pub static ALERT_DISPATCHED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tw_alert_dispatched_total",
        "Alert dispatch attempts per channel",
        &["channel", "outcome"]
    )
    .unwrap()
});

pub static CIRCUIT_OPEN: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!("tw_circuit_open", "Per-channel circuit breaker state (1=open)", &["channel"]).unwrap()
});

/// Facade over the statics above so call sites never touch label plumbing directly.
pub struct Metrics;

impl Metrics {
    pub fn event_received(stream: &str) {
        EVENTS_TOTAL.with_label_values(&[stream]).inc();
    }

    pub fn event_latency(stream: &str, seconds: f64) {
        EVENT_LATENCY.with_label_values(&[stream]).observe(seconds);
    }

    pub fn stream_throughput(stream: &str, events_per_second: f64) {
        EVENTS_PER_SECOND.with_label_values(&[stream]).set(events_per_second);
    }

    pub fn stream_status(stream: &str, value: f64) {
        STREAM_STATUS.with_label_values(&[stream]).set(value);
    }

    pub fn last_event_timestamp(stream: &str, unix_seconds: f64) {
        LAST_EVENT_TIMESTAMP.with_label_values(&[stream]).set(unix_seconds);
    }

    pub fn health_status(value: f64) {
        HEALTH_STATUS.set(value);
    }

    pub fn trade_timestamp_fallback() {
        TRADE_TIMESTAMP_FALLBACK_TOTAL.inc();
    }

    pub fn stream_reconnect(reason: &str) {
        STREAM_RECONNECT_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn detector_signal(detector: &str) {
        DETECTOR_SIGNAL_TOTAL.with_label_values(&[detector]).inc();
    }

    pub fn dedup_hit() {
        DEDUP_HIT_TOTAL.inc();
    }

    pub fn alert_dispatched(channel: &str, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        ALERT_DISPATCHED_TOTAL.with_label_values(&[channel, outcome]).inc();
    }

    pub fn circuit_open(channel: &str, is_open: bool) {
        CIRCUIT_OPEN.with_label_values(&[channel]).set(if is_open { 1.0 } else { 0.0 });
    }
}

/// Renders the current registry in Prometheus text exposition format.
pub fn render() -> Result<String, prometheus::Error> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let families = prometheus::gather();
    let mut buf = Vec::new();
    encoder.encode(&families, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
