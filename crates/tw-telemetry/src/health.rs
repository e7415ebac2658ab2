//! Stream liveness tracking: per-stream state machine plus an aggregated
//! status used by the health HTTP surface and the Prometheus gauges.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::metrics::Metrics;

pub const DEFAULT_STALE_THRESHOLD_SECONDS: f64 = 60.0;
const WINDOW_DURATION_SECONDS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Active,
    Stale,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamHealth {
    pub name: String,
    pub status: StreamStatus,
    pub last_event_time: Option<DateTime<Utc>>,
    pub events_received: u64,
    pub events_per_second: f64,
    pub connected_since: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    #[serde(skip)]
    connected_at: Option<Instant>,
    #[serde(skip)]
    last_event_at: Option<Instant>,
}

impl StreamHealth {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StreamStatus::Disconnected,
            last_event_time: None,
            events_received: 0,
            events_per_second: 0.0,
            connected_since: None,
            last_error: None,
            connected_at: None,
            last_event_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub streams: HashMap<String, StreamHealth>,
    pub total_events_received: u64,
    pub total_events_per_second: f64,
    pub uptime_seconds: f64,
    pub timestamp: DateTime<Utc>,
}

struct Inner {
    streams: HashMap<String, StreamHealth>,
    event_windows: HashMap<String, VecDeque<Instant>>,
    start_time: Option<Instant>,
}

/// Tracks liveness and throughput for every registered upstream stream.
pub struct HealthMonitor {
    stale_threshold_seconds: f64,
    inner: Mutex<Inner>,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_THRESHOLD_SECONDS)
    }
}

impl HealthMonitor {
    pub fn new(stale_threshold_seconds: f64) -> Self {
        Self {
            stale_threshold_seconds,
            inner: Mutex::new(Inner {
                streams: HashMap::new(),
                event_windows: HashMap::new(),
                start_time: Some(Instant::now()),
            }),
        }
    }

    pub fn register_stream(&self, name: &str) {
        let mut inner = self.inner.lock();
        inner.streams.entry(name.to_string()).or_insert_with(|| StreamHealth::new(name));
        inner.event_windows.entry(name.to_string()).or_default();
    }

    pub fn set_stream_connected(&self, name: &str) {
        self.register_stream(name);
        let mut inner = self.inner.lock();
        let stream = inner.streams.get_mut(name).expect("registered above");
        stream.status = StreamStatus::Active;
        stream.connected_since = Some(Utc::now());
        stream.connected_at = Some(Instant::now());
        stream.last_error = None;
        Metrics::stream_status(name, 1.0);
    }

    pub fn set_stream_disconnected(&self, name: &str, error: Option<String>) {
        self.register_stream(name);
        let mut inner = self.inner.lock();
        let stream = inner.streams.get_mut(name).expect("registered above");
        stream.status = StreamStatus::Disconnected;
        stream.connected_since = None;
        stream.connected_at = None;
        stream.last_error = error;
        Metrics::stream_status(name, 0.0);
        Metrics::stream_reconnect(name);
    }

    pub fn record_event(&self, stream_name: &str, processing_time: Option<f64>) {
        self.register_stream(stream_name);
        let now = Instant::now();
        let now_utc = Utc::now();

        let mut inner = self.inner.lock();
        let stream = inner.streams.get_mut(stream_name).expect("registered above");
        stream.events_received += 1;
        stream.last_event_time = Some(now_utc);
        stream.last_event_at = Some(now);
        stream.status = StreamStatus::Active;

        Metrics::stream_status(stream_name, 1.0);
        Metrics::last_event_timestamp(stream_name, now_utc.timestamp() as f64);
        if let Some(latency) = processing_time {
            Metrics::event_latency(stream_name, latency);
        }

        let window = inner.event_windows.entry(stream_name.to_string()).or_default();
        window.push_back(now);
        let cutoff = now - std::time::Duration::from_secs_f64(WINDOW_DURATION_SECONDS);
        while window.front().is_some_and(|t| *t <= cutoff) {
            window.pop_front();
        }

        drop(inner);
        Metrics::event_received(stream_name);
    }

    fn calculate_throughput(window: &VecDeque<Instant>) -> f64 {
        if window.is_empty() {
            return 0.0;
        }
        let now = Instant::now();
        let cutoff = now - std::time::Duration::from_secs_f64(WINDOW_DURATION_SECONDS);
        let recent = window.iter().filter(|t| **t > cutoff).count();
        if recent == 0 {
            0.0
        } else {
            recent as f64 / WINDOW_DURATION_SECONDS
        }
    }

    fn check_staleness(streams: &mut HashMap<String, StreamHealth>, stale_threshold_seconds: f64) {
        let now = Instant::now();
        for (name, stream) in streams.iter_mut() {
            if stream.status == StreamStatus::Disconnected {
                continue;
            }
            let reference = stream.last_event_at.or(stream.connected_at);
            let Some(reference) = reference else { continue };
            let elapsed = now.saturating_duration_since(reference).as_secs_f64();
            if elapsed > stale_threshold_seconds {
                stream.status = StreamStatus::Stale;
                Metrics::stream_status(name, 0.5);
            } else if stream.last_event_at.is_some() {
                stream.status = StreamStatus::Active;
                Metrics::stream_status(name, 1.0);
            }
        }
    }

    fn determine_overall_status(streams: &HashMap<String, StreamHealth>) -> HealthStatus {
        if streams.is_empty() {
            return HealthStatus::Healthy;
        }
        let statuses: Vec<StreamStatus> = streams.values().map(|s| s.status).collect();
        if statuses.iter().all(|s| *s == StreamStatus::Disconnected) {
            return HealthStatus::Unhealthy;
        }
        if statuses.iter().any(|s| *s == StreamStatus::Disconnected || *s == StreamStatus::Stale) {
            return HealthStatus::Degraded;
        }
        HealthStatus::Healthy
    }

    pub fn get_health_report(&self) -> HealthReport {
        let mut inner = self.inner.lock();
        Self::check_staleness(&mut inner.streams, self.stale_threshold_seconds);

        let mut total_eps = 0.0;
        let event_windows = inner.event_windows.clone();
        for (name, stream) in inner.streams.iter_mut() {
            let window = event_windows.get(name).cloned().unwrap_or_default();
            let eps = Self::calculate_throughput(&window);
            stream.events_per_second = eps;
            Metrics::stream_throughput(name, eps);
            total_eps += eps;
        }

        let overall_status = Self::determine_overall_status(&inner.streams);
        Metrics::health_status(match overall_status {
            HealthStatus::Healthy => 1.0,
            HealthStatus::Degraded => 0.5,
            HealthStatus::Unhealthy => 0.0,
        });

        let uptime_seconds = inner.start_time.map(|t| t.elapsed().as_secs_f64()).unwrap_or(0.0);
        let total_events_received = inner.streams.values().map(|s| s.events_received).sum();

        HealthReport {
            status: overall_status,
            streams: inner.streams.clone(),
            total_events_received,
            total_events_per_second: total_eps,
            uptime_seconds,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_streams_registered_is_healthy() {
        let monitor = HealthMonitor::default();
        assert_eq!(monitor.get_health_report().status, HealthStatus::Healthy);
    }

    #[test]
    fn disconnected_stream_marks_unhealthy() {
        let monitor = HealthMonitor::default();
        monitor.set_stream_disconnected("trades", Some("closed".into()));
        assert_eq!(monitor.get_health_report().status, HealthStatus::Unhealthy);
    }

    #[test]
    fn one_of_two_disconnected_is_degraded() {
        let monitor = HealthMonitor::default();
        monitor.set_stream_connected("trades");
        monitor.record_event("trades", None);
        monitor.set_stream_disconnected("books", None);
        assert_eq!(monitor.get_health_report().status, HealthStatus::Degraded);
    }

    #[test]
    fn recorded_event_marks_stream_active() {
        let monitor = HealthMonitor::default();
        monitor.record_event("trades", Some(0.002));
        let report = monitor.get_health_report();
        assert_eq!(report.streams["trades"].status, StreamStatus::Active);
        assert_eq!(report.streams["trades"].events_received, 1);
    }

    #[test]
    fn stale_threshold_of_zero_immediately_marks_stale() {
        let monitor = HealthMonitor::new(0.0);
        monitor.set_stream_connected("trades");
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(monitor.get_health_report().streams["trades"].status, StreamStatus::Stale);
    }
}
