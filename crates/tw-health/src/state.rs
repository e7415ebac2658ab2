//! Shared state for the health HTTP surface.

use std::sync::Arc;

use tw_telemetry::HealthMonitor;

#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<HealthMonitor>,
}

impl AppState {
    pub fn new(monitor: Arc<HealthMonitor>) -> Self {
        Self { monitor }
    }
}
