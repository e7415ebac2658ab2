pub mod error;
pub mod health;
pub mod logging;
pub mod metrics;

pub use error::{Result, TelemetryError};
pub use health::{HealthMonitor, HealthReport, HealthStatus, StreamHealth, StreamStatus};
pub use logging::init_logging;
pub use metrics::Metrics;
