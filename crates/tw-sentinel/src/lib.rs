//! Pipeline supervisor for the trade-surveillance stack: wires the trade
//! stream, event bus, detector and profiler stages, alert dispatch, and
//! the health HTTP surface behind a single graceful-shutdown-aware run loop.

pub mod config;
pub mod error;
pub mod shutdown;
pub mod supervisor;

pub use config::Settings;
pub use error::{AppError, AppResult};
pub use supervisor::Supervisor;
