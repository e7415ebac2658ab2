//! Channel that logs the formatted alert instead of sending it. Active when
//! `DRY_RUN=true`, so circuit-breaker and rate-limiter code stays exercised
//! in deployments with no outbound network access.

use tracing::info;
use tw_core::FormattedAlert;

use crate::channel::{AlertChannel, BoxFuture};

pub struct DryRunChannel {
    name: String,
}

impl DryRunChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for DryRunChannel {
    fn default() -> Self {
        Self::new("dry-run")
    }
}

impl AlertChannel for DryRunChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, alert: &FormattedAlert) -> BoxFuture<'_, bool> {
        let title = alert.title.clone();
        let body = alert.plain_text.clone();
        Box::pin(async move {
            info!(title = %title, body = %body, "dry-run alert");
            true
        })
    }
}
