//! Fans an alert out to every configured channel concurrently, with a
//! per-channel circuit breaker so a failing channel stops being hammered.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info, warn};
use tw_core::FormattedAlert;

use crate::channel::AlertChannel;

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_RECOVERY_TIMEOUT_SECONDS: i64 = 60;
pub const DEFAULT_HALF_OPEN_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Default)]
pub struct CircuitBreakerState {
    pub failure_count: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub is_open: bool,
    pub half_open_attempts: u32,
}

#[derive(Debug, Clone, Default)]
pub struct DispatchResult {
    pub success_count: usize,
    pub failure_count: usize,
    pub channel_results: HashMap<String, bool>,
    pub timestamp: DateTime<Utc>,
}

impl DispatchResult {
    pub fn all_succeeded(&self) -> bool {
        self.failure_count == 0 && self.success_count > 0
    }
}

pub struct AlertDispatcher {
    channels: Vec<Box<dyn AlertChannel>>,
    failure_threshold: u32,
    recovery_timeout_seconds: i64,
    half_open_max_attempts: u32,
    circuit_state: RwLock<HashMap<String, CircuitBreakerState>>,
}

impl AlertDispatcher {
    pub fn new(channels: Vec<Box<dyn AlertChannel>>) -> Self {
        let circuit_state = channels
            .iter()
            .map(|c| (c.name().to_string(), CircuitBreakerState::default()))
            .collect();
        Self {
            channels,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout_seconds: DEFAULT_RECOVERY_TIMEOUT_SECONDS,
            half_open_max_attempts: DEFAULT_HALF_OPEN_MAX_ATTEMPTS,
            circuit_state: RwLock::new(circuit_state),
        }
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_recovery_timeout_seconds(mut self, seconds: i64) -> Self {
        self.recovery_timeout_seconds = seconds;
        self
    }

    fn should_attempt(&self, channel_name: &str) -> bool {
        let state = self.circuit_state.read();
        let Some(state) = state.get(channel_name) else {
            return true;
        };
        if !state.is_open {
            return true;
        }
        let Some(last_failure) = state.last_failure_time else {
            return false;
        };
        let elapsed = (Utc::now() - last_failure).num_seconds();
        elapsed >= self.recovery_timeout_seconds && state.half_open_attempts < self.half_open_max_attempts
    }

    fn record_success(&self, channel_name: &str) {
        let mut states = self.circuit_state.write();
        if let Some(state) = states.get_mut(channel_name) {
            *state = CircuitBreakerState::default();
            debug!(channel = channel_name, "circuit closed");
        }
    }

    fn record_failure(&self, channel_name: &str) {
        let mut states = self.circuit_state.write();
        let Some(state) = states.get_mut(channel_name) else {
            return;
        };
        state.failure_count += 1;
        state.last_failure_time = Some(Utc::now());

        if state.is_open {
            state.half_open_attempts += 1;
        } else if state.failure_count >= self.failure_threshold {
            state.is_open = true;
            warn!(channel = channel_name, failures = state.failure_count, "circuit opened");
        }
    }

    async fn send_to_channel(&self, channel: &dyn AlertChannel, alert: &FormattedAlert) -> (String, bool) {
        let name = channel.name().to_string();

        if !self.should_attempt(&name) {
            debug!(channel = %name, "skipping, circuit open");
            return (name, false);
        }

        let success = channel.send(alert).await;
        if success {
            self.record_success(&name);
        } else {
            self.record_failure(&name);
        }
        (name, success)
    }

    /// Dispatch to all channels concurrently.
    pub async fn dispatch(&self, alert: &FormattedAlert) -> DispatchResult {
        if self.channels.is_empty() {
            warn!("no channels configured for dispatch");
            return DispatchResult::default();
        }

        let results = futures_util::future::join_all(
            self.channels.iter().map(|c| self.send_to_channel(c.as_ref(), alert)),
        )
        .await;

        let channel_results: HashMap<String, bool> = results.into_iter().collect();
        let success_count = channel_results.values().filter(|&&ok| ok).count();
        let failure_count = channel_results.len() - success_count;

        info!(success_count, total = channel_results.len(), "dispatch complete");

        DispatchResult {
            success_count,
            failure_count,
            channel_results,
            timestamp: Utc::now(),
        }
    }

    pub async fn dispatch_batch(&self, alerts: &[FormattedAlert]) -> Vec<DispatchResult> {
        let mut results = Vec::with_capacity(alerts.len());
        for alert in alerts {
            results.push(self.dispatch(alert).await);
        }
        results
    }

    pub fn circuit_status(&self) -> HashMap<String, CircuitBreakerState> {
        self.circuit_state.read().clone()
    }

    pub fn reset_circuit(&self, channel_name: &str) -> bool {
        let mut states = self.circuit_state.write();
        if let Some(state) = states.get_mut(channel_name) {
            *state = CircuitBreakerState::default();
            info!(channel = channel_name, "circuit reset");
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dry_run::DryRunChannel;
    use std::collections::HashMap as Map;
    use tw_core::DiscordEmbed;

    fn alert() -> FormattedAlert {
        FormattedAlert {
            title: "t".into(),
            body: "b".into(),
            discord_embed: DiscordEmbed {
                title: "t".into(),
                color: 0,
                fields: vec![],
                footer: "f".into(),
                url: None,
            },
            telegram_markdown: "t".into(),
            plain_text: "t".into(),
            links: Map::new(),
        }
    }

    #[tokio::test]
    async fn dry_run_channel_always_succeeds() {
        let dispatcher = AlertDispatcher::new(vec![Box::new(DryRunChannel::default())]);
        let result = dispatcher.dispatch(&alert()).await;
        assert!(result.all_succeeded());
    }

    #[tokio::test]
    async fn no_channels_returns_empty_result() {
        let dispatcher = AlertDispatcher::new(vec![]);
        let result = dispatcher.dispatch(&alert()).await;
        assert_eq!(result.success_count, 0);
        assert_eq!(result.failure_count, 0);
    }

    #[test]
    fn reset_circuit_clears_state() {
        let dispatcher = AlertDispatcher::new(vec![Box::new(DryRunChannel::default())]);
        dispatcher.record_failure("dry-run");
        assert!(dispatcher.reset_circuit("dry-run"));
        assert_eq!(dispatcher.circuit_status()["dry-run"].failure_count, 0);
    }
}
