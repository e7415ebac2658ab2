//! Heartbeat management: tracks ping/pong timing and message activity so the
//! connection loop can detect a silently-dead socket.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

pub struct HeartbeatManager {
    interval_ms: u64,
    timeout_ms: u64,
    last_ping: Arc<RwLock<Option<DateTime<Utc>>>>,
    last_pong: Arc<RwLock<Option<DateTime<Utc>>>>,
    last_message: Arc<RwLock<DateTime<Utc>>>,
    waiting_for_pong: Arc<RwLock<bool>>,
}

impl HeartbeatManager {
    pub fn new(interval_ms: u64, timeout_ms: u64) -> Self {
        Self {
            interval_ms,
            timeout_ms,
            last_ping: Arc::new(RwLock::new(None)),
            last_pong: Arc::new(RwLock::new(None)),
            last_message: Arc::new(RwLock::new(Utc::now())),
            waiting_for_pong: Arc::new(RwLock::new(false)),
        }
    }

    pub fn reset(&self) {
        *self.last_ping.write() = None;
        *self.last_pong.write() = None;
        *self.last_message.write() = Utc::now();
        *self.waiting_for_pong.write() = false;
    }

    pub fn record_ping(&self) {
        let now = Utc::now();
        *self.last_ping.write() = Some(now);
        *self.waiting_for_pong.write() = true;
        debug!(time = %now, "sent heartbeat ping");
    }

    pub fn record_pong(&self) {
        let now = Utc::now();
        *self.last_pong.write() = Some(now);
        *self.waiting_for_pong.write() = false;
        if let Some(ping) = *self.last_ping.read() {
            let rtt_ms = (now - ping).num_milliseconds();
            debug!(rtt_ms, "received heartbeat pong");
        }
    }

    pub fn record_message(&self) {
        *self.last_message.write() = Utc::now();
    }

    pub fn is_timed_out(&self) -> bool {
        if !*self.waiting_for_pong.read() {
            return false;
        }
        match *self.last_ping.read() {
            Some(ping) => (Utc::now() - ping).num_milliseconds() as u64 > self.timeout_ms,
            None => false,
        }
    }

    pub fn time_since_last_message_ms(&self) -> i64 {
        (Utc::now() - *self.last_message.read()).num_milliseconds()
    }

    pub fn should_send_heartbeat(&self) -> bool {
        if *self.waiting_for_pong.read() {
            return false;
        }
        self.time_since_last_message_ms() as u64 >= self.interval_ms
    }

    pub async fn wait_for_check(&self) {
        tokio::time::sleep(Duration::from_millis(self.interval_ms / 2)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_not_timed_out() {
        let hb = HeartbeatManager::new(30_000, 10_000);
        assert!(!hb.is_timed_out());
        assert!(!hb.should_send_heartbeat());
    }

    #[test]
    fn ping_then_pong_clears_wait() {
        let hb = HeartbeatManager::new(30_000, 10_000);
        hb.record_ping();
        assert!(!hb.should_send_heartbeat());
        hb.record_pong();
        assert!(!hb.is_timed_out());
    }
}
