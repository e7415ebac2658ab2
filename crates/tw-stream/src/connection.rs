//! Trade stream connection manager: connect, subscribe, reconnect on drop.

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use tw_core::TradeEvent;

use crate::error::{Result, StreamError};
use crate::heartbeat::HeartbeatManager;
use crate::message::{IncomingFrame, PingRequest, SubscribeRequest};

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub url: String,
    pub event_slug: Option<String>,
    pub market_slug: Option<String>,
    pub initial_reconnect_delay_ms: u64,
    pub max_reconnect_delay_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub heartbeat_timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            event_slug: None,
            market_slug: None,
            initial_reconnect_delay_ms: 1_000,
            max_reconnect_delay_ms: 60_000,
            heartbeat_interval_ms: 30_000,
            heartbeat_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

#[derive(Default)]
struct Counters {
    trades_received: AtomicU64,
    timestamp_fallbacks: AtomicU64,
    reconnect_count: AtomicU32,
    last_trade_time_ms: AtomicI64,
    connected_since_ms: AtomicI64,
}

/// Snapshot of stream counters, for the health surface.
#[derive(Debug, Clone)]
pub struct StreamStats {
    pub trades_received: u64,
    pub timestamp_fallbacks: u64,
    pub reconnect_count: u32,
    pub last_trade_time: Option<DateTime<Utc>>,
    pub connected_since: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Trade activity WebSocket client: connect / subscribe / decode / reconnect.
pub struct TradeStream {
    config: StreamConfig,
    state: Arc<RwLock<ConnectionState>>,
    heartbeat: Arc<HeartbeatManager>,
    counters: Arc<Counters>,
    last_error: Arc<RwLock<Option<String>>>,
    trade_tx: mpsc::Sender<TradeEvent>,
}

impl TradeStream {
    pub fn new(config: StreamConfig, trade_tx: mpsc::Sender<TradeEvent>) -> Self {
        let heartbeat = Arc::new(HeartbeatManager::new(config.heartbeat_interval_ms, config.heartbeat_timeout_ms));
        Self {
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            heartbeat,
            counters: Arc::new(Counters::default()),
            last_error: Arc::new(RwLock::new(None)),
            trade_tx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn stats(&self) -> StreamStats {
        let last_trade_ms = self.counters.last_trade_time_ms.load(Ordering::Relaxed);
        let connected_ms = self.counters.connected_since_ms.load(Ordering::Relaxed);
        StreamStats {
            trades_received: self.counters.trades_received.load(Ordering::Relaxed),
            timestamp_fallbacks: self.counters.timestamp_fallbacks.load(Ordering::Relaxed),
            reconnect_count: self.counters.reconnect_count.load(Ordering::Relaxed),
            last_trade_time: millis_to_datetime(last_trade_ms),
            connected_since: millis_to_datetime(connected_ms),
            last_error: self.last_error.read().clone(),
        }
    }

    /// Run the connect/reconnect loop forever. Returns only on a fatal,
    /// non-retryable setup error (there are none today; reserved for
    /// future config validation failures).
    pub async fn run(&self) -> Result<()> {
        let mut attempt: u32 = 0;
        loop {
            *self.state.write() = ConnectionState::Connecting;

            match self.try_connect().await {
                Ok(()) => info!("trade stream connection closed normally"),
                Err(e) => {
                    error!(error = %e, "trade stream connection error");
                    *self.last_error.write() = Some(e.to_string());
                }
            }

            attempt += 1;
            self.counters.reconnect_count.store(attempt, Ordering::Relaxed);
            *self.state.write() = ConnectionState::Reconnecting;

            let delay = backoff_delay(attempt, self.config.initial_reconnect_delay_ms, self.config.max_reconnect_delay_ms);
            warn!(attempt, delay_ms = delay.as_millis(), "reconnecting trade stream");
            tokio::time::sleep(delay).await;
        }
    }

    async fn try_connect(&self) -> Result<()> {
        info!(url = %self.config.url, "connecting trade stream");
        let (ws_stream, _response) = connect_async(&self.config.url).await?;
        let (mut write, mut read) = ws_stream.split();

        *self.state.write() = ConnectionState::Connected;
        self.counters.connected_since_ms.store(Utc::now().timestamp_millis(), Ordering::Relaxed);
        self.heartbeat.reset();
        info!("trade stream connected");

        let subscribe = SubscribeRequest::trades(self.config.event_slug.clone(), self.config.market_slug.clone());
        write.send(Message::Text(serde_json::to_string(&subscribe)?)).await?;

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text(&text).await?;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            self.heartbeat.record_pong();
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "normal close".to_string()));
                            warn!(code, %reason, "trade stream closed by server");
                            return Err(StreamError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            warn!("trade stream ended");
                            return Ok(());
                        }
                        _ => {}
                    }
                }
                _ = self.heartbeat.wait_for_check() => {
                    if self.heartbeat.is_timed_out() {
                        return Err(StreamError::HeartbeatTimeout);
                    }
                    if self.heartbeat.should_send_heartbeat() {
                        write.send(Message::Text(serde_json::to_string(&PingRequest::new())?)).await?;
                        self.heartbeat.record_ping();
                        debug!("sent heartbeat ping");
                    }
                }
            }
        }
    }

    async fn handle_text(&self, text: &str) -> Result<()> {
        self.heartbeat.record_message();

        let frame: IncomingFrame = match serde_json::from_str(text) {
            Ok(f) => f,
            Err(e) => {
                debug!(error = %e, "unparseable frame, ignoring");
                return Ok(());
            }
        };

        if frame.is_pong() {
            self.heartbeat.record_pong();
            return Ok(());
        }

        if !frame.is_trade_frame() {
            debug!(topic = %frame.topic, frame_type = %frame.frame_type, "ignoring non-trade frame");
            return Ok(());
        }

        for payload in frame.trade_payloads() {
            match payload.into_trade_event() {
                Ok(event) => {
                    if event.timestamp_was_fallback {
                        self.counters.timestamp_fallbacks.fetch_add(1, Ordering::Relaxed);
                    }
                    self.counters.trades_received.fetch_add(1, Ordering::Relaxed);
                    self.counters.last_trade_time_ms.store(Utc::now().timestamp_millis(), Ordering::Relaxed);
                    if self.trade_tx.send(event).await.is_err() {
                        warn!("trade receiver dropped");
                    }
                }
                Err(e) => warn!(error = %e, "dropping invalid trade event"),
            }
        }

        Ok(())
    }
}

fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    if ms == 0 {
        None
    } else {
        DateTime::from_timestamp_millis(ms)
    }
}

fn backoff_delay(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(10);
    let delay = base_ms.saturating_mul(1u64 << exponent).min(max_ms);
    let jitter = jitter_ms();
    Duration::from_millis(delay + jitter)
}

fn jitter_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().subsec_nanos();
    (nanos % 1000) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_reasonable_bounds() {
        let config = StreamConfig::default();
        assert_eq!(config.initial_reconnect_delay_ms, 1_000);
        assert_eq!(config.heartbeat_interval_ms, 30_000);
    }

    #[test]
    fn backoff_grows_and_caps() {
        let d1 = backoff_delay(1, 1_000, 60_000);
        let d4 = backoff_delay(4, 1_000, 60_000);
        assert!(d4 >= d1);
        let capped = backoff_delay(20, 1_000, 60_000);
        assert!(capped.as_millis() < 62_000);
    }
}
