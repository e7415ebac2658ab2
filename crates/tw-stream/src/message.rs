//! Wire message shapes for the trade activity feed.

use serde::{Deserialize, Serialize};
use tw_core::trade::WireTradePayload;

#[derive(Debug, Serialize)]
pub struct SubscribeRequest {
    #[serde(rename = "type")]
    pub request_type: &'static str,
    pub topic: &'static str,
    pub subscription_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_slug: Option<String>,
}

impl SubscribeRequest {
    pub fn trades(event_slug: Option<String>, market_slug: Option<String>) -> Self {
        Self {
            request_type: "subscribe",
            topic: "activity",
            subscription_type: "trades",
            event_slug,
            market_slug,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PingRequest {
    #[serde(rename = "type")]
    pub request_type: &'static str,
}

impl PingRequest {
    pub fn new() -> Self {
        Self { request_type: "ping" }
    }
}

impl Default for PingRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// Incoming frame envelope. Frames outside `(topic, type) == (activity,
/// trades)` are logged at debug and otherwise ignored.
#[derive(Debug, Deserialize)]
pub struct IncomingFrame {
    #[serde(default)]
    pub topic: String,
    #[serde(rename = "type", default)]
    pub frame_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl IncomingFrame {
    pub fn is_trade_frame(&self) -> bool {
        self.topic == "activity" && self.frame_type == "trades"
    }

    pub fn is_pong(&self) -> bool {
        self.frame_type == "pong"
    }

    /// Trade payloads arrive as either a single object or an array.
    pub fn trade_payloads(&self) -> Vec<WireTradePayload> {
        if self.payload.is_array() {
            serde_json::from_value(self.payload.clone()).unwrap_or_default()
        } else {
            serde_json::from_value::<WireTradePayload>(self.payload.clone())
                .map(|p| vec![p])
                .unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_trade_frame() {
        let frame = IncomingFrame {
            topic: "activity".into(),
            frame_type: "trades".into(),
            payload: serde_json::json!([]),
        };
        assert!(frame.is_trade_frame());
    }

    #[test]
    fn ignores_other_frames() {
        let frame = IncomingFrame {
            topic: "book".into(),
            frame_type: "snapshot".into(),
            payload: serde_json::Value::Null,
        };
        assert!(!frame.is_trade_frame());
    }
}
