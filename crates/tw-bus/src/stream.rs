//! Redis Streams-backed event bus: publish, consumer-group read, ack, trim.

use std::collections::HashMap;

use redis::aio::ConnectionManager;
use redis::streams::{StreamMaxlen, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, RedisError};
use rust_decimal::Decimal;
use tracing::{info, warn};
use tw_core::{Side, TradeEvent};

use crate::error::{BusError, Result};

pub const DEFAULT_STREAM_NAME: &str = "trades";
pub const DEFAULT_MAX_LEN: usize = 100_000;
pub const DEFAULT_BLOCK_MS: usize = 1_000;
pub const DEFAULT_COUNT: usize = 10;

/// One stream entry delivered to a consumer.
#[derive(Debug, Clone)]
pub struct StreamEntry {
    pub entry_id: String,
    pub event: TradeEvent,
}

/// Summary stats for a consumer group, surfaced to the health monitor.
#[derive(Debug, Clone, Default)]
pub struct GroupInfo {
    pub name: String,
    pub consumers: i64,
    pub pending: i64,
    pub last_delivered_id: String,
}

fn serialize_trade_event(event: &TradeEvent) -> Vec<(&'static str, String)> {
    vec![
        ("market_id", event.market_id.clone()),
        ("trade_id", event.trade_id.clone()),
        ("wallet_address", event.wallet_address.clone()),
        ("side", event.side.as_str().to_string()),
        ("outcome", event.outcome.clone()),
        ("outcome_index", event.outcome_index.to_string()),
        ("price", event.price.to_string()),
        ("size", event.size.to_string()),
        ("timestamp", event.timestamp.to_rfc3339()),
        ("asset_id", event.asset_id.clone()),
        (
            "market_slug",
            event.market_slug.clone().unwrap_or_default(),
        ),
        (
            "event_title",
            event.event_title.clone().unwrap_or_default(),
        ),
        (
            "trader_alias",
            event.trader_alias.clone().unwrap_or_default(),
        ),
        (
            "timestamp_was_fallback",
            event.timestamp_was_fallback.to_string(),
        ),
    ]
}

fn deserialize_trade_event(entry_id: &str, data: &HashMap<String, redis::Value>) -> Result<TradeEvent> {
    let get = |key: &str| -> String {
        data.get(key)
            .and_then(|v| match v {
                redis::Value::BulkString(bytes) => String::from_utf8(bytes.clone()).ok(),
                redis::Value::SimpleString(s) => Some(s.clone()),
                _ => None,
            })
            .unwrap_or_default()
    };

    let err = |reason: &str| BusError::Deserialize {
        entry_id: entry_id.to_string(),
        reason: reason.to_string(),
    };

    let side = Side::parse(&get("side")).unwrap_or(Side::Buy);
    let price: Decimal = get("price").parse().map_err(|_| err("bad price"))?;
    let size: Decimal = get("size").parse().map_err(|_| err("bad size"))?;
    let timestamp = chrono::DateTime::parse_from_rfc3339(&get("timestamp"))
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now());
    let outcome_index: u8 = get("outcome_index").parse().unwrap_or(0);
    let timestamp_was_fallback = get("timestamp_was_fallback") == "true";

    let opt = |s: String| if s.is_empty() { None } else { Some(s) };

    Ok(TradeEvent {
        market_id: get("market_id"),
        trade_id: get("trade_id"),
        wallet_address: get("wallet_address"),
        side,
        outcome: get("outcome"),
        outcome_index,
        price: price.into(),
        size: size.into(),
        timestamp,
        asset_id: get("asset_id"),
        market_slug: opt(get("market_slug")),
        event_title: opt(get("event_title")),
        trader_alias: opt(get("trader_alias")),
        timestamp_was_fallback,
    })
}

/// Event bus over a single Redis Stream, with per-stage consumer groups.
pub struct EventBus {
    conn: ConnectionManager,
    stream_name: String,
    max_len: usize,
}

impl EventBus {
    pub async fn connect(redis_url: &str, stream_name: impl Into<String>, max_len: usize) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            stream_name: stream_name.into(),
            max_len,
        })
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    /// Publish a single event, returning the entry id Redis assigned.
    pub async fn publish(&self, event: &TradeEvent) -> Result<String> {
        let mut conn = self.conn.clone();
        let fields = serialize_trade_event(event);
        let id: String = conn
            .xadd_maxlen(&self.stream_name, StreamMaxlen::Approx(self.max_len), "*", &fields)
            .await?;
        Ok(id)
    }

    /// Publish a batch via a single pipelined round-trip.
    pub async fn publish_batch(&self, events: &[TradeEvent]) -> Result<Vec<String>> {
        if events.is_empty() {
            return Ok(Vec::new());
        }
        let mut pipe = redis::pipe();
        for event in events {
            let fields = serialize_trade_event(event);
            pipe.xadd_maxlen(&self.stream_name, StreamMaxlen::Approx(self.max_len), "*", &fields);
        }
        let mut conn = self.conn.clone();
        let ids: Vec<String> = pipe.query_async(&mut conn).await?;
        Ok(ids)
    }

    /// Idempotently create a consumer group, tolerating `BUSYGROUP`.
    pub async fn ensure_group(&self, group: &str, start_id: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let result: std::result::Result<(), RedisError> =
            conn.xgroup_create_mkstream(&self.stream_name, group, start_id).await;
        match result {
            Ok(()) => {
                info!(group, stream = %self.stream_name, "created consumer group");
                Ok(true)
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Read undelivered entries for this consumer (`>`).
    pub async fn read(
        &self,
        group: &str,
        consumer: &str,
        count: usize,
        block_ms: usize,
    ) -> Result<Vec<StreamEntry>> {
        let opts = StreamReadOptions::default()
            .group(group, consumer)
            .count(count)
            .block(block_ms);
        let mut conn = self.conn.clone();
        let reply: StreamReadReply = conn
            .xread_options(&[self.stream_name.as_str()], &[">"], &opts)
            .await?;
        Ok(self.decode_reply(reply))
    }

    /// Re-read entries already delivered to this consumer but not acked
    /// (crash recovery): `XREADGROUP ... 0`.
    pub async fn read_pending(&self, group: &str, consumer: &str, count: usize) -> Result<Vec<StreamEntry>> {
        let opts = StreamReadOptions::default().group(group, consumer).count(count);
        let mut conn = self.conn.clone();
        let reply: StreamReadReply = conn
            .xread_options(&[self.stream_name.as_str()], &["0"], &opts)
            .await?;
        Ok(self.decode_reply(reply))
    }

    fn decode_reply(&self, reply: StreamReadReply) -> Vec<StreamEntry> {
        let mut entries = Vec::new();
        for key in reply.keys {
            for id in key.ids {
                if id.map.is_empty() {
                    continue;
                }
                match deserialize_trade_event(&id.id, &id.map) {
                    Ok(event) => entries.push(StreamEntry { entry_id: id.id, event }),
                    Err(e) => warn!(entry_id = %id.id, error = %e, "dropping undecodable entry"),
                }
            }
        }
        entries
    }

    pub async fn ack(&self, group: &str, entry_ids: &[String]) -> Result<i64> {
        if entry_ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let acked: i64 = conn.xack(&self.stream_name, group, entry_ids).await?;
        Ok(acked)
    }

    pub async fn trim(&self, max_len: usize) -> Result<i64> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.xtrim(&self.stream_name, StreamMaxlen::Approx(max_len)).await?;
        Ok(removed)
    }

    pub async fn len(&self) -> Result<u64> {
        let mut conn = self.conn.clone();
        let n: u64 = conn.xlen(&self.stream_name).await?;
        Ok(n)
    }

    /// `XINFO GROUPS` summary, used by the health surface.
    pub async fn group_info(&self, group: &str) -> Result<Option<GroupInfo>> {
        let mut conn = self.conn.clone();
        let groups: Vec<HashMap<String, redis::Value>> =
            redis::cmd("XINFO").arg("GROUPS").arg(&self.stream_name).query_async(&mut conn).await?;

        for g in groups {
            let name = value_to_string(g.get("name"));
            if name != group {
                continue;
            }
            return Ok(Some(GroupInfo {
                name,
                consumers: value_to_i64(g.get("consumers")),
                pending: value_to_i64(g.get("pending")),
                last_delivered_id: value_to_string(g.get("last-delivered-id")),
            }));
        }
        Ok(None)
    }
}

fn value_to_string(v: Option<&redis::Value>) -> String {
    match v {
        Some(redis::Value::BulkString(bytes)) => String::from_utf8_lossy(bytes).into_owned(),
        Some(redis::Value::SimpleString(s)) => s.clone(),
        Some(redis::Value::Int(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn value_to_i64(v: Option<&redis::Value>) -> i64 {
    match v {
        Some(redis::Value::Int(n)) => *n,
        Some(redis::Value::BulkString(bytes)) => String::from_utf8_lossy(bytes).parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tw_core::{Price, Usdc};

    fn sample_event() -> TradeEvent {
        TradeEvent {
            market_id: "0xcond".into(),
            trade_id: "0xtx".into(),
            wallet_address: "0xabc".into(),
            side: Side::Buy,
            outcome: "Yes".into(),
            outcome_index: 0,
            price: Price::new(Decimal::new(42, 2)),
            size: Usdc::new(Decimal::new(100, 0)),
            timestamp: Utc::now(),
            asset_id: "asset-1".into(),
            market_slug: Some("mkt".into()),
            event_title: None,
            trader_alias: None,
            timestamp_was_fallback: false,
        }
    }

    #[test]
    fn serialize_roundtrips_through_deserialize() {
        let event = sample_event();
        let fields = serialize_trade_event(&event);
        let map: HashMap<String, redis::Value> = fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), redis::Value::BulkString(v.into_bytes())))
            .collect();
        let decoded = deserialize_trade_event("1-0", &map).unwrap();
        assert_eq!(decoded.market_id, event.market_id);
        assert_eq!(decoded.price, event.price);
        assert_eq!(decoded.side, event.side);
    }

    #[test]
    fn missing_timestamp_field_falls_back_to_now() {
        let mut map = HashMap::new();
        map.insert("price".to_string(), redis::Value::BulkString(b"0.1".to_vec()));
        map.insert("size".to_string(), redis::Value::BulkString(b"10".to_vec()));
        let decoded = deserialize_trade_event("1-0", &map).unwrap();
        assert!((Utc::now() - decoded.timestamp).num_seconds() < 5);
    }
}
