//! The atomic unit flowing through the pipeline: a single executed trade.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Price, Usdc};
use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    pub fn parse(raw: &str) -> Option<Side> {
        match raw.to_ascii_uppercase().as_str() {
            "BUY" => Some(Side::Buy),
            "SELL" => Some(Side::Sell),
            _ => None,
        }
    }
}

/// A single trade pulled off the market activity feed.
///
/// Never mutated after construction: detectors and the scorer consume it by
/// reference or clone, and it is discarded once scored (no persistence of
/// the raw trade itself).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub market_id: String,
    pub trade_id: String,
    pub wallet_address: String,
    pub side: Side,
    pub outcome: String,
    pub outcome_index: u8,
    pub price: Price,
    pub size: Usdc,
    pub timestamp: DateTime<Utc>,
    pub asset_id: String,
    pub market_slug: Option<String>,
    pub event_title: Option<String>,
    pub trader_alias: Option<String>,
    /// True when `timestamp` was synthesized from `Utc::now()` because the
    /// wire payload sent a non-integer value. Surfaced so operators can see
    /// upstream clock corruption instead of it being silently absorbed.
    pub timestamp_was_fallback: bool,
}

impl TradeEvent {
    /// `price * size`, in USDC.
    pub fn notional(&self) -> Usdc {
        self.size.notional(self.price)
    }

    /// Validate the invariants the spec requires of every trade: price in
    /// `[0, 1]`, non-negative size, and timestamp no more than 5s in the future.
    pub fn validate(&self) -> Result<()> {
        if self.price.inner() < Decimal::ZERO || self.price.inner() > Decimal::ONE {
            return Err(CoreError::InvalidPrice(format!(
                "price {} outside [0,1]",
                self.price
            )));
        }
        if self.size.inner() < Decimal::ZERO {
            return Err(CoreError::InvalidSize(format!(
                "size {} is negative",
                self.size
            )));
        }
        let skew = self.timestamp - Utc::now();
        if skew.num_seconds() > 5 {
            return Err(CoreError::InvalidTradeEvent(format!(
                "timestamp {} is more than 5s in the future",
                self.timestamp
            )));
        }
        Ok(())
    }
}

/// Raw wire payload for a single market-activity frame, as sent by the feed.
#[derive(Debug, Deserialize)]
pub struct WireTradePayload {
    #[serde(rename = "conditionId")]
    pub condition_id: String,
    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,
    #[serde(rename = "proxyWallet")]
    pub proxy_wallet: String,
    pub side: String,
    pub outcome: String,
    #[serde(rename = "outcomeIndex")]
    pub outcome_index: u8,
    pub price: serde_json::Value,
    pub size: serde_json::Value,
    /// Wire timestamp is "usually" an integer number of seconds, but the
    /// upstream feed is occasionally observed sending malformed values.
    pub timestamp: serde_json::Value,
    pub asset: String,
    pub slug: Option<String>,
    #[serde(rename = "eventSlug")]
    pub event_slug: Option<String>,
    pub title: Option<String>,
    pub name: Option<String>,
    pub pseudonym: Option<String>,
}

impl WireTradePayload {
    /// Decode into a validated [`TradeEvent`], preserving the upstream parse
    /// tolerance: a non-integer `timestamp` becomes "now" rather than a
    /// rejected message (see SPEC_FULL.md design notes).
    pub fn into_trade_event(self) -> Result<TradeEvent> {
        let side = Side::parse(&self.side)
            .ok_or_else(|| CoreError::InvalidTradeEvent(format!("unknown side {}", self.side)))?;

        let price = parse_decimal_value(&self.price)
            .map(Price::new)
            .ok_or_else(|| CoreError::InvalidPrice(format!("{:?}", self.price)))?;
        let size = parse_decimal_value(&self.size)
            .map(Usdc::new)
            .ok_or_else(|| CoreError::InvalidSize(format!("{:?}", self.size)))?;

        let (timestamp, timestamp_was_fallback) = match self.timestamp.as_i64() {
            Some(secs) => (
                DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_else(Utc::now),
                false,
            ),
            None => (Utc::now(), true),
        };

        let market_slug = self.slug.or(self.event_slug);
        let event_title = self.title;
        let trader_alias = self.pseudonym.or(self.name);

        let event = TradeEvent {
            market_id: self.condition_id,
            trade_id: self.transaction_hash,
            wallet_address: self.proxy_wallet.to_ascii_lowercase(),
            side,
            outcome: self.outcome,
            outcome_index: self.outcome_index,
            price,
            size,
            timestamp,
            asset_id: self.asset,
            market_slug,
            event_title,
            trader_alias,
            timestamp_was_fallback,
        };
        event.validate()?;
        Ok(event)
    }
}

fn parse_decimal_value(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::String(s) => s.parse().ok(),
        serde_json::Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(timestamp: serde_json::Value) -> WireTradePayload {
        WireTradePayload {
            condition_id: "0xcond".into(),
            transaction_hash: "0xtx".into(),
            proxy_wallet: "0xABCDEF0000000000000000000000000000001234".into(),
            side: "BUY".into(),
            outcome: "Yes".into(),
            outcome_index: 0,
            price: serde_json::json!("0.42"),
            size: serde_json::json!("100"),
            timestamp,
            asset: "asset-1".into(),
            slug: Some("some-market".into()),
            event_slug: None,
            title: Some("Some Market".into()),
            name: None,
            pseudonym: Some("trader1".into()),
        }
    }

    #[test]
    fn decodes_valid_integer_timestamp() {
        let now = Utc::now().timestamp();
        let trade = payload(serde_json::json!(now)).into_trade_event().unwrap();
        assert!(!trade.timestamp_was_fallback);
        assert_eq!(trade.wallet_address, "0xabcdef0000000000000000000000000000001234");
    }

    #[test]
    fn non_integer_timestamp_falls_back_to_now() {
        let trade = payload(serde_json::json!("not-a-timestamp"))
            .into_trade_event()
            .unwrap();
        assert!(trade.timestamp_was_fallback);
    }

    #[test]
    fn rejects_price_out_of_range() {
        let mut p = payload(serde_json::json!(Utc::now().timestamp()));
        p.price = serde_json::json!("1.5");
        assert!(p.into_trade_event().is_err());
    }
}
