//! Size-anomaly detector: flags trades large relative to daily volume or
//! top-of-book depth, with a niche-market multiplier.

use std::collections::HashMap;

use chrono::Utc;
use tw_core::{MarketCategory, MarketMetadata, SizeAnomalySignal, TradeEvent};

pub const DEFAULT_VOLUME_THRESHOLD: f64 = 0.02;
pub const DEFAULT_BOOK_THRESHOLD: f64 = 0.05;
pub const DEFAULT_NICHE_VOLUME_THRESHOLD: f64 = 50_000.0;
pub const CONFIDENCE_FLOOR: f64 = 0.1;

pub const NICHE_PRONE_CATEGORIES: &[MarketCategory] = &[MarketCategory::Science, MarketCategory::Other];

pub struct SizeAnomalyDetector {
    volume_threshold: f64,
    book_threshold: f64,
    niche_volume_threshold: f64,
}

impl Default for SizeAnomalyDetector {
    fn default() -> Self {
        Self {
            volume_threshold: DEFAULT_VOLUME_THRESHOLD,
            book_threshold: DEFAULT_BOOK_THRESHOLD,
            niche_volume_threshold: DEFAULT_NICHE_VOLUME_THRESHOLD,
        }
    }
}

impl SizeAnomalyDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn evaluate(
        &self,
        trade: &TradeEvent,
        market: Option<&MarketMetadata>,
        daily_volume: Option<f64>,
        book_depth: Option<f64>,
    ) -> Option<SizeAnomalySignal> {
        let placeholder;
        let market = match market {
            Some(m) => m,
            None => {
                placeholder = MarketMetadata::placeholder(trade.market_id.clone());
                &placeholder
            }
        };

        let notional: f64 = trade.notional().inner().to_string().parse().unwrap_or(0.0);

        let volume_impact = match daily_volume {
            Some(v) if v > 0.0 => notional / v,
            _ => 0.0,
        };
        let book_impact = match book_depth {
            Some(d) if d > 0.0 => notional / d,
            _ => 0.0,
        };

        let is_niche = match daily_volume {
            Some(v) => v < self.niche_volume_threshold,
            None => NICHE_PRONE_CATEGORIES.contains(&market.category),
        };

        let mut factors = HashMap::new();
        let mut components_sum = 0.0;
        let mut any_fired = false;

        if volume_impact > self.volume_threshold {
            let component = (0.5 * volume_impact / (3.0 * self.volume_threshold)).min(0.5);
            factors.insert("volume".to_string(), component);
            components_sum += component;
            any_fired = true;
        }

        if book_impact > self.book_threshold {
            let component = (0.3 * book_impact / (3.0 * self.book_threshold)).min(0.3);
            factors.insert("book".to_string(), component);
            components_sum += component;
            any_fired = true;
        }

        let confidence = if is_niche {
            if any_fired {
                factors.insert("niche_multiplier".to_string(), 1.5);
                components_sum * 1.5
            } else {
                factors.insert("niche_base".to_string(), 0.2);
                0.2
            }
        } else {
            components_sum
        }
        .clamp(0.0, 1.0);

        if confidence < CONFIDENCE_FLOOR {
            return None;
        }

        Some(SizeAnomalySignal {
            trade_event: trade.clone(),
            market_metadata: market.clone(),
            volume_impact,
            book_impact,
            is_niche_market: is_niche,
            confidence,
            factors,
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use tw_core::{Price, Side, Usdc};

    fn trade(size: i64) -> TradeEvent {
        TradeEvent {
            market_id: "0xmkt".into(),
            trade_id: "0xtx".into(),
            wallet_address: "0xabc".into(),
            side: Side::Buy,
            outcome: "Yes".into(),
            outcome_index: 0,
            price: Price::new(Decimal::new(5, 1)),
            size: Usdc::new(Decimal::from(size)),
            timestamp: Utc::now(),
            asset_id: "asset".into(),
            market_slug: None,
            event_title: None,
            trader_alias: None,
            timestamp_was_fallback: false,
        }
    }

    #[test]
    fn large_fraction_of_volume_fires() {
        let detector = SizeAnomalyDetector::new();
        let market = MarketMetadata::placeholder("0xmkt");
        let signal = detector.evaluate(&trade(10_000), Some(&market), Some(100_000.0), None);
        assert!(signal.is_some());
    }

    #[test]
    fn tiny_trade_below_floor_returns_none() {
        let detector = SizeAnomalyDetector::new();
        let market = MarketMetadata::placeholder("0xmkt");
        let signal = detector.evaluate(&trade(1), Some(&market), Some(10_000_000.0), Some(10_000_000.0));
        assert!(signal.is_none());
    }

    #[test]
    fn missing_market_defaults_to_niche() {
        let detector = SizeAnomalyDetector::new();
        let signal = detector.evaluate(&trade(10_000), None, None, None).unwrap();
        assert!(signal.is_niche_market);
    }
}
