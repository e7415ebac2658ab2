//! Composite risk scorer: combines per-trade signals into a single weighted
//! `RiskAssessment`, with a Redis-backed dedup gate to stop repeat alerts on
//! the same wallet/market pair.

use std::collections::HashMap;

use parking_lot::RwLock;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info};
use tw_core::{FreshWalletSignal, RiskAssessment, SizeAnomalySignal, SniperClusterSignal, TradeEvent};

use crate::error::Result;

pub const DEFAULT_ALERT_THRESHOLD: f64 = 0.6;
pub const DEFAULT_DEDUP_WINDOW_SECONDS: u64 = 3600;
pub const DEFAULT_KEY_PREFIX: &str = "polymarket:dedup:";

pub const MULTI_SIGNAL_BONUS_2: f64 = 1.2;
pub const MULTI_SIGNAL_BONUS_3: f64 = 1.3;

/// Every signal that fired for one trade, ready to be scored.
#[derive(Debug, Clone)]
pub struct SignalBundle {
    pub trade_event: TradeEvent,
    pub fresh_wallet_signal: Option<FreshWalletSignal>,
    pub size_anomaly_signal: Option<SizeAnomalySignal>,
    pub sniper_cluster_signal: Option<SniperClusterSignal>,
}

impl SignalBundle {
    pub fn new(trade_event: TradeEvent) -> Self {
        Self {
            trade_event,
            fresh_wallet_signal: None,
            size_anomaly_signal: None,
            sniper_cluster_signal: None,
        }
    }

    pub fn wallet_address(&self) -> &str {
        &self.trade_event.wallet_address
    }

    pub fn market_id(&self) -> &str {
        &self.trade_event.market_id
    }
}

fn default_weights() -> HashMap<String, f64> {
    HashMap::from([
        ("fresh_wallet".to_string(), 0.40),
        ("size_anomaly".to_string(), 0.35),
        ("niche_market".to_string(), 0.25),
    ])
}

pub struct RiskScorer {
    conn: ConnectionManager,
    weights: RwLock<HashMap<String, f64>>,
    alert_threshold: f64,
    dedup_window_seconds: u64,
    key_prefix: String,
}

impl RiskScorer {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            weights: RwLock::new(default_weights()),
            alert_threshold: DEFAULT_ALERT_THRESHOLD,
            dedup_window_seconds: DEFAULT_DEDUP_WINDOW_SECONDS,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        })
    }

    pub fn with_alert_threshold(mut self, threshold: f64) -> Self {
        self.alert_threshold = threshold;
        self
    }

    pub fn with_dedup_window_seconds(mut self, seconds: u64) -> Self {
        self.dedup_window_seconds = seconds;
        self
    }

    pub fn weights(&self) -> HashMap<String, f64> {
        self.weights.read().clone()
    }

    pub fn set_weights(&self, weights: HashMap<String, f64>) {
        info!(?weights, "updated risk scorer weights");
        *self.weights.write() = weights;
    }

    /// Weighted score and the count of signals that fired, before dedup.
    pub fn calculate_weighted_score(&self, bundle: &SignalBundle) -> (f64, u8) {
        let weights = self.weights.read();
        let mut score = 0.0;
        let mut signals_triggered = 0u8;

        if let Some(signal) = &bundle.fresh_wallet_signal {
            score += signal.confidence * weights.get("fresh_wallet").copied().unwrap_or(0.0);
            signals_triggered += 1;
        }

        if let Some(signal) = &bundle.size_anomaly_signal {
            score += signal.confidence * weights.get("size_anomaly").copied().unwrap_or(0.0);
            signals_triggered += 1;

            if signal.is_niche_market {
                score += signal.confidence * weights.get("niche_market").copied().unwrap_or(0.0);
            }
        }

        if bundle.sniper_cluster_signal.is_some() {
            signals_triggered += 1;
        }

        if signals_triggered >= 3 {
            score *= MULTI_SIGNAL_BONUS_3;
        } else if signals_triggered >= 2 {
            score *= MULTI_SIGNAL_BONUS_2;
        }

        (score.min(1.0), signals_triggered)
    }

    pub async fn assess(&self, bundle: SignalBundle) -> Result<RiskAssessment> {
        let (weighted_score, signals_triggered) = self.calculate_weighted_score(&bundle);
        let meets_threshold = weighted_score >= self.alert_threshold;

        let is_duplicate = if meets_threshold {
            self.check_and_set_dedup(bundle.wallet_address(), bundle.market_id()).await?
        } else {
            false
        };

        let should_alert = meets_threshold && !is_duplicate;

        if should_alert {
            info!(
                wallet = %bundle.wallet_address(),
                market = %bundle.market_id(),
                score = weighted_score,
                signals = signals_triggered,
                "risk assessment triggered alert"
            );
        } else if is_duplicate {
            debug!(wallet = %bundle.wallet_address(), market = %bundle.market_id(), "risk assessment deduplicated");
        }

        Ok(RiskAssessment {
            wallet_address: bundle.wallet_address().to_string(),
            market_id: bundle.market_id().to_string(),
            trade_event: bundle.trade_event,
            fresh_wallet_signal: bundle.fresh_wallet_signal,
            size_anomaly_signal: bundle.size_anomaly_signal,
            sniper_cluster_signal: bundle.sniper_cluster_signal,
            signals_triggered,
            weighted_score,
            should_alert,
            assessment_id: RiskAssessment::new_id(),
            timestamp: chrono::Utc::now(),
        })
    }

    pub async fn assess_batch(&self, bundles: Vec<SignalBundle>) -> Result<Vec<RiskAssessment>> {
        let mut assessments = Vec::with_capacity(bundles.len());
        for bundle in bundles {
            assessments.push(self.assess(bundle).await?);
        }
        Ok(assessments)
    }

    async fn check_and_set_dedup(&self, wallet_address: &str, market_id: &str) -> Result<bool> {
        let key = format!("{}{}:{}", self.key_prefix, wallet_address, market_id);
        let mut conn = self.conn.clone();
        let was_set: bool = redis::cmd("SET")
            .arg(&key)
            .arg(chrono::Utc::now().to_rfc3339())
            .arg("NX")
            .arg("EX")
            .arg(self.dedup_window_seconds)
            .query_async::<Option<String>>(&mut conn)
            .await?
            .is_some();
        Ok(!was_set)
    }

    pub async fn clear_dedup(&self, wallet_address: &str, market_id: &str) -> Result<bool> {
        let key = format!("{}{}:{}", self.key_prefix, wallet_address, market_id);
        let mut conn = self.conn.clone();
        let deleted: i64 = conn.del(&key).await?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::collections::HashMap as Map;
    use tw_core::{Price, Side, Usdc};

    fn trade() -> TradeEvent {
        TradeEvent {
            market_id: "0xmkt".into(),
            trade_id: "0xtx".into(),
            wallet_address: "0xabc".into(),
            side: Side::Buy,
            outcome: "Yes".into(),
            outcome_index: 0,
            price: Price::new(Decimal::new(5, 1)),
            size: Usdc::new(Decimal::from(1000)),
            timestamp: Utc::now(),
            asset_id: "asset".into(),
            market_slug: None,
            event_title: None,
            trader_alias: None,
            timestamp_was_fallback: false,
        }
    }

    fn fresh_signal(confidence: f64) -> FreshWalletSignal {
        FreshWalletSignal {
            trade_event: trade(),
            wallet_profile: tw_core::WalletProfile::new("0xabc".into(), 0, None, Decimal::ZERO, Decimal::ZERO, 5),
            confidence,
            factors: Map::new(),
            timestamp: Utc::now(),
        }
    }

    fn scorer_with_weights(weights: HashMap<String, f64>) -> RiskScorerForTest {
        RiskScorerForTest { weights, alert_threshold: DEFAULT_ALERT_THRESHOLD }
    }

    /// A weight/threshold-only double of `RiskScorer` so the scoring math can
    /// be unit tested without a Redis connection.
    struct RiskScorerForTest {
        weights: HashMap<String, f64>,
        alert_threshold: f64,
    }

    impl RiskScorerForTest {
        fn calculate_weighted_score(&self, bundle: &SignalBundle) -> (f64, u8) {
            let mut score = 0.0;
            let mut signals_triggered = 0u8;

            if let Some(signal) = &bundle.fresh_wallet_signal {
                score += signal.confidence * self.weights.get("fresh_wallet").copied().unwrap_or(0.0);
                signals_triggered += 1;
            }
            if let Some(signal) = &bundle.size_anomaly_signal {
                score += signal.confidence * self.weights.get("size_anomaly").copied().unwrap_or(0.0);
                signals_triggered += 1;
                if signal.is_niche_market {
                    score += signal.confidence * self.weights.get("niche_market").copied().unwrap_or(0.0);
                }
            }
            if bundle.sniper_cluster_signal.is_some() {
                signals_triggered += 1;
            }

            if signals_triggered >= 3 {
                score *= MULTI_SIGNAL_BONUS_3;
            } else if signals_triggered >= 2 {
                score *= MULTI_SIGNAL_BONUS_2;
            }

            (score.min(1.0), signals_triggered)
        }
    }

    #[test]
    fn single_fresh_wallet_signal_weights_correctly() {
        let scorer = scorer_with_weights(default_weights());
        let mut bundle = SignalBundle::new(trade());
        bundle.fresh_wallet_signal = Some(fresh_signal(0.8));
        let (score, count) = scorer.calculate_weighted_score(&bundle);
        assert_eq!(count, 1);
        assert!((score - 0.32).abs() < 1e-9);
    }

    #[test]
    fn two_signals_get_multi_signal_bonus() {
        let scorer = scorer_with_weights(default_weights());
        let mut bundle = SignalBundle::new(trade());
        bundle.fresh_wallet_signal = Some(fresh_signal(0.8));
        bundle.sniper_cluster_signal = Some(SniperClusterSignal {
            wallet_address: "0xabc".into(),
            cluster_id: "c1".into(),
            cluster_size: 3,
            avg_entry_delta_seconds: 10.0,
            markets_in_common: 2,
            confidence: 0.7,
            timestamp: Utc::now(),
        });
        let (score, count) = scorer.calculate_weighted_score(&bundle);
        assert_eq!(count, 2);
        assert!((score - 0.32 * MULTI_SIGNAL_BONUS_2).abs() < 1e-9);
    }

    #[test]
    fn score_never_exceeds_one() {
        let weights = HashMap::from([
            ("fresh_wallet".to_string(), 1.0),
            ("size_anomaly".to_string(), 1.0),
            ("niche_market".to_string(), 1.0),
        ]);
        let scorer = scorer_with_weights(weights);
        let mut bundle = SignalBundle::new(trade());
        bundle.fresh_wallet_signal = Some(fresh_signal(1.0));
        bundle.sniper_cluster_signal = Some(SniperClusterSignal {
            wallet_address: "0xabc".into(),
            cluster_id: "c1".into(),
            cluster_size: 3,
            avg_entry_delta_seconds: 10.0,
            markets_in_common: 2,
            confidence: 1.0,
            timestamp: Utc::now(),
        });
        let (score, _) = scorer.calculate_weighted_score(&bundle);
        assert!(score <= 1.0);
    }
}
