//! Detector output signals and the aggregated risk assessment.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::market::MarketMetadata;
use crate::trade::TradeEvent;
use crate::wallet::WalletProfile;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreshWalletSignal {
    pub trade_event: TradeEvent,
    pub wallet_profile: WalletProfile,
    pub confidence: f64,
    pub factors: HashMap<String, f64>,
    pub timestamp: DateTime<Utc>,
}

impl FreshWalletSignal {
    pub fn is_high_confidence(&self) -> bool {
        self.confidence >= 0.7
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeAnomalySignal {
    pub trade_event: TradeEvent,
    pub market_metadata: MarketMetadata,
    pub volume_impact: f64,
    pub book_impact: f64,
    pub is_niche_market: bool,
    pub confidence: f64,
    pub factors: HashMap<String, f64>,
    pub timestamp: DateTime<Utc>,
}

impl SizeAnomalySignal {
    pub fn is_high_confidence(&self) -> bool {
        self.confidence >= 0.7
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SniperClusterSignal {
    pub wallet_address: String,
    pub cluster_id: String,
    pub cluster_size: usize,
    pub avg_entry_delta_seconds: f64,
    pub markets_in_common: usize,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

impl SniperClusterSignal {
    pub fn is_high_confidence(&self) -> bool {
        self.confidence >= 0.7
    }
}

/// Combined scoring output. `should_alert` implies `weighted_score >=
/// alert_threshold` and that the scorer's dedup check did not suppress it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub trade_event: TradeEvent,
    pub wallet_address: String,
    pub market_id: String,
    pub fresh_wallet_signal: Option<FreshWalletSignal>,
    pub size_anomaly_signal: Option<SizeAnomalySignal>,
    pub sniper_cluster_signal: Option<SniperClusterSignal>,
    pub signals_triggered: u8,
    pub weighted_score: f64,
    pub should_alert: bool,
    pub assessment_id: String,
    pub timestamp: DateTime<Utc>,
}

impl RiskAssessment {
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn is_high_risk(&self) -> bool {
        self.weighted_score >= 0.7
    }
}
