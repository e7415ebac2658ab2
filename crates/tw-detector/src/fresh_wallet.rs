//! Fresh-wallet detector: fires when a trade's wallet profile is fresh.

use std::collections::HashMap;

use chrono::Utc;
use tw_core::{FreshWalletSignal, TradeEvent, WalletProfile};
use tw_profiler::WalletAnalyzer;

/// Notional above which a fresh-wallet trade earns a confidence bonus.
pub const LARGE_TRADE_THRESHOLD: rust_decimal::Decimal = rust_decimal::Decimal::from_parts(1000, 0, 0, false, 0);

pub struct FreshWalletDetector {
    analyzer: WalletAnalyzer,
}

impl FreshWalletDetector {
    pub fn new(analyzer: WalletAnalyzer) -> Self {
        Self { analyzer }
    }

    /// Evaluate a trade, returning `None` when the wallet isn't fresh.
    pub async fn evaluate(&self, trade: &TradeEvent) -> Option<FreshWalletSignal> {
        let profile = self.analyzer.analyze(&trade.wallet_address, false).await.ok()?;
        self.signal_for(trade, profile)
    }

    fn signal_for(&self, trade: &TradeEvent, profile: WalletProfile) -> Option<FreshWalletSignal> {
        if !profile.is_fresh {
            return None;
        }

        let mut factors = HashMap::new();
        let mut confidence: f64 = 0.5;
        factors.insert("base_fresh".to_string(), 0.5);

        if profile.is_brand_new() {
            confidence += 0.2;
            factors.insert("brand_new_bonus".to_string(), 0.2);
        }

        if trade.notional().inner() >= LARGE_TRADE_THRESHOLD {
            confidence += 0.1;
            factors.insert("large_trade_bonus".to_string(), 0.1);
        }

        confidence = confidence.clamp(0.0, 1.0);

        Some(FreshWalletSignal {
            trade_event: trade.clone(),
            wallet_profile: profile,
            confidence,
            factors,
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc as ChronoUtc;
    use rust_decimal::Decimal;
    use tw_core::{Price, Side, Usdc};

    fn trade(notional: Decimal) -> TradeEvent {
        TradeEvent {
            market_id: "0xmkt".into(),
            trade_id: "0xtx".into(),
            wallet_address: "0xabc".into(),
            side: Side::Buy,
            outcome: "Yes".into(),
            outcome_index: 0,
            price: Price::new(Decimal::new(5, 1)),
            size: Usdc::new(notional * Decimal::TWO),
            timestamp: ChronoUtc::now(),
            asset_id: "asset".into(),
            market_slug: None,
            event_title: None,
            trader_alias: None,
            timestamp_was_fallback: false,
        }
    }

    fn fresh_profile(nonce: u64) -> WalletProfile {
        WalletProfile::new("0xabc".into(), nonce, None, Decimal::ZERO, Decimal::ZERO, 5)
    }

    #[test]
    fn stale_wallet_yields_no_signal() {
        let detector = FreshWalletDetector::new(WalletAnalyzer::new(dummy_client()));
        let profile = WalletProfile::new("0xabc".into(), 100, None, Decimal::ZERO, Decimal::ZERO, 5);
        assert!(detector.signal_for(&trade(Decimal::from(10)), profile).is_none());
    }

    #[test]
    fn brand_new_wallet_gets_bonus() {
        let detector = FreshWalletDetector::new(WalletAnalyzer::new(dummy_client()));
        let signal = detector.signal_for(&trade(Decimal::from(10)), fresh_profile(0)).unwrap();
        assert!(signal.confidence >= 0.7);
    }

    fn dummy_client() -> tw_chain::ChainClient {
        tw_chain::ChainClient::new(tw_chain::ChainClientConfig::new("http://localhost:0")).unwrap()
    }
}
