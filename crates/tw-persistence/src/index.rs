//! In-process secondary index over alert records, by wallet and by market.
//!
//! Rebuilt by replaying the current day's JSON Lines file on startup so
//! operators can query recent history without a database.

use dashmap::DashMap;
use tw_core::AlertRecord;

#[derive(Default)]
pub struct AlertIndex {
    records: DashMap<String, AlertRecord>,
    by_wallet: DashMap<String, Vec<String>>,
    by_market: DashMap<String, Vec<String>>,
}

impl AlertIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: AlertRecord) {
        let id = record.assessment_id.clone();
        self.by_wallet.entry(record.wallet_address.clone()).or_default().push(id.clone());
        self.by_market.entry(record.market_id.clone()).or_default().push(id.clone());
        self.records.insert(id, record);
    }

    pub fn by_wallet(&self, wallet_address: &str) -> Vec<AlertRecord> {
        self.by_wallet
            .get(wallet_address)
            .map(|ids| ids.iter().filter_map(|id| self.records.get(id).map(|r| r.clone())).collect())
            .unwrap_or_default()
    }

    pub fn by_market(&self, market_id: &str) -> Vec<AlertRecord> {
        self.by_market
            .get(market_id)
            .map(|ids| ids.iter().filter_map(|id| self.records.get(id).map(|r| r.clone())).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: &str, wallet: &str, market: &str) -> AlertRecord {
        AlertRecord {
            assessment_id: id.to_string(),
            wallet_address: wallet.to_string(),
            market_id: market.to_string(),
            weighted_score: 0.7,
            signals_triggered: 1,
            channels_attempted: vec![],
            channels_succeeded: vec![],
            dedup_key: format!("{wallet}:{market}"),
            user_feedback: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn indexes_by_both_wallet_and_market() {
        let index = AlertIndex::new();
        index.insert(record("a1", "0xabc", "market-1"));
        index.insert(record("a2", "0xabc", "market-2"));

        assert_eq!(index.by_wallet("0xabc").len(), 2);
        assert_eq!(index.by_market("market-1").len(), 1);
        assert!(index.by_wallet("0xdead").is_empty());
    }
}
