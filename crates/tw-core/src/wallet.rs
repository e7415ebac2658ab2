//! Wallet profile and funding-chain value types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletProfile {
    pub address: String,
    pub nonce: u64,
    pub first_seen: Option<DateTime<Utc>>,
    pub age_hours: Option<f64>,
    pub is_fresh: bool,
    pub matic_balance: Decimal,
    pub usdc_balance: Decimal,
    pub analyzed_at: DateTime<Utc>,
    pub fresh_threshold: u64,
}

impl WalletProfile {
    /// `is_fresh ⇔ nonce < threshold ∧ (age_hours unknown ∨ age_hours < 48)`.
    pub fn compute_is_fresh(nonce: u64, age_hours: Option<f64>, fresh_threshold: u64) -> bool {
        let nonce_fresh = nonce < fresh_threshold;
        let age_fresh = age_hours.map_or(true, |hours| hours < 48.0);
        nonce_fresh && age_fresh
    }

    pub fn new(
        address: String,
        nonce: u64,
        first_seen: Option<DateTime<Utc>>,
        matic_balance: Decimal,
        usdc_balance: Decimal,
        fresh_threshold: u64,
    ) -> Self {
        let age_hours = first_seen.map(|ts| (Utc::now() - ts).num_seconds() as f64 / 3600.0);
        let is_fresh = Self::compute_is_fresh(nonce, age_hours, fresh_threshold);
        Self {
            address,
            nonce,
            first_seen,
            age_hours,
            is_fresh,
            matic_balance,
            usdc_balance,
            analyzed_at: Utc::now(),
            fresh_threshold,
        }
    }

    pub fn is_brand_new(&self) -> bool {
        self.nonce == 0
    }

    /// `0.6 * max(0, 1 - nonce/threshold) + 0.4 * (age unknown ? 1.0 : max(0, 1 - age/48))`.
    pub fn freshness_score(&self) -> f64 {
        let nonce_score = if self.fresh_threshold == 0 {
            0.0
        } else {
            (1.0 - self.nonce as f64 / self.fresh_threshold as f64).max(0.0)
        };
        let age_score = match self.age_hours {
            None => 1.0,
            Some(hours) => (1.0 - hours / 48.0).max(0.0),
        };
        0.6 * nonce_score + 0.4 * age_score
    }
}

/// A single hop in a funding chain: a USDC transfer into the traced wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingTransfer {
    pub from_address: String,
    pub to_address: String,
    pub amount: Decimal,
    pub token: String,
    pub tx_hash: String,
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FundingOrigin {
    Cex,
    Bridge,
    Unknown,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingChain {
    pub target_address: String,
    pub chain: Vec<FundingTransfer>,
    pub origin_address: String,
    pub origin_type: FundingOrigin,
    pub hop_count: u32,
    pub traced_at: DateTime<Utc>,
}

impl FundingChain {
    pub fn is_cex_origin(&self) -> bool {
        self.origin_type == FundingOrigin::Cex
    }

    pub fn is_bridge_origin(&self) -> bool {
        self.origin_type == FundingOrigin::Bridge
    }

    /// CEX origin is least suspicious (0.1); bridge origin slightly more
    /// (0.3); unknown origin with no hops is maximally suspicious (1.0);
    /// unknown at max hops is high (0.7); mid-chain interpolates linearly.
    pub fn suspiciousness_score(&self, max_hops: u32) -> f64 {
        if self.is_cex_origin() {
            return 0.1;
        }
        if self.is_bridge_origin() {
            return 0.3;
        }
        if self.hop_count == 0 {
            return 1.0;
        }
        if self.hop_count >= max_hops {
            return 0.7;
        }
        0.5 + 0.3 * (1.0 - self.hop_count as f64 / max_hops as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_threshold_boundary() {
        assert!(WalletProfile::compute_is_fresh(4, Some(10.0), 5));
        assert!(!WalletProfile::compute_is_fresh(5, Some(10.0), 5));
    }

    #[test]
    fn age_boundary_48_hours() {
        assert!(WalletProfile::compute_is_fresh(0, Some(47.99), 5));
        assert!(!WalletProfile::compute_is_fresh(0, Some(48.01), 5));
        // Exactly 48 is not fresh.
        assert!(!WalletProfile::compute_is_fresh(0, Some(48.0), 5));
    }

    #[test]
    fn unknown_age_never_blocks_freshness() {
        assert!(WalletProfile::compute_is_fresh(0, None, 5));
    }

    #[test]
    fn suspiciousness_score_unknown_zero_hops() {
        let chain = FundingChain {
            target_address: "0xdead".into(),
            chain: vec![],
            origin_address: "0xdead".into(),
            origin_type: FundingOrigin::Unknown,
            hop_count: 0,
            traced_at: Utc::now(),
        };
        assert_eq!(chain.suspiciousness_score(3), 1.0);
    }

    #[test]
    fn suspiciousness_score_cex() {
        let chain = FundingChain {
            target_address: "0xdead".into(),
            chain: vec![],
            origin_address: "0xexchange".into(),
            origin_type: FundingOrigin::Cex,
            hop_count: 1,
            traced_at: Utc::now(),
        };
        assert_eq!(chain.suspiciousness_score(3), 0.1);
    }
}
