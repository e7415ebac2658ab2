//! Wallet analysis: nonce/balance fan-out into a cached [`WalletProfile`].

use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures_util::future::join_all;
use rust_decimal::Decimal;
use tracing::warn;
use tw_chain::ChainClient;
use tw_core::WalletProfile;

use crate::error::Result;

pub const DEFAULT_FRESH_THRESHOLD: u64 = 5;
pub const DEFAULT_PROFILE_CACHE_TTL: Duration = Duration::from_secs(300);
pub const USDC_POLYGON_ADDRESS: &str = "0x3c499c542cef5e3811e1192ce70d8cc03d5c3359";

struct CachedProfile {
    profile: WalletProfile,
    cached_at: Instant,
}

/// Analyzes wallets for fresh-wallet patterns: low nonce and (when known)
/// recent first activity.
pub struct WalletAnalyzer {
    client: ChainClient,
    fresh_threshold: u64,
    cache_ttl: Duration,
    usdc_address: String,
    cache: DashMap<String, CachedProfile>,
}

impl WalletAnalyzer {
    pub fn new(client: ChainClient) -> Self {
        Self {
            client,
            fresh_threshold: DEFAULT_FRESH_THRESHOLD,
            cache_ttl: DEFAULT_PROFILE_CACHE_TTL,
            usdc_address: USDC_POLYGON_ADDRESS.to_string(),
            cache: DashMap::new(),
        }
    }

    pub fn with_fresh_threshold(mut self, threshold: u64) -> Self {
        self.fresh_threshold = threshold;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    fn cached(&self, address: &str) -> Option<WalletProfile> {
        let entry = self.cache.get(address)?;
        if entry.cached_at.elapsed() > self.cache_ttl {
            return None;
        }
        Some(entry.profile.clone())
    }

    /// Analyze a wallet, fanning out nonce/MATIC-balance/USDC-balance/first-tx
    /// queries concurrently. A USDC-balance failure degrades to zero; a
    /// nonce or balance failure surfaces as an error.
    pub async fn analyze(&self, address: &str, force_refresh: bool) -> Result<WalletProfile> {
        let address = address.to_lowercase();

        if !force_refresh {
            if let Some(profile) = self.cached(&address) {
                return Ok(profile);
            }
        }

        let (nonce, matic_balance, usdc_balance, first_tx) = tokio::join!(
            self.client.transaction_count(&address),
            self.client.balance(&address),
            self.client.token_balance(&address, &self.usdc_address),
            self.client.first_transaction(&address),
        );

        let nonce = nonce?;
        let matic_balance = matic_balance?;
        let usdc_balance = usdc_balance.unwrap_or_else(|e| {
            warn!(address, error = %e, "failed to fetch usdc balance, defaulting to zero");
            Decimal::ZERO
        });
        let first_seen = first_tx.unwrap_or(None);

        let profile = WalletProfile::new(address.clone(), nonce, first_seen, matic_balance, usdc_balance, self.fresh_threshold);

        self.cache.insert(
            address,
            CachedProfile {
                profile: profile.clone(),
                cached_at: Instant::now(),
            },
        );

        Ok(profile)
    }

    pub async fn is_fresh(&self, address: &str) -> Result<bool> {
        Ok(self.analyze(address, false).await?.is_fresh)
    }

    /// Analyze many wallets concurrently, dropping failures from the result.
    pub async fn analyze_batch(&self, addresses: &[String], force_refresh: bool) -> std::collections::HashMap<String, WalletProfile> {
        let outcomes = join_all(addresses.iter().map(|addr| self.analyze(addr, force_refresh))).await;

        let mut results = std::collections::HashMap::new();
        for (addr, outcome) in addresses.iter().zip(outcomes) {
            match outcome {
                Ok(profile) => {
                    results.insert(addr.to_lowercase(), profile);
                }
                Err(e) => warn!(address = %addr, error = %e, "failed to analyze wallet"),
            }
        }
        results
    }

    pub async fn fresh_wallets(&self, addresses: &[String]) -> Vec<String> {
        self.analyze_batch(addresses, false)
            .await
            .into_iter()
            .filter(|(_, profile)| profile.is_fresh)
            .map(|(addr, _)| addr)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_ttl_defaults_to_five_minutes() {
        assert_eq!(DEFAULT_PROFILE_CACHE_TTL, Duration::from_secs(300));
    }

    #[test]
    fn fresh_threshold_default_is_five() {
        assert_eq!(DEFAULT_FRESH_THRESHOLD, 5);
    }
}
