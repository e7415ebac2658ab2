//! Funding-chain tracer: follows USDC transfers backwards to a known entity
//! or `max_hops`.

use futures_util::future::join_all;
use tracing::debug;
use tw_chain::{BlockTag, ChainClient, EntityRegistry};
use tw_core::wallet::{FundingChain, FundingOrigin, FundingTransfer};

use crate::error::Result;

const USDC_BRIDGED: &str = "0x2791bca1f2de4661ed88a30c99a7a9449aa84174";
const USDC_NATIVE: &str = "0x3c499c542cef5e3811e1192ce70d8cc03d5c3359";
pub const DEFAULT_MAX_HOPS: u32 = 3;

pub struct FundingTracer {
    client: ChainClient,
    entities: EntityRegistry,
    max_hops: u32,
    usdc_addresses: Vec<String>,
}

impl FundingTracer {
    pub fn new(client: ChainClient, entities: EntityRegistry) -> Self {
        Self {
            client,
            entities,
            max_hops: DEFAULT_MAX_HOPS,
            usdc_addresses: vec![USDC_BRIDGED.to_string(), USDC_NATIVE.to_string()],
        }
    }

    pub fn with_max_hops(mut self, max_hops: u32) -> Self {
        self.max_hops = max_hops;
        self
    }

    fn entity_origin(&self, address: &str) -> FundingOrigin {
        if self.entities.is_cex(address) {
            FundingOrigin::Cex
        } else if self.entities.is_bridge(address) {
            FundingOrigin::Bridge
        } else {
            FundingOrigin::Unknown
        }
    }

    /// Trace the funding chain for a wallet, following the earliest USDC
    /// transfer into each hop until a terminal entity or `max_hops`.
    pub async fn trace(&self, address: &str) -> FundingChain {
        let normalized = address.to_lowercase();
        let mut chain = Vec::new();
        let mut current = normalized.clone();
        let mut origin_address = normalized.clone();
        let mut origin_type = FundingOrigin::Unknown;

        for hop in 0..self.max_hops {
            if self.entities.is_terminal(&current) {
                origin_address = current.clone();
                origin_type = self.entity_origin(&current);
                debug!(address = %current, hop, "trace terminated at known entity");
                break;
            }

            let transfer = match self.first_usdc_transfer(&current).await {
                Ok(Some(t)) => t,
                Ok(None) => {
                    debug!(address = %current, hop, "no usdc transfer found");
                    origin_address = current.clone();
                    break;
                }
                Err(e) => {
                    debug!(address = %current, hop, error = %e, "transfer log query failed");
                    origin_address = current.clone();
                    break;
                }
            };

            origin_address = transfer.from_address.clone();
            current = transfer.from_address.clone();
            chain.push(transfer);

            if self.entities.is_terminal(&origin_address) {
                origin_type = self.entity_origin(&origin_address);
                break;
            }
        }

        FundingChain {
            target_address: normalized,
            hop_count: chain.len() as u32,
            chain,
            origin_address,
            origin_type,
            traced_at: chrono::Utc::now(),
        }
    }

    async fn first_usdc_transfer(&self, address: &str) -> Result<Option<FundingTransfer>> {
        for token in &self.usdc_addresses {
            if let Some(transfer) = self.first_token_transfer(address, token).await? {
                return Ok(Some(transfer));
            }
        }
        Ok(None)
    }

    async fn first_token_transfer(&self, to_address: &str, token_address: &str) -> Result<Option<FundingTransfer>> {
        let logs = self
            .client
            .get_transfer_logs(token_address, None, Some(to_address), 0, BlockTag::Latest)
            .await?;

        let Some(log) = logs.into_iter().next() else {
            return Ok(None);
        };

        let timestamp = self
            .client
            .block_timestamp(log.block_number)
            .await
            .ok()
            .and_then(|secs| chrono::DateTime::<chrono::Utc>::from_timestamp(secs, 0))
            .unwrap_or_else(chrono::Utc::now);

        Ok(Some(FundingTransfer {
            from_address: log.from_address,
            to_address: log.to_address,
            amount: log.amount,
            token: "USDC".to_string(),
            tx_hash: log.tx_hash,
            block_number: log.block_number,
            timestamp,
        }))
    }

    /// Trace many wallets concurrently.
    pub async fn trace_batch(&self, addresses: &[String]) -> std::collections::HashMap<String, FundingChain> {
        let chains = join_all(addresses.iter().map(|addr| self.trace(addr))).await;
        addresses
            .iter()
            .map(|a| a.to_lowercase())
            .zip(chains)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_max_hops_is_three() {
        assert_eq!(DEFAULT_MAX_HOPS, 3);
    }
}
