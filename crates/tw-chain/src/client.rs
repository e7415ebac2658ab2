//! Polygon JSON-RPC client with caching, rate limiting, retries, and
//! primary/fallback failover.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::TtlCache;
use crate::error::{ChainError, Result};
use crate::rate_limiter::RateLimiter;

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const DEFAULT_MAX_REQUESTS_PER_SECOND: f64 = 25.0;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const PRIMARY_RECOVERY_INTERVAL: Duration = Duration::from_secs(60);

const ERC20_BALANCE_OF_SELECTOR: &str = "70a08231";

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// A block reference for log-range queries: either a concrete number or the
/// chain tip.
#[derive(Debug, Clone, Copy)]
pub enum BlockTag {
    Number(u64),
    Latest,
}

impl BlockTag {
    fn to_param(self) -> String {
        match self {
            BlockTag::Number(n) => format!("0x{n:x}"),
            BlockTag::Latest => "latest".to_string(),
        }
    }
}

/// A decoded ERC20 Transfer log entry.
#[derive(Debug, Clone)]
pub struct TransferLog {
    pub from_address: String,
    pub to_address: String,
    pub amount: Decimal,
    pub tx_hash: String,
    pub block_number: u64,
}

/// Options for the chain client.
pub struct ChainClientConfig {
    pub rpc_url: String,
    pub fallback_rpc_url: Option<String>,
    pub cache_ttl: Duration,
    pub max_requests_per_second: f64,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl ChainClientConfig {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            fallback_rpc_url: None,
            cache_ttl: DEFAULT_CACHE_TTL,
            max_requests_per_second: DEFAULT_MAX_REQUESTS_PER_SECOND,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_fallback(mut self, url: impl Into<String>) -> Self {
        self.fallback_rpc_url = Some(url.into());
        self
    }
}

/// Polygon JSON-RPC client.
///
/// Tries the primary endpoint first; on exhausted retries it marks the
/// primary unhealthy, falls over to the secondary endpoint if configured,
/// and re-probes the primary every [`PRIMARY_RECOVERY_INTERVAL`].
pub struct ChainClient {
    http: reqwest::Client,
    rpc_url: String,
    fallback_rpc_url: Option<String>,
    rate_limiter: RateLimiter,
    cache: TtlCache,
    cache_ttl: Duration,
    max_retries: u32,
    retry_delay: Duration,
    primary_healthy: AtomicBool,
    last_primary_check_ms: AtomicI64,
    request_id: AtomicI64,
}

impl ChainClient {
    pub fn new(config: ChainClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ChainError::Http(e.to_string()))?;

        Ok(Self {
            http,
            rpc_url: config.rpc_url,
            fallback_rpc_url: config.fallback_rpc_url,
            rate_limiter: RateLimiter::new(config.max_requests_per_second),
            cache: TtlCache::new(config.cache_ttl),
            cache_ttl: config.cache_ttl,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
            primary_healthy: AtomicBool::new(true),
            last_primary_check_ms: AtomicI64::new(0),
            request_id: AtomicI64::new(0),
        })
    }

    fn cache_key(&self, key_type: &str, address: &str) -> String {
        format!("chain:{key_type}:{}", address.to_lowercase())
    }

    fn should_try_primary(&self) -> bool {
        if self.primary_healthy.load(Ordering::Relaxed) {
            return true;
        }
        let now = chrono::Utc::now().timestamp_millis();
        let last = self.last_primary_check_ms.load(Ordering::Relaxed);
        if now - last > PRIMARY_RECOVERY_INTERVAL.as_millis() as i64 {
            self.last_primary_check_ms.store(now, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    async fn call_once(&self, url: &str, method: &str, params: Value) -> Result<Value> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed) as u64;
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        let response = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChainError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ChainError::Http(format!("http {}", response.status())));
        }

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|_| ChainError::BadResponse(method.to_string()))?;

        if let Some(err) = body.error {
            return Err(ChainError::RpcResponse(format!("{} ({})", err.message, err.code)));
        }

        body.result
            .ok_or_else(|| ChainError::BadResponse(method.to_string()))
    }

    /// Execute an RPC call against the primary, retrying with exponential
    /// backoff, then failing over to the fallback endpoint if configured.
    async fn execute_with_retry(&self, method: &str, params: Value) -> Result<Value> {
        self.rate_limiter.acquire().await;

        let mut last_error: Option<ChainError> = None;

        if self.should_try_primary() {
            let mut delay = self.retry_delay;
            for attempt in 0..self.max_retries {
                match self.call_once(&self.rpc_url, method, params.clone()).await {
                    Ok(value) => {
                        self.primary_healthy.store(true, Ordering::Relaxed);
                        return Ok(value);
                    }
                    Err(e) => {
                        warn!(method, attempt, max = self.max_retries, error = %e, "primary rpc failed");
                        last_error = Some(e);
                        if attempt + 1 < self.max_retries {
                            tokio::time::sleep(delay).await;
                            delay *= 2;
                        }
                    }
                }
            }
            self.primary_healthy.store(false, Ordering::Relaxed);
            self.last_primary_check_ms
                .store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);
        }

        if let Some(fallback_url) = &self.fallback_rpc_url {
            let mut delay = self.retry_delay;
            for attempt in 0..self.max_retries {
                match self.call_once(fallback_url, method, params.clone()).await {
                    Ok(value) => {
                        info!(method, "fallback rpc succeeded");
                        return Ok(value);
                    }
                    Err(e) => {
                        warn!(method, attempt, max = self.max_retries, error = %e, "fallback rpc failed");
                        last_error = Some(e);
                        if attempt + 1 < self.max_retries {
                            tokio::time::sleep(delay).await;
                            delay *= 2;
                        }
                    }
                }
            }
        }

        Err(ChainError::RpcFailed {
            method: method.to_string(),
            source: Box::new(last_error.unwrap_or_else(|| ChainError::RpcResponse("no endpoints configured".into()))),
        })
    }

    pub async fn transaction_count(&self, address: &str) -> Result<u64> {
        let key = self.cache_key("nonce", address);
        if let Some(cached) = self.cache.get(&key) {
            return cached.parse().map_err(|_| ChainError::BadResponse("nonce".into()));
        }

        let result = self
            .execute_with_retry("eth_getTransactionCount", serde_json::json!([address, "latest"]))
            .await?;
        let count = parse_hex_u64(&result)?;
        self.cache.set(key, count.to_string(), None);
        Ok(count)
    }

    pub async fn balance(&self, address: &str) -> Result<Decimal> {
        let key = self.cache_key("balance", address);
        if let Some(cached) = self.cache.get(&key) {
            return cached.parse().map_err(|_| ChainError::BadResponse("balance".into()));
        }

        let result = self
            .execute_with_retry("eth_getBalance", serde_json::json!([address, "latest"]))
            .await?;
        let balance = parse_hex_decimal(&result)?;
        self.cache.set(key, balance.to_string(), None);
        Ok(balance)
    }

    pub async fn token_balance(&self, address: &str, token_address: &str) -> Result<Decimal> {
        let key = format!("chain:token:{}:{}", token_address.to_lowercase(), address.to_lowercase());
        if let Some(cached) = self.cache.get(&key) {
            return cached.parse().map_err(|_| ChainError::BadResponse("token_balance".into()));
        }

        let padded = format!("{:0>64}", address.trim_start_matches("0x"));
        let data = format!("0x{ERC20_BALANCE_OF_SELECTOR}{padded}");
        let call = serde_json::json!([{ "to": token_address, "data": data }, "latest"]);

        let result = self.execute_with_retry("eth_call", call).await?;
        let balance = parse_hex_decimal(&result)?;
        self.cache.set(key, balance.to_string(), None);
        Ok(balance)
    }

    /// Get the block timestamp (unix seconds) for a block number, cached
    /// indefinitely relative to `cache_ttl` since blocks are immutable.
    pub async fn block_timestamp(&self, block_number: u64) -> Result<i64> {
        let key = format!("chain:block:{block_number}");
        if let Some(cached) = self.cache.get(&key) {
            return cached.parse().map_err(|_| ChainError::BadResponse("block".into()));
        }

        let hex_block = format!("0x{block_number:x}");
        let result = self
            .execute_with_retry("eth_getBlockByNumber", serde_json::json!([hex_block, false]))
            .await?;
        let timestamp = result
            .get("timestamp")
            .and_then(Value::as_str)
            .ok_or_else(|| ChainError::BadResponse("block timestamp".into()))?;
        let timestamp = i64::from_str_radix(timestamp.trim_start_matches("0x"), 16)
            .map_err(|_| ChainError::BadResponse("block timestamp".into()))?;
        self.cache.set(key, timestamp.to_string(), Some(Duration::from_secs(3600)));
        Ok(timestamp)
    }

    /// Fetch ERC20 Transfer logs matching an address filter within a block
    /// range. `topic_address` is padded into the indexed topic slot.
    pub async fn get_transfer_logs(
        &self,
        token_address: &str,
        topic1: Option<&str>,
        topic2: Option<&str>,
        from_block: u64,
        to_block: BlockTag,
    ) -> Result<Vec<TransferLog>> {
        let transfer_sig = format!("0x{}", hex::encode(alloy_primitives::keccak256(b"Transfer(address,address,uint256)")));

        let mut topics: Vec<Option<String>> = vec![Some(transfer_sig)];
        topics.push(topic1.map(|t| pad_topic_address(t.to_string())));
        topics.push(topic2.map(|t| pad_topic_address(t.to_string())));

        let filter = serde_json::json!({
            "address": token_address,
            "topics": topics,
            "fromBlock": format!("0x{from_block:x}"),
            "toBlock": to_block.to_param(),
        });

        let result = self.execute_with_retry("eth_getLogs", filter).await?;
        let entries = result
            .as_array()
            .ok_or_else(|| ChainError::BadResponse("eth_getLogs".into()))?;

        entries.iter().map(decode_transfer_log).collect()
    }

    /// Getting the first transaction's timestamp requires an indexer; this
    /// mirrors the upstream client in always returning `None` with a warning
    /// rather than scanning block history.
    pub async fn first_transaction(&self, address: &str) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
        let nonce = self.transaction_count(address).await?;
        if nonce == 0 {
            return Ok(None);
        }
        warn!(address, nonce, "first_transaction requires an indexer service, returning None");
        Ok(None)
    }

    pub async fn health_check(&self) -> bool {
        self.execute_with_retry("eth_blockNumber", serde_json::json!([])).await.is_ok()
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }
}

fn parse_hex_u64(value: &Value) -> Result<u64> {
    let s = value.as_str().ok_or_else(|| ChainError::BadResponse("expected hex string".into()))?;
    u64::from_str_radix(s.trim_start_matches("0x"), 16).map_err(|_| ChainError::BadResponse(s.to_string()))
}

fn parse_hex_decimal(value: &Value) -> Result<Decimal> {
    let s = value.as_str().ok_or_else(|| ChainError::BadResponse("expected hex string".into()))?;
    let trimmed = s.trim_start_matches("0x");
    let trimmed = if trimmed.is_empty() { "0" } else { trimmed };
    let as_u128 = u128::from_str_radix(trimmed, 16).map_err(|_| ChainError::BadResponse(s.to_string()))?;
    as_u128
        .to_string()
        .parse::<Decimal>()
        .map_err(|_| ChainError::BadResponse(s.to_string()))
}

fn pad_topic_address(address: String) -> String {
    let stripped = address.trim_start_matches("0x");
    format!("0x{:0>64}", stripped)
}

fn decode_transfer_log(entry: &Value) -> Result<TransferLog> {
    let topics = entry
        .get("topics")
        .and_then(Value::as_array)
        .ok_or_else(|| ChainError::BadResponse("log topics".into()))?;
    if topics.len() < 3 {
        return Err(ChainError::BadResponse("transfer log missing topics".into()));
    }
    let from_address = topic_to_address(topics[1].as_str().unwrap_or_default())?;
    let to_address = topic_to_address(topics[2].as_str().unwrap_or_default())?;
    let data = entry.get("data").and_then(Value::as_str).unwrap_or("0x0");
    let amount = parse_hex_decimal(&Value::String(data.to_string()))?;
    let tx_hash = entry
        .get("transactionHash")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let block_number = entry
        .get("blockNumber")
        .and_then(Value::as_str)
        .map(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16).unwrap_or(0))
        .unwrap_or(0);

    debug!(tx_hash, "decoded transfer log");

    Ok(TransferLog {
        from_address,
        to_address,
        amount,
        tx_hash,
        block_number,
    })
}

fn topic_to_address(topic: &str) -> Result<String> {
    let stripped = topic.trim_start_matches("0x");
    if stripped.len() < 40 {
        return Err(ChainError::InvalidAddress(topic.to_string()));
    }
    Ok(format!("0x{}", &stripped[stripped.len() - 40..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_u64() {
        assert_eq!(parse_hex_u64(&Value::String("0x2a".into())).unwrap(), 42);
    }

    #[test]
    fn parses_hex_decimal_zero() {
        assert_eq!(parse_hex_decimal(&Value::String("0x0".into())).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn topic_to_address_strips_padding() {
        let topic = "0x00000000000000000000000028c6c06298d514db089934071355e5743bf21d60";
        assert_eq!(
            topic_to_address(topic).unwrap(),
            "0x28c6c06298d514db089934071355e5743bf21d60"
        );
    }

    #[test]
    fn pad_topic_address_left_pads() {
        let padded = pad_topic_address("0xabc".to_string());
        assert_eq!(padded.len(), 66);
        assert!(padded.ends_with("abc"));
    }
}
