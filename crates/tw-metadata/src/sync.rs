//! Background market-catalog sync worker with cache-first lookup.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tw_core::MarketMetadata;

use crate::catalog::CatalogClient;
use crate::error::{MetadataError, Result};

const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(300);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Stopped,
    Starting,
    Syncing,
    Idle,
    Stopping,
    Error,
}

#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    pub total_syncs: u64,
    pub successful_syncs: u64,
    pub failed_syncs: u64,
    pub markets_cached: usize,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

struct Inner {
    catalog: CatalogClient,
    cache: DashMap<String, MarketMetadata>,
    cache_ttl_secs: i64,
    sync_interval: Duration,
}

/// Background service keeping the market catalog cache warm.
///
/// Mirrors the reference workspace's readiness-flag broadcast pattern: state
/// transitions are published on a `watch` channel rather than delivered via
/// registered callbacks, which is the idiomatic Rust analogue of the
/// upstream `on_state_change`/`on_sync_complete` callback pair.
pub struct MetadataSync {
    inner: Arc<Inner>,
    state_tx: watch::Sender<SyncState>,
    state_rx: watch::Receiver<SyncState>,
    stats: Arc<Mutex<SyncStats>>,
    task: Option<JoinHandle<()>>,
}

impl MetadataSync {
    pub fn new(catalog: CatalogClient) -> Self {
        Self::with_intervals(catalog, DEFAULT_SYNC_INTERVAL, DEFAULT_CACHE_TTL)
    }

    pub fn with_intervals(catalog: CatalogClient, sync_interval: Duration, cache_ttl: Duration) -> Self {
        let (state_tx, state_rx) = watch::channel(SyncState::Stopped);
        Self {
            inner: Arc::new(Inner {
                catalog,
                cache: DashMap::new(),
                cache_ttl_secs: cache_ttl.as_secs() as i64,
                sync_interval,
            }),
            state_tx,
            state_rx,
            stats: Arc::new(Mutex::new(SyncStats::default())),
            task: None,
        }
    }

    pub fn state(&self) -> SyncState {
        *self.state_rx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SyncState> {
        self.state_rx.clone()
    }

    pub fn stats(&self) -> SyncStats {
        self.stats.lock().clone()
    }

    fn set_state(&self, state: SyncState) {
        let _ = self.state_tx.send(state);
    }

    /// Perform the initial synchronous sync, then spawn the periodic
    /// background loop. Failure of the initial sync fails the whole start.
    pub async fn start(&mut self) -> Result<()> {
        if self.state() != SyncState::Stopped {
            return Err(MetadataError::AlreadyRunning(self.state()));
        }

        self.set_state(SyncState::Starting);

        if let Err(e) = sync_all(&self.inner, &self.stats).await {
            self.set_state(SyncState::Error);
            return Err(MetadataError::InitialSyncFailed(e.to_string()));
        }

        self.set_state(SyncState::Idle);
        info!("market metadata sync started");

        let inner = self.inner.clone();
        let stats = self.stats.clone();
        let state_tx = self.state_tx.clone();
        self.task = Some(tokio::spawn(async move {
            sync_loop(inner, stats, state_tx).await;
        }));

        Ok(())
    }

    pub async fn stop(&mut self) {
        if self.state() == SyncState::Stopped {
            return;
        }
        self.set_state(SyncState::Stopping);
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
        self.set_state(SyncState::Stopped);
        info!("market metadata sync stopped");
    }

    /// Cache-first lookup, falling back to a single REST fetch on miss.
    pub async fn get(&self, condition_id: &str) -> Option<MarketMetadata> {
        if let Some(entry) = self.inner.cache.get(condition_id) {
            if !entry.is_expired(self.inner.cache_ttl_secs) {
                return Some(entry.clone());
            }
        }

        match self.inner.catalog.fetch_market(condition_id).await {
            Ok(Some(metadata)) => {
                self.inner.cache.insert(condition_id.to_string(), metadata.clone());
                Some(metadata)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(condition_id, error = %e, "failed to fetch market");
                None
            }
        }
    }

    pub async fn force_sync(&self) -> Result<()> {
        sync_all(&self.inner, &self.stats).await
    }
}

async fn sync_all(inner: &Arc<Inner>, stats: &Arc<Mutex<SyncStats>>) -> Result<()> {
    stats.lock().total_syncs += 1;

    let markets = inner.catalog.fetch_markets(true).await;
    let markets = match markets {
        Ok(m) => m,
        Err(e) => {
            let mut s = stats.lock();
            s.failed_syncs += 1;
            s.last_error = Some(e.to_string());
            return Err(e);
        }
    };

    let cached_count = markets.len();
    for market in markets {
        inner.cache.insert(market.condition_id.clone(), market);
    }

    let mut s = stats.lock();
    s.successful_syncs += 1;
    s.markets_cached = cached_count;
    s.last_sync_time = Some(Utc::now());
    s.last_error = None;

    info!(count = cached_count, "synced market catalog");
    Ok(())
}

async fn sync_loop(
    inner: Arc<Inner>,
    stats: Arc<Mutex<SyncStats>>,
    state_tx: watch::Sender<SyncState>,
) {
    let mut interval = tokio::time::interval(inner.sync_interval);
    interval.tick().await; // consume the immediate first tick

    loop {
        interval.tick().await;
        let _ = state_tx.send(SyncState::Syncing);
        if let Err(e) = sync_all(&inner, &stats).await {
            error!(error = %e, "periodic market sync failed");
            let _ = state_tx.send(SyncState::Error);
        } else {
            let _ = state_tx.send(SyncState::Idle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_stopped() {
        let catalog = CatalogClient::new("http://localhost:9").unwrap();
        let sync = MetadataSync::new(catalog);
        assert_eq!(sync.state(), SyncState::Stopped);
    }

    #[tokio::test]
    async fn cache_miss_on_empty_sync_returns_none() {
        let catalog = CatalogClient::new("http://localhost:9").unwrap();
        let sync = MetadataSync::new(catalog);
        assert!(sync.get("0xdoesnotexist").await.is_none());
    }
}
