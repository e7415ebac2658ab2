//! Pipeline Supervisor: wires the trade stream, event bus, detector and
//! profiler-refresh consumer groups, the alert path, and the health HTTP
//! surface, and drains everything on a cancellation signal.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use tw_bus::{EventBus, DEFAULT_BLOCK_MS, DEFAULT_COUNT, DEFAULT_MAX_LEN, DEFAULT_STREAM_NAME};
use tw_chain::{ChainClient, ChainClientConfig, EntityRegistry};
use tw_core::{SniperClusterSignal, TradeEvent};
use tw_detector::{FreshWalletDetector, SizeAnomalyDetector, SniperDetector};
use tw_dispatcher::{AlertChannel, AlertDispatcher, DiscordChannel, DryRunChannel, TelegramChannel};
use tw_formatter::AlertFormatter;
use tw_health::AppState as HealthState;
use tw_persistence::{AlertHistory, JsonLinesHistory};
use tw_profiler::funding::DEFAULT_MAX_HOPS;
use tw_profiler::{FundingTracer, WalletAnalyzer};
use tw_risk::{RiskScorer, SignalBundle};
use tw_stream::{StreamConfig, TradeStream};
use tw_telemetry::{HealthMonitor, Metrics};

use crate::config::Settings;
use crate::error::AppError;

const DETECTORS_GROUP: &str = "detectors";
const PROFILER_REFRESH_GROUP: &str = "profiler-refresh";
const DETECTORS_CONSUMER: &str = "detectors-0";
const PROFILER_CONSUMER: &str = "profiler-refresh-0";
const ALERT_HISTORY_DIR: &str = "data/alerts";
const SNIPER_CLUSTER_INTERVAL: Duration = Duration::from_secs(60);
const SUSPICIOUSNESS_ALERT_THRESHOLD: f64 = 0.7;

fn build_chain_client(settings: &Settings) -> Result<ChainClient, AppError> {
    let mut config = ChainClientConfig::new(settings.polygon.rpc_url.clone());
    if let Some(fallback) = &settings.polygon.fallback_rpc_url {
        config = config.with_fallback(fallback.clone());
    }
    ChainClient::new(config).map_err(|e| AppError::Startup(anyhow::anyhow!(e)))
}

fn build_channels(settings: &Settings) -> Vec<Box<dyn AlertChannel>> {
    if settings.dry_run {
        return vec![Box::new(DryRunChannel::default())];
    }

    let mut channels: Vec<Box<dyn AlertChannel>> = Vec::new();
    if let Some(webhook_url) = &settings.discord.webhook_url {
        channels.push(Box::new(DiscordChannel::new(webhook_url.clone())));
    }
    if settings.telegram.enabled() {
        channels.push(Box::new(TelegramChannel::new(
            settings.telegram.bot_token.clone().unwrap_or_default(),
            settings.telegram.chat_id.clone().unwrap_or_default(),
        )));
    }
    if channels.is_empty() {
        warn!("no alert channels configured; alerts will be computed but never delivered");
    }
    channels
}

/// Tracks, per wallet, the most recent sniper-cluster signal the periodic
/// clustering sweep produced, so the per-trade scoring path can attach it
/// without re-running DBSCAN inline.
type SniperSignalCache = Arc<Mutex<HashMap<String, SniperClusterSignal>>>;

/// Owns every long-lived pipeline component and drives them to completion.
pub struct Supervisor {
    settings: Settings,
    health: Arc<HealthMonitor>,
}

impl Supervisor {
    pub fn new(settings: Settings) -> Self {
        Self { settings, health: Arc::new(HealthMonitor::default()) }
    }

    pub async fn run(self, shutdown: CancellationToken) -> Result<(), AppError> {
        info!(summary = %self.settings.redacted_summary(), "starting pipeline supervisor");

        let health_handle = self.spawn_health_server(shutdown.clone());

        let bus = Arc::new(
            EventBus::connect(&self.settings.redis.url, DEFAULT_STREAM_NAME, DEFAULT_MAX_LEN)
                .await
                .map_err(|e| AppError::Startup(anyhow::anyhow!(e)))?,
        );
        bus.ensure_group(DETECTORS_GROUP, "0").await.map_err(|e| AppError::Startup(anyhow::anyhow!(e)))?;
        bus.ensure_group(PROFILER_REFRESH_GROUP, "0").await.map_err(|e| AppError::Startup(anyhow::anyhow!(e)))?;

        let (trade_tx, trade_rx) = mpsc::channel::<TradeEvent>(1000);
        self.health.register_stream("trades");

        let stream_config = StreamConfig { url: self.settings.polymarket.ws_url.clone(), ..StreamConfig::default() };
        let trade_stream = Arc::new(TradeStream::new(stream_config, trade_tx));
        let stream_handle = {
            let trade_stream = trade_stream.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                tokio::select! {
                    result = trade_stream.run() => {
                        if let Err(e) = result {
                            error!(error = %e, "trade stream exited");
                        }
                    }
                    _ = shutdown.cancelled() => {
                        info!("trade stream stopping on shutdown");
                    }
                }
            })
        };

        let publisher_handle = self.spawn_publisher(bus.clone(), trade_rx, shutdown.clone());

        let risk_scorer = Arc::new(
            RiskScorer::connect(&self.settings.redis.url)
                .await
                .map_err(|e| AppError::Startup(anyhow::anyhow!(e)))?,
        );
        let history: Arc<dyn AlertHistory> = Arc::new(
            JsonLinesHistory::open(ALERT_HISTORY_DIR).map_err(|e| AppError::Startup(anyhow::anyhow!(e)))?,
        );
        let dispatcher = Arc::new(AlertDispatcher::new(build_channels(&self.settings)));

        let detectors_handle = self.spawn_detectors_stage(
            bus.clone(),
            risk_scorer,
            dispatcher,
            history,
            shutdown.clone(),
        )?;
        let profiler_handle = self.spawn_profiler_refresh_stage(bus.clone(), shutdown.clone())?;

        shutdown.cancelled().await;
        info!("shutdown signal observed, draining pipeline stages");

        for handle in [stream_handle, publisher_handle, detectors_handle, profiler_handle, health_handle] {
            let _ = handle.await;
        }

        info!("pipeline supervisor stopped");
        Ok(())
    }

    fn spawn_health_server(&self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        let state = HealthState::new(self.health.clone());
        let port = self.settings.health_port;
        tokio::spawn(async move {
            tokio::select! {
                result = tw_health::run_server(state, port) => {
                    if let Err(e) = result {
                        error!(error = %e, "health server exited");
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("health server stopping on shutdown");
                }
            }
        })
    }

    fn spawn_publisher(
        &self,
        bus: Arc<EventBus>,
        mut trade_rx: mpsc::Receiver<TradeEvent>,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let health = self.health.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    maybe_event = trade_rx.recv() => {
                        let Some(event) = maybe_event else { break };
                        health.record_event("trades", None);
                        if event.timestamp_was_fallback {
                            Metrics::trade_timestamp_fallback();
                        }
                        if let Err(e) = bus.publish(&event).await {
                            error!(error = %e, "failed to publish trade event to bus");
                        }
                    }
                    _ = shutdown.cancelled() => break,
                }
            }
            info!("trade publisher stopped");
        })
    }

    fn spawn_detectors_stage(
        &self,
        bus: Arc<EventBus>,
        risk_scorer: Arc<RiskScorer>,
        dispatcher: Arc<AlertDispatcher>,
        history: Arc<dyn AlertHistory>,
        shutdown: CancellationToken,
    ) -> Result<tokio::task::JoinHandle<()>, AppError> {
        let fresh_wallet_detector =
            Arc::new(FreshWalletDetector::new(WalletAnalyzer::new(build_chain_client(&self.settings)?)));
        let size_anomaly_detector = Arc::new(SizeAnomalyDetector::new());
        let sniper_detector = Arc::new(SniperDetector::new());
        let formatter = Arc::new(AlertFormatter::default());
        let market_first_seen: Arc<Mutex<HashMap<String, DateTime<Utc>>>> = Arc::new(Mutex::new(HashMap::new()));
        let sniper_signals: SniperSignalCache = Arc::new(Mutex::new(HashMap::new()));

        self.spawn_sniper_clustering(sniper_detector.clone(), sniper_signals.clone(), shutdown.clone());

        Ok(tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = bus.read(DETECTORS_GROUP, DETECTORS_CONSUMER, DEFAULT_COUNT, DEFAULT_BLOCK_MS) => {
                        let entries = match result {
                            Ok(entries) => entries,
                            Err(e) => {
                                error!(error = %e, "detectors stage failed to read from bus");
                                continue;
                            }
                        };
                        for entry in entries {
                            let trade = entry.event.clone();
                            let market_created_at = {
                                let mut seen = market_first_seen.lock();
                                *seen.entry(trade.market_id.clone()).or_insert(trade.timestamp)
                            };
                            sniper_detector.record_entry(
                                &trade.wallet_address,
                                &trade.market_id,
                                trade.timestamp,
                                market_created_at,
                                trade.size.inner(),
                            );

                            let mut bundle = SignalBundle::new(trade.clone());
                            bundle.fresh_wallet_signal = fresh_wallet_detector.evaluate(&trade).await;
                            bundle.size_anomaly_signal = size_anomaly_detector.evaluate(&trade, None, None, None);
                            bundle.sniper_cluster_signal =
                                sniper_signals.lock().get(&trade.wallet_address.to_lowercase()).cloned();

                            if bundle.fresh_wallet_signal.is_some() {
                                Metrics::detector_signal("fresh_wallet");
                            }
                            if bundle.size_anomaly_signal.is_some() {
                                Metrics::detector_signal("size_anomaly");
                            }
                            if bundle.sniper_cluster_signal.is_some() {
                                Metrics::detector_signal("sniper_cluster");
                            }

                            let assessment = match risk_scorer.assess(bundle).await {
                                Ok(assessment) => assessment,
                                Err(e) => {
                                    error!(error = %e, "risk scorer failed");
                                    continue;
                                }
                            };

                            if assessment.should_alert {
                                let alert = formatter.format(&assessment);
                                let dispatch_result = dispatcher.dispatch(&alert).await;
                                let channels_attempted: Vec<String> =
                                    dispatch_result.channel_results.keys().cloned().collect();
                                let channels_succeeded: Vec<String> = dispatch_result
                                    .channel_results
                                    .iter()
                                    .filter_map(|(name, ok)| ok.then(|| name.clone()))
                                    .collect();
                                for (name, ok) in &dispatch_result.channel_results {
                                    Metrics::alert_dispatched(name, *ok);
                                }

                                let record = tw_core::AlertRecord {
                                    assessment_id: assessment.assessment_id.clone(),
                                    wallet_address: assessment.wallet_address.clone(),
                                    market_id: assessment.market_id.clone(),
                                    weighted_score: assessment.weighted_score,
                                    signals_triggered: assessment.signals_triggered,
                                    channels_attempted,
                                    channels_succeeded,
                                    dedup_key: format!("{}:{}", assessment.wallet_address, assessment.market_id),
                                    user_feedback: None,
                                    created_at: assessment.timestamp,
                                };
                                if let Err(e) = history.record(record) {
                                    error!(error = %e, "failed to persist alert record");
                                }
                            } else {
                                Metrics::dedup_hit();
                            }

                            if let Err(e) = bus.ack(DETECTORS_GROUP, &[entry.entry_id.clone()]).await {
                                warn!(error = %e, entry_id = %entry.entry_id, "failed to ack detectors entry");
                            }
                        }
                    }
                    _ = shutdown.cancelled() => break,
                }
            }
            info!("detectors stage stopped");
        }))
    }

    fn spawn_sniper_clustering(
        &self,
        sniper_detector: Arc<SniperDetector>,
        sniper_signals: SniperSignalCache,
        shutdown: CancellationToken,
    ) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SNIPER_CLUSTER_INTERVAL);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let detector = sniper_detector.clone();
                        let signals = match tokio::task::spawn_blocking(move || detector.run_clustering()).await {
                            Ok(signals) => signals,
                            Err(e) => {
                                error!(error = %e, "sniper clustering task panicked");
                                continue;
                            }
                        };
                        if !signals.is_empty() {
                            info!(count = signals.len(), "sniper clustering produced new signals");
                            let mut cache = sniper_signals.lock();
                            for signal in signals {
                                cache.insert(signal.wallet_address.to_lowercase(), signal);
                            }
                        }
                    }
                    _ = shutdown.cancelled() => break,
                }
            }
        });
    }

    fn spawn_profiler_refresh_stage(
        &self,
        bus: Arc<EventBus>,
        shutdown: CancellationToken,
    ) -> Result<tokio::task::JoinHandle<()>, AppError> {
        let entity_registry = EntityRegistry::new();
        let funding_tracer = FundingTracer::new(build_chain_client(&self.settings)?, entity_registry);

        Ok(tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = bus.read(PROFILER_REFRESH_GROUP, PROFILER_CONSUMER, DEFAULT_COUNT, DEFAULT_BLOCK_MS) => {
                        let entries = match result {
                            Ok(entries) => entries,
                            Err(e) => {
                                error!(error = %e, "profiler-refresh stage failed to read from bus");
                                continue;
                            }
                        };
                        for entry in entries {
                            let chain = funding_tracer.trace(&entry.event.wallet_address).await;
                            let score = chain.suspiciousness_score(DEFAULT_MAX_HOPS);
                            if score >= SUSPICIOUSNESS_ALERT_THRESHOLD {
                                info!(
                                    wallet = %entry.event.wallet_address,
                                    score,
                                    hops = chain.hop_count,
                                    "refreshed funding chain shows elevated suspiciousness"
                                );
                            }
                            if let Err(e) = bus.ack(PROFILER_REFRESH_GROUP, &[entry.entry_id.clone()]).await {
                                warn!(error = %e, entry_id = %entry.entry_id, "failed to ack profiler-refresh entry");
                            }
                        }
                    }
                    _ = shutdown.cancelled() => break,
                }
            }
            info!("profiler-refresh stage stopped");
        }))
    }
}
