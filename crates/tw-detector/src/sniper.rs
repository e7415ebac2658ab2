//! Sniper-cluster detector: groups wallets that consistently enter markets
//! within minutes of creation, via a hand-rolled DBSCAN over entry-timing
//! features. Deliberately free of an ML dependency — clustering only needs
//! Euclidean neighborhoods over a handful of points per run, and runs on a
//! blocking worker since it's O(n^2) over accumulated entries.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tw_core::SniperClusterSignal;
use uuid::Uuid;

pub const DEFAULT_ENTRY_THRESHOLD_SECONDS: f64 = 300.0;
pub const DEFAULT_MIN_CLUSTER_SIZE: usize = 3;
pub const DEFAULT_EPS: f64 = 0.5;
pub const DEFAULT_MIN_SAMPLES: usize = 2;
pub const DEFAULT_MIN_ENTRIES_PER_WALLET: usize = 2;

#[derive(Debug, Clone)]
pub struct MarketEntry {
    pub wallet_address: String,
    pub market_id: String,
    pub entry_delta_seconds: f64,
    pub position_size: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ClusterInfo {
    pub cluster_id: String,
    pub wallet_addresses: HashSet<String>,
    pub avg_entry_delta: f64,
    pub markets_in_common: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    entries: Vec<MarketEntry>,
    wallet_entries: HashMap<String, Vec<MarketEntry>>,
    known_clusters: HashMap<String, ClusterInfo>,
    wallet_cluster_map: HashMap<String, String>,
    signaled_wallets: HashSet<String>,
}

pub struct SniperDetector {
    entry_threshold_seconds: f64,
    min_cluster_size: usize,
    eps: f64,
    min_samples: usize,
    min_entries_per_wallet: usize,
    state: Mutex<State>,
}

impl Default for SniperDetector {
    fn default() -> Self {
        Self {
            entry_threshold_seconds: DEFAULT_ENTRY_THRESHOLD_SECONDS,
            min_cluster_size: DEFAULT_MIN_CLUSTER_SIZE,
            eps: DEFAULT_EPS,
            min_samples: DEFAULT_MIN_SAMPLES,
            min_entries_per_wallet: DEFAULT_MIN_ENTRIES_PER_WALLET,
            state: Mutex::new(State::default()),
        }
    }
}

impl SniperDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a market entry, if it falls within the sniper window. Entries
    /// before market creation or past the threshold are dropped silently.
    pub fn record_entry(
        &self,
        wallet_address: &str,
        market_id: &str,
        entry_time: DateTime<Utc>,
        market_created_at: DateTime<Utc>,
        position_size: Decimal,
    ) {
        let delta = (entry_time - market_created_at).num_milliseconds() as f64 / 1000.0;
        if delta < 0.0 || delta > self.entry_threshold_seconds {
            return;
        }

        let entry = MarketEntry {
            wallet_address: wallet_address.to_lowercase(),
            market_id: market_id.to_string(),
            entry_delta_seconds: delta,
            position_size,
            timestamp: entry_time,
        };

        let mut state = self.state.lock();
        state
            .wallet_entries
            .entry(entry.wallet_address.clone())
            .or_default()
            .push(entry.clone());
        state.entries.push(entry);
    }

    /// Run DBSCAN over accumulated entries and return signals for newly
    /// detected cluster members. Intended to be invoked via
    /// `tokio::task::spawn_blocking` by the caller, since the clustering
    /// itself is synchronous and O(n^2).
    pub fn run_clustering(&self) -> Vec<SniperClusterSignal> {
        let mut state = self.state.lock();

        let eligible: Vec<String> = state
            .wallet_entries
            .iter()
            .filter(|(_, entries)| entries.len() >= self.min_entries_per_wallet)
            .map(|(wallet, _)| wallet.clone())
            .collect();

        if eligible.len() < self.min_cluster_size {
            return Vec::new();
        }

        let (features, wallet_index) = build_feature_matrix(&state.wallet_entries, &eligible);
        if features.is_empty() {
            return Vec::new();
        }

        let labels = dbscan(&features, self.eps, self.min_samples);

        self.process_clustering_results(&mut state, &labels, &wallet_index)
    }

    fn process_clustering_results(
        &self,
        state: &mut State,
        labels: &[i64],
        wallet_index: &HashMap<usize, String>,
    ) -> Vec<SniperClusterSignal> {
        let mut cluster_rows: HashMap<i64, Vec<usize>> = HashMap::new();
        for (row, &label) in labels.iter().enumerate() {
            if label != -1 {
                cluster_rows.entry(label).or_default().push(row);
            }
        }

        let mut signals = Vec::new();

        for rows in cluster_rows.values() {
            let cluster_wallets: HashSet<String> = rows.iter().map(|r| wallet_index[r].clone()).collect();
            if cluster_wallets.len() < self.min_cluster_size {
                continue;
            }

            let (avg_delta, markets_in_common) = cluster_stats(&state.wallet_entries, &cluster_wallets);
            let cluster_id = get_or_create_cluster_id(&state.wallet_cluster_map, &cluster_wallets);

            state.known_clusters.insert(
                cluster_id.clone(),
                ClusterInfo {
                    cluster_id: cluster_id.clone(),
                    wallet_addresses: cluster_wallets.clone(),
                    avg_entry_delta: avg_delta,
                    markets_in_common,
                    created_at: Utc::now(),
                },
            );

            for wallet in &cluster_wallets {
                state.wallet_cluster_map.insert(wallet.clone(), cluster_id.clone());
            }

            for wallet in &cluster_wallets {
                if state.signaled_wallets.contains(wallet) {
                    continue;
                }
                let confidence =
                    self.calculate_confidence(cluster_wallets.len(), avg_delta, markets_in_common);

                signals.push(SniperClusterSignal {
                    wallet_address: wallet.clone(),
                    cluster_id: cluster_id.clone(),
                    cluster_size: cluster_wallets.len(),
                    avg_entry_delta_seconds: avg_delta,
                    markets_in_common,
                    confidence,
                    timestamp: Utc::now(),
                });
                state.signaled_wallets.insert(wallet.clone());
            }
        }

        signals
    }

    fn calculate_confidence(&self, cluster_size: usize, avg_delta: f64, markets_in_common: usize) -> f64 {
        let size_factor = (cluster_size as f64 / 10.0).min(1.0);
        let speed_factor = (1.0 - avg_delta / self.entry_threshold_seconds).max(0.0);
        let overlap_factor = (markets_in_common as f64 / 5.0).min(1.0);

        let confidence = 0.3 * size_factor + 0.4 * speed_factor + 0.3 * overlap_factor;
        (confidence.min(1.0) * 1000.0).round() / 1000.0
    }

    pub fn is_sniper(&self, wallet_address: &str) -> bool {
        self.state.lock().wallet_cluster_map.contains_key(&wallet_address.to_lowercase())
    }

    pub fn cluster_for_wallet(&self, wallet_address: &str) -> Option<ClusterInfo> {
        let state = self.state.lock();
        let cluster_id = state.wallet_cluster_map.get(&wallet_address.to_lowercase())?;
        state.known_clusters.get(cluster_id).cloned()
    }

    pub fn entry_count(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn wallet_count(&self) -> usize {
        self.state.lock().wallet_entries.len()
    }

    pub fn cluster_count(&self) -> usize {
        self.state.lock().known_clusters.len()
    }

    /// Drop all tracked entries. Cluster membership is left intact so
    /// `is_sniper`/`cluster_for_wallet` keep working across sweeps.
    pub fn clear_entries(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.wallet_entries.clear();
    }
}

fn market_hash(market_id: &str) -> f64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    market_id.hash(&mut hasher);
    (hasher.finish() % 1000) as f64 / 1000.0
}

fn build_feature_matrix(
    wallet_entries: &HashMap<String, Vec<MarketEntry>>,
    wallets: &[String],
) -> (Vec<[f64; 3]>, HashMap<usize, String>) {
    let mut features = Vec::new();
    let mut wallet_index = HashMap::new();
    let mut row = 0;

    for wallet in wallets {
        let Some(entries) = wallet_entries.get(wallet) else {
            continue;
        };
        for entry in entries {
            let hash = market_hash(&entry.market_id);
            let delta_hours = entry.entry_delta_seconds / 3600.0;
            let size_f64: f64 = entry.position_size.to_string().parse().unwrap_or(1.0);
            let log_size = size_f64.max(1.0).log10();

            features.push([hash, delta_hours, log_size]);
            wallet_index.insert(row, wallet.clone());
            row += 1;
        }
    }

    (features, wallet_index)
}

fn euclidean(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

/// Minimal DBSCAN: no spatial index, O(n^2) neighbor queries. Fine for the
/// entry volumes this detector accumulates between sweeps.
fn dbscan(points: &[[f64; 3]], eps: f64, min_samples: usize) -> Vec<i64> {
    let n = points.len();
    let mut labels = vec![-1i64; n];
    let mut visited = vec![false; n];
    let mut next_cluster = 0i64;

    let neighbors = |i: usize| -> Vec<usize> {
        (0..n).filter(|&j| j != i && euclidean(&points[i], &points[j]) <= eps).collect()
    };

    for i in 0..n {
        if visited[i] {
            continue;
        }
        visited[i] = true;

        let mut neighbor_set = neighbors(i);
        if neighbor_set.len() + 1 < min_samples {
            continue;
        }

        labels[i] = next_cluster;
        let mut seed_idx = 0;
        while seed_idx < neighbor_set.len() {
            let j = neighbor_set[seed_idx];
            if !visited[j] {
                visited[j] = true;
                let j_neighbors = neighbors(j);
                if j_neighbors.len() + 1 >= min_samples {
                    for &k in &j_neighbors {
                        if !neighbor_set.contains(&k) {
                            neighbor_set.push(k);
                        }
                    }
                }
            }
            if labels[j] == -1 {
                labels[j] = next_cluster;
            }
            seed_idx += 1;
        }

        next_cluster += 1;
    }

    labels
}

fn cluster_stats(wallet_entries: &HashMap<String, Vec<MarketEntry>>, wallets: &HashSet<String>) -> (f64, usize) {
    let mut all_deltas = Vec::new();
    let mut wallet_markets: Vec<HashSet<String>> = Vec::new();

    for wallet in wallets {
        if let Some(entries) = wallet_entries.get(wallet) {
            all_deltas.extend(entries.iter().map(|e| e.entry_delta_seconds));
            wallet_markets.push(entries.iter().map(|e| e.market_id.clone()).collect());
        }
    }

    let avg_delta = if all_deltas.is_empty() {
        0.0
    } else {
        all_deltas.iter().sum::<f64>() / all_deltas.len() as f64
    };

    let markets_in_common = if wallet_markets.len() >= 2 {
        wallet_markets[1..]
            .iter()
            .fold(wallet_markets[0].clone(), |acc, m| acc.intersection(m).cloned().collect())
            .len()
    } else {
        0
    };

    (avg_delta, markets_in_common)
}

fn get_or_create_cluster_id(wallet_cluster_map: &HashMap<String, String>, wallets: &HashSet<String>) -> String {
    let mut existing: HashMap<String, usize> = HashMap::new();
    for wallet in wallets {
        if let Some(cluster_id) = wallet_cluster_map.get(wallet) {
            *existing.entry(cluster_id.clone()).or_insert(0) += 1;
        }
    }

    if let Some((best, count)) = existing.into_iter().max_by_key(|(_, count)| *count) {
        if count >= wallets.len() / 2 {
            return best;
        }
    }

    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn base_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn entries_outside_window_are_dropped() {
        let detector = SniperDetector::new();
        let created = base_time();
        detector.record_entry("0xa", "0xmkt", created + Duration::seconds(400), created, Decimal::from(100));
        assert_eq!(detector.entry_count(), 0);
    }

    #[test]
    fn coordinated_wallets_form_a_cluster() {
        let detector = SniperDetector::new();
        let created = base_time();

        for wallet in ["0xa", "0xb", "0xc"] {
            for market in ["0xmkt1", "0xmkt2"] {
                detector.record_entry(wallet, market, created + Duration::seconds(5), created, Decimal::from(500));
            }
        }

        let signals = detector.run_clustering();
        assert!(!signals.is_empty());
        assert!(detector.is_sniper("0xa"));
    }

    #[test]
    fn too_few_eligible_wallets_yields_no_signals() {
        let detector = SniperDetector::new();
        let created = base_time();
        detector.record_entry("0xa", "0xmkt1", created + Duration::seconds(5), created, Decimal::from(500));
        detector.record_entry("0xa", "0xmkt2", created + Duration::seconds(5), created, Decimal::from(500));
        assert!(detector.run_clustering().is_empty());
    }
}
