pub mod error;
pub mod fresh_wallet;
pub mod size_anomaly;
pub mod sniper;

pub use error::{DetectorError, Result};
pub use fresh_wallet::{FreshWalletDetector, LARGE_TRADE_THRESHOLD};
pub use size_anomaly::SizeAnomalyDetector;
pub use sniper::SniperDetector;
