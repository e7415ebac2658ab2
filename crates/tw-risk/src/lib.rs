pub mod error;
pub mod scorer;

pub use error::{Result, RiskError};
pub use scorer::{
    RiskScorer, SignalBundle, DEFAULT_ALERT_THRESHOLD, DEFAULT_DEDUP_WINDOW_SECONDS, DEFAULT_KEY_PREFIX,
    MULTI_SIGNAL_BONUS_2, MULTI_SIGNAL_BONUS_3,
};
