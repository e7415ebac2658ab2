//! Event bus error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("failed to deserialize entry {entry_id}: {reason}")]
    Deserialize { entry_id: String, reason: String },

    #[error("consumer group {0} already exists")]
    GroupExists(String),
}

pub type Result<T> = std::result::Result<T, BusError>;
