use thiserror::Error;

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

pub type Result<T> = std::result::Result<T, RiskError>;
