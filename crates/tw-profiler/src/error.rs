use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfilerError {
    #[error("chain rpc error: {0}")]
    Chain(#[from] tw_chain::ChainError),
}

pub type Result<T> = std::result::Result<T, ProfilerError>;
