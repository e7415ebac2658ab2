//! Chain client error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("rpc call {method} failed after all retries: {source}")]
    RpcFailed {
        method: String,
        #[source]
        source: Box<ChainError>,
    },

    #[error("http request failed: {0}")]
    Http(String),

    #[error("rpc error response: {0}")]
    RpcResponse(String),

    #[error("unexpected response shape for {0}")]
    BadResponse(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

pub type Result<T> = std::result::Result<T, ChainError>;
