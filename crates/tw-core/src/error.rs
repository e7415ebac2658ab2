use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid price: {0}")]
    InvalidPrice(String),
    #[error("invalid size: {0}")]
    InvalidSize(String),
    #[error("invalid wallet address: {0}")]
    InvalidAddress(String),
    #[error("invalid trade event: {0}")]
    InvalidTradeEvent(String),
    #[error("decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
