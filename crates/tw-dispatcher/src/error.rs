use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatcherError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, DispatcherError>;
