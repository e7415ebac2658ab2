use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("initial sync failed: {0}")]
    InitialSyncFailed(String),

    #[error("http request failed: {0}")]
    Http(String),

    #[error("unexpected response shape: {0}")]
    BadResponse(String),

    #[error("already running, current state is {0:?}")]
    AlreadyRunning(crate::sync::SyncState),
}

pub type Result<T> = std::result::Result<T, MetadataError>;
