use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("wallet profiling failed: {0}")]
    Profiler(#[from] tw_profiler::ProfilerError),
}

pub type Result<T> = std::result::Result<T, DetectorError>;
