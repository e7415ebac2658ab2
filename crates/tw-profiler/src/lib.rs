pub mod analyzer;
pub mod error;
pub mod funding;

pub use analyzer::WalletAnalyzer;
pub use error::{ProfilerError, Result};
pub use funding::FundingTracer;
