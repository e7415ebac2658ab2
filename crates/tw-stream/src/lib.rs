pub mod connection;
pub mod error;
pub mod heartbeat;
pub mod message;

pub use connection::{ConnectionState, StreamConfig, StreamStats, TradeStream};
pub use error::{Result, StreamError};
