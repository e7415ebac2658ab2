pub mod error;
pub mod stream;

pub use error::{BusError, Result};
pub use stream::{EventBus, GroupInfo, StreamEntry, DEFAULT_BLOCK_MS, DEFAULT_COUNT, DEFAULT_MAX_LEN, DEFAULT_STREAM_NAME};
