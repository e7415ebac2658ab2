pub mod catalog;
pub mod error;
pub mod sync;

pub use catalog::CatalogClient;
pub use error::{MetadataError, Result};
pub use sync::{MetadataSync, SyncState, SyncStats};
