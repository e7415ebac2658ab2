pub mod error;
pub mod history;
pub mod index;
pub mod writer;

pub use error::{PersistenceError, Result};
pub use history::{AlertHistory, JsonLinesHistory};
pub use index::AlertIndex;
pub use writer::JsonLinesWriter;
