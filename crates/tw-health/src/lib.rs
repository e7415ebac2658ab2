pub mod server;
pub mod state;

pub use server::{create_router, run_server};
pub use state::AppState;
