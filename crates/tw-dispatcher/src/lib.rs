pub mod channel;
pub mod discord;
pub mod dispatcher;
pub mod dry_run;
pub mod error;
pub mod telegram;

pub use channel::{AlertChannel, BoxFuture, RateLimiter};
pub use discord::DiscordChannel;
pub use dispatcher::{AlertDispatcher, CircuitBreakerState, DispatchResult};
pub use dry_run::DryRunChannel;
pub use error::{DispatcherError, Result};
pub use telegram::TelegramChannel;
