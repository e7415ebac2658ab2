pub mod alert;
pub mod decimal;
pub mod error;
pub mod market;
pub mod signal;
pub mod trade;
pub mod wallet;

pub use alert::{AlertRecord, DiscordEmbed, EmbedField, FormattedAlert};
pub use decimal::{Price, Usdc};
pub use error::{CoreError, Result};
pub use market::{MarketCategory, MarketMetadata};
pub use signal::{FreshWalletSignal, RiskAssessment, SizeAnomalySignal, SniperClusterSignal};
pub use trade::{Side, TradeEvent, WireTradePayload};
pub use wallet::{FundingChain, FundingOrigin, FundingTransfer, WalletProfile};
