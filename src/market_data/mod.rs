pub mod candle;
pub mod fugle;
pub mod orderbook;
pub mod price_volume;
pub mod quote;
pub mod rate_limit;
pub mod source;
pub mod trade_tape;

// Re-export the data types for convenient access (e.g. `use crate::market_data::Candle`).
pub use candle::{Candle, PriceColumns};
pub use fugle::FugleClient;
pub use orderbook::{BookLevel, OrderBookSnapshot};
pub use price_volume::PriceVolume;
pub use quote::{Quote, SnapshotRow};
pub use rate_limit::RequestBudget;
pub use source::MarketDataSource;
pub use trade_tape::{TickHint, TradePrint};
