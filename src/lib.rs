pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod pricefeed;
pub mod stream;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{Decimal, Mint, Side, TimeMs, Trade, UserId};
pub use engine::{Lot, Position, RealizedPnl};
pub use error::{AppError, LedgerError};
pub use ledger::{CancelFlag, KeyLocks, LedgerService, RebuildEngine, RebuildReport};
pub use pricefeed::{HttpPriceFeed, MockPriceFeed, PriceFeed, PriceFeedError, PriceTick};
pub use stream::PnlBroadcaster;
