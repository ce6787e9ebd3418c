//! Streaming fan-out of computed PnL to subscribers.

pub mod live_pnl;

pub use live_pnl::PnlBroadcaster;
