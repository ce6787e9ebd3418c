//! Stable trade ordering for deterministic replay.
//!
//! The trade log's chronological order is the FIFO contract: lots are created
//! and consumed in exactly this order. Ties on `occurred_at` are broken by the
//! writer-assigned external id, then by the stable trade key.

use crate::domain::Trade;

/// Stable ordering key for trades.
///
/// Ordering: occurred_at -> external_id -> trade_key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TradeOrderingKey {
    /// Execution time in milliseconds (primary sort).
    pub occurred_at: i64,
    /// Writer-assigned id (secondary sort, if present).
    pub external_id: Option<i64>,
    /// Stable trade key (fallback sort).
    pub trade_key: String,
}

impl TradeOrderingKey {
    /// Create an ordering key from a Trade.
    pub fn from_trade(trade: &Trade) -> Self {
        TradeOrderingKey {
            occurred_at: trade.occurred_at.as_ms(),
            external_id: trade.external_id,
            trade_key: trade.trade_key().to_string(),
        }
    }

    /// Returns true if trade_a should be replayed before trade_b.
    pub fn should_come_before(trade_a: &Trade, trade_b: &Trade) -> bool {
        Self::from_trade(trade_a) < Self::from_trade(trade_b)
    }
}

/// Sort trades into deterministic replay order.
pub fn sort_trades_deterministic(trades: &mut [Trade]) {
    trades.sort_by(|a, b| {
        let key_a = TradeOrderingKey::from_trade(a);
        let key_b = TradeOrderingKey::from_trade(b);
        key_a.cmp(&key_b)
    });
}
