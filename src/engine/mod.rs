//! Pure computation engine(s) for deterministic ledger logic.

use crate::domain::{Decimal, Mint, TimeMs, UserId};
use crate::error::LedgerError;
use serde::{Deserialize, Serialize};

pub mod aggregator;
pub mod lot_book;
pub mod unrealized;

pub use aggregator::{aggregate_position, verify_consistency};
pub use lot_book::LotBook;
pub use unrealized::{mark_position, PnlUpdate};

/// A cost lot: a batch of acquired quantity at a fixed unit cost.
///
/// Created exactly once per buy; `qty_remaining` only ever decreases, and only
/// inside [`LotBook::apply_sell`]. A fully consumed lot is retained for audit
/// until a rebuild purges it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    /// Ledger-assigned id, ascending in creation order within (user, mint).
    pub id: i64,
    pub user: UserId,
    pub mint: Mint,
    /// Unconsumed quantity. Never negative.
    pub qty_remaining: Decimal,
    /// Acquisition price per unit. Fixed at creation.
    pub unit_cost: Decimal,
    pub created_at: TimeMs,
}

impl Lot {
    /// Remaining cost carried by this lot, quantized at the money scale.
    pub fn remaining_cost(&self) -> Decimal {
        (self.qty_remaining * self.unit_cost).quantize()
    }

    pub fn is_exhausted(&self) -> bool {
        self.qty_remaining.is_zero()
    }
}

/// Derived holdings for a (user, mint): always recomputable from the lot set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub user: UserId,
    pub mint: Mint,
    /// Sum of qty_remaining over all lots.
    pub qty: Decimal,
    /// Sum of qty_remaining * unit_cost over all lots.
    pub cost_basis: Decimal,
}

impl Position {
    /// A flat position holding nothing.
    pub fn flat(user: UserId, mint: Mint) -> Self {
        Position {
            user,
            mint,
            qty: Decimal::zero(),
            cost_basis: Decimal::zero(),
        }
    }

    pub fn is_flat(&self) -> bool {
        self.qty.is_zero()
    }

    /// Average acquisition cost per held unit.
    ///
    /// # Errors
    /// `DivisionByZero` for a flat position, where average cost is undefined.
    pub fn avg_cost(&self) -> Result<Decimal, LedgerError> {
        self.cost_basis
            .checked_div(self.qty)
            .map(|v| v.quantize())
            .ok_or(LedgerError::DivisionByZero)
    }
}

/// Immutable record of the profit locked in by one sell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealizedPnl {
    pub user: UserId,
    pub mint: Mint,
    /// Key of the sell trade this entry was produced by.
    pub trade_key: String,
    pub qty_consumed: Decimal,
    pub cost_consumed: Decimal,
    pub proceeds: Decimal,
    /// proceeds - cost_consumed. Negative on a losing sell; never clamped.
    pub realized_pnl: Decimal,
    pub occurred_at: TimeMs,
}

/// One lot's share of a sell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotConsumption {
    pub lot_id: i64,
    /// Quantity taken from this lot.
    pub qty: Decimal,
    pub unit_cost: Decimal,
    /// qty * unit_cost, quantized.
    pub cost: Decimal,
}

/// Result of consuming lots for a sell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellOutcome {
    /// Total cost consumed across all touched lots.
    pub consumed_cost: Decimal,
    /// Touched lots in consumption (FIFO) order.
    pub consumptions: Vec<LotConsumption>,
}
