//! Mark-to-market: unrealized PnL over a Position at a live price.
//!
//! Pure and re-entrant; called once per price tick per subscribed position
//! without touching persisted state.

use crate::domain::{Decimal, Mint, TimeMs, UserId};
use serde::Serialize;

use super::Position;

/// Display floor for percentage PnL. Presentation policy only: keeps a
/// near-zero cost basis from rendering as an absurd loss. Ledger figures are
/// never clamped.
const PERCENT_FLOOR: &str = "-99.9";
/// Display ceiling for percentage PnL, same policy as the floor.
const PERCENT_CEILING: &str = "99999.9";

/// One unrealized-PnL observation for a subscribed (user, mint).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PnlUpdate {
    pub user: UserId,
    pub mint: Mint,
    /// Market price the figures were computed at.
    pub price: Decimal,
    /// cost_basis / qty. None when the position is flat.
    pub avg_cost: Option<Decimal>,
    pub current_value: Decimal,
    pub unrealized_pnl: Decimal,
    /// Percentage PnL, clamped for display. None when cost basis is zero.
    pub unrealized_pnl_percent: Option<Decimal>,
    pub time_ms: TimeMs,
}

/// Compute unrealized PnL for a position at a price.
///
/// Total: a flat position yields a zeroed update with undefined ratios rather
/// than an error.
pub fn mark_position(position: &Position, price: Decimal, at: TimeMs) -> PnlUpdate {
    let avg_cost = position.avg_cost().ok();

    let current_value = (position.qty * price).quantize();
    let unrealized_pnl = current_value - position.cost_basis;

    let unrealized_pnl_percent = unrealized_pnl
        .checked_div(position.cost_basis)
        .map(|ratio| clamp_percent_for_display((ratio * Decimal::hundred()).quantize()));

    PnlUpdate {
        user: position.user.clone(),
        mint: position.mint.clone(),
        price,
        avg_cost,
        current_value,
        unrealized_pnl,
        unrealized_pnl_percent,
        time_ms: at,
    }
}

fn clamp_percent_for_display(pct: Decimal) -> Decimal {
    let floor = Decimal::from_str_canonical(PERCENT_FLOOR).expect("valid decimal literal");
    let ceiling = Decimal::from_str_canonical(PERCENT_CEILING).expect("valid decimal literal");
    if pct < floor {
        floor
    } else if pct > ceiling {
        ceiling
    } else {
        pct
    }
}
