//! Position aggregation: derive `{qty, cost_basis}` from a lot set.
//!
//! Pure functions over lots, with no hidden state, so the Position invariant
//! can be re-checked independently at any time.

use crate::domain::{Mint, UserId};
use crate::error::LedgerError;

use super::{Lot, Position};

/// Recompute the Position for a (user, mint) from its lots.
///
/// `qty` is the sum of `qty_remaining`; `cost_basis` the sum of each lot's
/// remaining cost. Lots belonging to other keys must not be passed in.
pub fn aggregate_position(user: &UserId, mint: &Mint, lots: &[Lot]) -> Position {
    let mut position = Position::flat(user.clone(), mint.clone());
    for lot in lots {
        position.qty = position.qty + lot.qty_remaining;
        position.cost_basis = position.cost_basis + lot.remaining_cost();
    }
    position
}

/// Check a stored Position against its lot set.
///
/// # Errors
/// Returns `Corruption` when either derived sum disagrees with the stored
/// value. This is never silently repaired on the hot path; a rebuild is the
/// sanctioned fix.
pub fn verify_consistency(stored: &Position, lots: &[Lot]) -> Result<(), LedgerError> {
    let derived = aggregate_position(&stored.user, &stored.mint, lots);

    if derived.qty != stored.qty {
        return Err(LedgerError::Corruption(format!(
            "position qty {} disagrees with lot sum {} for user={} mint={}",
            stored.qty, derived.qty, stored.user, stored.mint
        )));
    }
    if derived.cost_basis != stored.cost_basis {
        return Err(LedgerError::Corruption(format!(
            "position cost basis {} disagrees with lot sum {} for user={} mint={}",
            stored.cost_basis, derived.cost_basis, stored.user, stored.mint
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Decimal, TimeMs};

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn lot(id: i64, qty_remaining: &str, unit_cost: &str) -> Lot {
        Lot {
            id,
            user: UserId::new("user-1".to_string()),
            mint: Mint::new("BONK".to_string()),
            qty_remaining: d(qty_remaining),
            unit_cost: d(unit_cost),
            created_at: TimeMs::new(id * 1000),
        }
    }

    #[test]
    fn test_aggregate_sums_lots() {
        let user = UserId::new("user-1".to_string());
        let mint = Mint::new("BONK".to_string());
        let lots = vec![lot(1, "10", "1"), lot(2, "5", "2")];

        let position = aggregate_position(&user, &mint, &lots);
        assert_eq!(position.qty, d("15"));
        assert_eq!(position.cost_basis, d("20"));
    }

    #[test]
    fn test_aggregate_empty_lots_is_flat() {
        let user = UserId::new("user-1".to_string());
        let mint = Mint::new("BONK".to_string());

        let position = aggregate_position(&user, &mint, &[]);
        assert!(position.is_flat());
        assert_eq!(position.cost_basis, Decimal::zero());
    }

    #[test]
    fn test_exhausted_lots_contribute_nothing() {
        let user = UserId::new("user-1".to_string());
        let mint = Mint::new("BONK".to_string());
        let lots = vec![lot(1, "0", "100"), lot(2, "3", "2")];

        let position = aggregate_position(&user, &mint, &lots);
        assert_eq!(position.qty, d("3"));
        assert_eq!(position.cost_basis, d("6"));
    }

    #[test]
    fn test_verify_consistency_accepts_matching_state() {
        let user = UserId::new("user-1".to_string());
        let mint = Mint::new("BONK".to_string());
        let lots = vec![lot(1, "10", "1")];
        let position = aggregate_position(&user, &mint, &lots);

        assert!(verify_consistency(&position, &lots).is_ok());
    }

    #[test]
    fn test_verify_consistency_flags_divergence() {
        let user = UserId::new("user-1".to_string());
        let mint = Mint::new("BONK".to_string());
        let lots = vec![lot(1, "10", "1")];
        let mut position = aggregate_position(&user, &mint, &lots);
        position.qty = d("11");

        let err = verify_consistency(&position, &lots).unwrap_err();
        assert!(matches!(err, LedgerError::Corruption(_)));
    }
}
