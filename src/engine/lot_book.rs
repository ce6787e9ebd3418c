//! In-memory FIFO lot book for a single (user, mint).
//!
//! This is the single place that decides FIFO tie-breaking and the only code
//! that ever decrements `qty_remaining`. Callers load the persisted lots,
//! apply trades here, and persist the result atomically.

use crate::domain::{Decimal, Mint, TimeMs, UserId};
use crate::error::LedgerError;

use super::{Lot, LotConsumption, SellOutcome};

pub struct LotBook {
    user: UserId,
    mint: Mint,
    /// Sorted ascending by (created_at, id).
    lots: Vec<Lot>,
    next_lot_id: i64,
}

impl LotBook {
    /// An empty book with lot ids starting at 1.
    pub fn new(user: UserId, mint: Mint) -> Self {
        Self {
            user,
            mint,
            lots: Vec::new(),
            next_lot_id: 1,
        }
    }

    /// Build a book from persisted lots.
    ///
    /// Lots are re-sorted into FIFO order; the next lot id continues after the
    /// highest id seen so that ids stay ascending in creation order.
    pub fn from_lots(user: UserId, mint: Mint, mut lots: Vec<Lot>) -> Self {
        lots.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        let next_lot_id = lots.iter().map(|l| l.id).max().unwrap_or(0) + 1;
        Self {
            user,
            mint,
            lots,
            next_lot_id,
        }
    }

    /// Append a new lot for a buy.
    ///
    /// # Errors
    /// Returns `InvalidQuantity` if `qty <= 0`.
    pub fn apply_buy(
        &mut self,
        qty: Decimal,
        unit_cost: Decimal,
        created_at: TimeMs,
    ) -> Result<i64, LedgerError> {
        if !qty.is_positive() {
            return Err(LedgerError::InvalidQuantity(qty));
        }

        let id = self.next_lot_id;
        self.next_lot_id += 1;
        self.lots.push(Lot {
            id,
            user: self.user.clone(),
            mint: self.mint.clone(),
            qty_remaining: qty,
            unit_cost,
            created_at,
        });
        // Keep FIFO order even if a backdated buy arrives.
        self.lots.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(id)
    }

    /// Consume lots oldest-first until `qty` is satisfied.
    ///
    /// Fails without touching any lot when the total available quantity is
    /// short of the request; partial consumption would hide corruption as a
    /// negative holding.
    ///
    /// # Errors
    /// `InvalidQuantity` if `qty <= 0`; `InsufficientInventory` if the book
    /// holds less than `qty`.
    pub fn apply_sell(&mut self, qty: Decimal) -> Result<SellOutcome, LedgerError> {
        if !qty.is_positive() {
            return Err(LedgerError::InvalidQuantity(qty));
        }

        let available = self.available_qty();
        if available < qty {
            return Err(LedgerError::InsufficientInventory {
                requested: qty,
                available,
            });
        }

        let mut remaining = qty;
        let mut consumed_cost = Decimal::zero();
        let mut consumptions = Vec::new();

        for lot in self.lots.iter_mut() {
            if remaining.is_zero() {
                break;
            }
            if lot.qty_remaining.is_zero() {
                continue;
            }

            let take = if lot.qty_remaining < remaining {
                lot.qty_remaining
            } else {
                remaining
            };
            let cost = (take * lot.unit_cost).quantize();

            lot.qty_remaining = lot.qty_remaining - take;
            remaining = remaining - take;
            consumed_cost = consumed_cost + cost;
            consumptions.push(LotConsumption {
                lot_id: lot.id,
                qty: take,
                unit_cost: lot.unit_cost,
                cost,
            });
        }

        debug_assert!(remaining.is_zero());

        Ok(SellOutcome {
            consumed_cost,
            consumptions,
        })
    }

    /// Total unconsumed quantity across all lots.
    pub fn available_qty(&self) -> Decimal {
        self.lots
            .iter()
            .fold(Decimal::zero(), |acc, lot| acc + lot.qty_remaining)
    }

    /// All lots in FIFO order, exhausted ones included.
    pub fn lots(&self) -> &[Lot] {
        &self.lots
    }

    /// Consume the book, returning its lots in FIFO order.
    pub fn into_lots(self) -> Vec<Lot> {
        self.lots
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn mint(&self) -> &Mint {
        &self.mint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn book() -> LotBook {
        LotBook::new(
            UserId::new("user-1".to_string()),
            Mint::new("BONK".to_string()),
        )
    }

    #[test]
    fn test_buy_appends_lot() {
        let mut book = book();
        let id = book.apply_buy(d("10"), d("1"), TimeMs::new(1000)).unwrap();
        assert_eq!(id, 1);
        assert_eq!(book.lots().len(), 1);
        assert_eq!(book.lots()[0].qty_remaining, d("10"));
        assert_eq!(book.lots()[0].unit_cost, d("1"));
    }

    #[test]
    fn test_buy_rejects_non_positive_qty() {
        let mut book = book();
        let err = book.apply_buy(d("0"), d("1"), TimeMs::new(1000)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidQuantity(_)));

        let err = book
            .apply_buy(d("-3"), d("1"), TimeMs::new(1000))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidQuantity(_)));
        assert!(book.lots().is_empty());
    }

    #[test]
    fn test_sell_consumes_oldest_first() {
        let mut book = book();
        book.apply_buy(d("10"), d("1"), TimeMs::new(1000)).unwrap();
        book.apply_buy(d("10"), d("2"), TimeMs::new(2000)).unwrap();

        let outcome = book.apply_sell(d("15")).unwrap();

        assert_eq!(outcome.consumed_cost, d("20"));
        assert_eq!(outcome.consumptions.len(), 2);
        assert_eq!(outcome.consumptions[0].lot_id, 1);
        assert_eq!(outcome.consumptions[0].qty, d("10"));
        assert_eq!(outcome.consumptions[1].lot_id, 2);
        assert_eq!(outcome.consumptions[1].qty, d("5"));

        assert_eq!(book.lots()[0].qty_remaining, d("0"));
        assert_eq!(book.lots()[1].qty_remaining, d("5"));
    }

    #[test]
    fn test_exact_exhaustion_leaves_next_lot_untouched() {
        let mut book = book();
        book.apply_buy(d("10"), d("1"), TimeMs::new(1000)).unwrap();
        book.apply_buy(d("10"), d("2"), TimeMs::new(2000)).unwrap();

        let outcome = book.apply_sell(d("10")).unwrap();

        assert_eq!(outcome.consumptions.len(), 1);
        assert_eq!(outcome.consumptions[0].lot_id, 1);
        assert_eq!(book.lots()[1].qty_remaining, d("10"));
    }

    #[test]
    fn test_fifo_ties_broken_by_lot_id() {
        let mut book = book();
        book.apply_buy(d("5"), d("1"), TimeMs::new(1000)).unwrap();
        book.apply_buy(d("5"), d("2"), TimeMs::new(1000)).unwrap();

        let outcome = book.apply_sell(d("6")).unwrap();

        assert_eq!(outcome.consumptions[0].lot_id, 1);
        assert_eq!(outcome.consumptions[0].qty, d("5"));
        assert_eq!(outcome.consumptions[1].lot_id, 2);
        assert_eq!(outcome.consumptions[1].qty, d("1"));
    }

    #[test]
    fn test_backdated_buy_sorts_before_newer_lot() {
        let mut book = book();
        book.apply_buy(d("5"), d("2"), TimeMs::new(2000)).unwrap();
        book.apply_buy(d("5"), d("1"), TimeMs::new(1000)).unwrap();

        let outcome = book.apply_sell(d("5")).unwrap();
        assert_eq!(outcome.consumed_cost, d("5"));
        assert_eq!(outcome.consumptions[0].unit_cost, d("1"));
    }

    #[test]
    fn test_oversell_fails_without_partial_consumption() {
        let mut book = book();
        book.apply_buy(d("10"), d("1"), TimeMs::new(1000)).unwrap();

        let err = book.apply_sell(d("11")).unwrap_err();
        match err {
            LedgerError::InsufficientInventory {
                requested,
                available,
            } => {
                assert_eq!(requested, d("11"));
                assert_eq!(available, d("10"));
            }
            other => panic!("expected InsufficientInventory, got {:?}", other),
        }
        // Nothing was consumed.
        assert_eq!(book.lots()[0].qty_remaining, d("10"));
    }

    #[test]
    fn test_sell_with_no_lots() {
        let mut book = book();
        let err = book.apply_sell(d("5")).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientInventory { .. }));
    }

    #[test]
    fn test_sell_cost_is_quantized_half_up() {
        let mut book = book();
        book.apply_buy(d("3"), d("0.3333333333333333333"), TimeMs::new(1000))
            .unwrap();

        let outcome = book.apply_sell(d("1")).unwrap();
        // 1 * 0.3333333333333333333 rounds half-up at 18 fractional digits.
        assert_eq!(outcome.consumed_cost, d("0.333333333333333333"));
    }

    #[test]
    fn test_from_lots_continues_lot_ids() {
        let user = UserId::new("user-1".to_string());
        let mint = Mint::new("BONK".to_string());
        let lots = vec![
            Lot {
                id: 7,
                user: user.clone(),
                mint: mint.clone(),
                qty_remaining: d("2"),
                unit_cost: d("1"),
                created_at: TimeMs::new(1000),
            },
            Lot {
                id: 3,
                user: user.clone(),
                mint: mint.clone(),
                qty_remaining: d("2"),
                unit_cost: d("1"),
                created_at: TimeMs::new(500),
            },
        ];

        let mut book = LotBook::from_lots(user, mint, lots);
        assert_eq!(book.lots()[0].id, 3, "oldest lot first");

        let id = book.apply_buy(d("1"), d("1"), TimeMs::new(2000)).unwrap();
        assert_eq!(id, 8);
    }
}
