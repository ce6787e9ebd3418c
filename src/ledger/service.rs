//! Hot-path trade application and ledger queries.

use crate::db::Repository;
use crate::domain::{Decimal, Mint, Side, Trade, UserId};
use crate::engine::{
    aggregate_position, verify_consistency, Lot, LotBook, Position, RealizedPnl,
};
use crate::error::LedgerError;
use std::sync::Arc;
use tracing::debug;

use super::KeyLocks;

/// Result of applying one trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeOutcome {
    /// The position after the trade.
    pub position: Position,
    /// Present for sells only.
    pub realized: Option<RealizedPnl>,
}

/// The ledger's command/query surface.
///
/// Owns Lot and Position records exclusively: every mutation goes through
/// [`apply_trade`](Self::apply_trade) under the per-key write lock, and each
/// mutation persists the lot change, the recomputed position, and (for sells)
/// the realized-PnL entry in one transaction.
pub struct LedgerService {
    repo: Arc<Repository>,
    locks: Arc<KeyLocks>,
}

impl LedgerService {
    pub fn new(repo: Arc<Repository>, locks: Arc<KeyLocks>) -> Self {
        Self { repo, locks }
    }

    /// Apply one committed trade to the ledger.
    ///
    /// Errors abort this single application and leave all state untouched;
    /// re-driving a failed trade is the caller's decision.
    ///
    /// # Errors
    /// `InvalidQuantity` for a non-positive quantity, `InsufficientInventory`
    /// when a sell exceeds the held quantity, `Corruption` when the stored
    /// position disagrees with its lots, or a database error.
    pub async fn apply_trade(&self, trade: &Trade) -> Result<TradeOutcome, LedgerError> {
        if !trade.quantity.is_positive() {
            return Err(LedgerError::InvalidQuantity(trade.quantity));
        }

        let _guard = self.locks.acquire(&trade.user, &trade.mint).await;

        let lots = self.repo.query_lots(&trade.user, &trade.mint).await?;
        if let Some(stored) = self.repo.query_position(&trade.user, &trade.mint).await? {
            verify_consistency(&stored, &lots)?;
        }

        let mut book = LotBook::from_lots(trade.user.clone(), trade.mint.clone(), lots);

        match trade.side {
            Side::Buy => {
                let lot_id = book.apply_buy(trade.quantity, trade.unit_price, trade.occurred_at)?;
                let position = aggregate_position(&trade.user, &trade.mint, book.lots());
                let lot = book
                    .lots()
                    .iter()
                    .find(|l| l.id == lot_id)
                    .expect("freshly created lot is present")
                    .clone();

                self.repo.persist_buy(trade, &lot, &position).await?;
                debug!(
                    user = %trade.user,
                    mint = %trade.mint,
                    trade_key = %trade.trade_key(),
                    lot_id,
                    "buy applied"
                );

                Ok(TradeOutcome {
                    position,
                    realized: None,
                })
            }
            Side::Sell => {
                let outcome = book.apply_sell(trade.quantity)?;
                let position = aggregate_position(&trade.user, &trade.mint, book.lots());

                let touched = touched_balances(&book, &outcome.consumptions);
                let proceeds = trade.notional();
                let realized = RealizedPnl {
                    user: trade.user.clone(),
                    mint: trade.mint.clone(),
                    trade_key: trade.trade_key().to_string(),
                    qty_consumed: trade.quantity,
                    cost_consumed: outcome.consumed_cost,
                    proceeds,
                    realized_pnl: proceeds - outcome.consumed_cost,
                    occurred_at: trade.occurred_at,
                };

                self.repo
                    .persist_sell(trade, &touched, &position, &realized)
                    .await?;
                debug!(
                    user = %trade.user,
                    mint = %trade.mint,
                    trade_key = %trade.trade_key(),
                    lots_touched = touched.len(),
                    realized_pnl = %realized.realized_pnl,
                    "sell applied"
                );

                Ok(TradeOutcome {
                    position,
                    realized: Some(realized),
                })
            }
        }
    }

    /// Current position for a (user, mint), if any trade ever created one.
    pub async fn position(
        &self,
        user: &UserId,
        mint: &Mint,
    ) -> Result<Option<Position>, LedgerError> {
        Ok(self.repo.query_position(user, mint).await?)
    }

    /// Lots for a (user, mint), oldest first.
    pub async fn lots(&self, user: &UserId, mint: &Mint) -> Result<Vec<Lot>, LedgerError> {
        Ok(self.repo.query_lots(user, mint).await?)
    }

    /// Realized-PnL entries, newest first, with paging.
    pub async fn realized_pnl(
        &self,
        user: &UserId,
        mint: Option<&Mint>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RealizedPnl>, LedgerError> {
        Ok(self
            .repo
            .query_realized_pnl(user, mint, limit, offset)
            .await?)
    }
}

/// Map each consumption back to the lot's post-sell balance.
fn touched_balances(
    book: &LotBook,
    consumptions: &[crate::engine::LotConsumption],
) -> Vec<(i64, Decimal)> {
    consumptions
        .iter()
        .map(|c| {
            let qty_remaining = book
                .lots()
                .iter()
                .find(|l| l.id == c.lot_id)
                .map(|l| l.qty_remaining)
                .unwrap_or_else(Decimal::zero);
            (c.lot_id, qty_remaining)
        })
        .collect()
}
