//! Replay/rebuild engine: reconstruct Lots and Position from the trade log.
//!
//! A recovery tool, not the hot path. The whole history for a (user, mint) is
//! replayed through a fresh [`LotBook`] in memory; the persisted state is then
//! swapped in one transaction, so a crash or cancellation leaves the prior
//! state untouched. Dirty history (sells exceeding inventory) is skipped and
//! reported instead of aborting the run.

use crate::db::Repository;
use crate::domain::{ordering::sort_trades_deterministic, Decimal, Mint, Side, UserId};
use crate::engine::{aggregate_position, Lot, LotBook};
use crate::error::LedgerError;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::KeyLocks;

/// Cooperative cancellation handle, checked between per-mint batches.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One skipped trade, kept for the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildAnomaly {
    pub mint: Mint,
    pub trade_key: String,
    pub detail: String,
}

/// Outcome of one rebuild run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildReport {
    pub run_id: Uuid,
    pub user: UserId,
    pub positions_rebuilt: usize,
    pub lots_created: usize,
    pub anomalies: Vec<RebuildAnomaly>,
    /// True when the run stopped early on a cancellation signal. Mints
    /// processed before the signal keep their new state.
    pub cancelled: bool,
}

pub struct RebuildEngine {
    repo: Arc<Repository>,
    locks: Arc<KeyLocks>,
}

impl RebuildEngine {
    pub fn new(repo: Arc<Repository>, locks: Arc<KeyLocks>) -> Self {
        Self { repo, locks }
    }

    /// Rebuild one user's lots and positions from their full trade history,
    /// optionally scoped to a single mint.
    ///
    /// Deterministic and idempotent: the same history always yields the same
    /// lots (ids restart at 1 per mint) and the same position figures.
    ///
    /// # Errors
    /// Database errors abort the run; accounting anomalies do not.
    pub async fn rebuild(
        &self,
        user: &UserId,
        mint: Option<&Mint>,
        cancel: &CancelFlag,
    ) -> Result<RebuildReport, LedgerError> {
        let mints = match mint {
            Some(m) => vec![m.clone()],
            None => self.repo.mints_traded_by(user).await?,
        };

        let mut report = RebuildReport {
            run_id: Uuid::new_v4(),
            user: user.clone(),
            positions_rebuilt: 0,
            lots_created: 0,
            anomalies: Vec::new(),
            cancelled: false,
        };

        info!(
            run_id = %report.run_id,
            user = %user,
            mints = mints.len(),
            "rebuild started"
        );

        for mint in mints {
            if cancel.is_cancelled() {
                info!(run_id = %report.run_id, user = %user, "rebuild cancelled");
                report.cancelled = true;
                break;
            }

            let _guard = self.locks.acquire(user, &mint).await;

            let mut trades = self.repo.query_trades(user, Some(&mint)).await?;
            sort_trades_deterministic(&mut trades);

            let mut book = LotBook::new(user.clone(), mint.clone());
            for trade in &trades {
                let applied = match trade.side {
                    Side::Buy => book
                        .apply_buy(trade.quantity, trade.unit_price, trade.occurred_at)
                        .map(|_| ()),
                    Side::Sell => book.apply_sell(trade.quantity).map(|_| ()),
                };

                if let Err(err) = applied {
                    if err.is_recoverable_on_rebuild() {
                        warn!(
                            user = %user,
                            mint = %mint,
                            trade_key = %trade.trade_key(),
                            error = %err,
                            "skipping trade during rebuild"
                        );
                        report.anomalies.push(RebuildAnomaly {
                            mint: mint.clone(),
                            trade_key: trade.trade_key().to_string(),
                            detail: err.to_string(),
                        });
                    } else {
                        return Err(err);
                    }
                }
            }

            let mut position = aggregate_position(user, &mint, book.lots());
            if position.cost_basis.is_negative() {
                // FIFO lot math cannot produce a negative basis from clean
                // inputs; only dirty upstream history lands here.
                warn!(
                    user = %user,
                    mint = %mint,
                    cost_basis = %position.cost_basis,
                    "negative cost basis clamped to zero during rebuild"
                );
                position.cost_basis = Decimal::zero();
            }

            // Exhausted lots are dropped on rebuild to bound storage for
            // fully-closed positions.
            let open_lots: Vec<Lot> = book
                .into_lots()
                .into_iter()
                .filter(|lot| !lot.is_exhausted())
                .collect();

            self.repo
                .replace_position_state(user, &mint, &open_lots, &position)
                .await?;

            report.lots_created += open_lots.len();
            report.positions_rebuilt += 1;
        }

        info!(
            run_id = %report.run_id,
            user = %user,
            positions = report.positions_rebuilt,
            lots = report.lots_created,
            anomalies = report.anomalies.len(),
            cancelled = report.cancelled,
            "rebuild finished"
        );

        Ok(report)
    }
}
