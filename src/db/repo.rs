//! Repository layer for database operations.
//!
//! All SQL lives here. Decimal columns are stored as canonical strings to
//! keep SQLite from ever coercing them through floats. The repository is the
//! only component allowed to write Lot and Position rows, and it writes them
//! only through the transactional methods below so a lot mutation and its
//! position recompute land atomically.

use crate::domain::{Decimal, Mint, Side, TimeMs, Trade, UserId};
use crate::engine::{Lot, Position, RealizedPnl};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

fn parse_decimal(value: &str, column: &'static str) -> Result<Decimal, sqlx::Error> {
    Decimal::from_str_canonical(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn parse_side(value: &str) -> Result<Side, sqlx::Error> {
    match value {
        "buy" => Ok(Side::Buy),
        "sell" => Ok(Side::Sell),
        other => Err(sqlx::Error::ColumnDecode {
            index: "side".to_string(),
            source: format!("unknown side {:?}", other).into(),
        }),
    }
}

fn side_str(side: Side) -> &'static str {
    match side {
        Side::Buy => "buy",
        Side::Sell => "sell",
    }
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Cheap round-trip used by the readiness probe.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // =========================================================================
    // Trade log operations
    // =========================================================================

    /// Insert a trade into the log copy idempotently.
    ///
    /// Returns true if the row was newly inserted.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_trade(&self, trade: &Trade) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO trades (trade_key, external_id, user, mint, side, quantity, unit_price, occurred_at_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(trade_key) DO NOTHING
            "#,
        )
        .bind(trade.trade_key())
        .bind(trade.external_id)
        .bind(trade.user.as_str())
        .bind(trade.mint.as_str())
        .bind(side_str(trade.side))
        .bind(trade.quantity.to_canonical_string())
        .bind(trade.unit_price.to_canonical_string())
        .bind(trade.occurred_at.as_ms())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Insert multiple trades in a single transaction.
    ///
    /// Returns the number of newly inserted trades (excludes duplicates).
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn insert_trades_batch(&self, trades: &[Trade]) -> Result<usize, sqlx::Error> {
        if trades.is_empty() {
            return Ok(0);
        }

        let mut total_inserted = 0usize;
        let mut tx = self.pool.begin().await?;

        for trade in trades {
            let result = sqlx::query(
                r#"
                INSERT INTO trades (trade_key, external_id, user, mint, side, quantity, unit_price, occurred_at_ms)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(trade_key) DO NOTHING
                "#,
            )
            .bind(trade.trade_key())
            .bind(trade.external_id)
            .bind(trade.user.as_str())
            .bind(trade.mint.as_str())
            .bind(side_str(trade.side))
            .bind(trade.quantity.to_canonical_string())
            .bind(trade.unit_price.to_canonical_string())
            .bind(trade.occurred_at.as_ms())
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                total_inserted += 1;
            }
        }

        tx.commit().await?;
        Ok(total_inserted)
    }

    /// Query the trade history for a user, optionally scoped to one mint.
    ///
    /// Ordered by (occurred_at_ms, external_id, trade_key): the FIFO replay
    /// contract. SQLite sorts NULL external ids first, matching the Rust-side
    /// `Option<i64>` ordering.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_trades(
        &self,
        user: &UserId,
        mint: Option<&Mint>,
    ) -> Result<Vec<Trade>, sqlx::Error> {
        let (sql, binds_mint) = if mint.is_some() {
            (
                r#"
                SELECT trade_key, external_id, user, mint, side, quantity, unit_price, occurred_at_ms
                FROM trades
                WHERE user = ? AND mint = ?
                ORDER BY occurred_at_ms ASC, external_id ASC, trade_key ASC
                "#,
                true,
            )
        } else {
            (
                r#"
                SELECT trade_key, external_id, user, mint, side, quantity, unit_price, occurred_at_ms
                FROM trades
                WHERE user = ?
                ORDER BY occurred_at_ms ASC, external_id ASC, trade_key ASC
                "#,
                false,
            )
        };

        let mut query = sqlx::query(sql).bind(user.as_str());
        if binds_mint {
            query = query.bind(mint.expect("binds_mint implies mint is Some").as_str());
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                Ok(Trade {
                    trade_key: row.get::<String, _>("trade_key"),
                    external_id: row.get::<Option<i64>, _>("external_id"),
                    user: UserId::new(row.get::<String, _>("user")),
                    mint: Mint::new(row.get::<String, _>("mint")),
                    side: parse_side(&row.get::<String, _>("side"))?,
                    quantity: parse_decimal(&row.get::<String, _>("quantity"), "quantity")?,
                    unit_price: parse_decimal(&row.get::<String, _>("unit_price"), "unit_price")?,
                    occurred_at: TimeMs::new(row.get::<i64, _>("occurred_at_ms")),
                })
            })
            .collect()
    }

    /// Distinct mints a user has ever traded, sorted for stable iteration.
    pub async fn mints_traded_by(&self, user: &UserId) -> Result<Vec<Mint>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT mint FROM trades WHERE user = ? ORDER BY mint ASC
            "#,
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Mint::new(row.get::<String, _>("mint")))
            .collect())
    }

    // =========================================================================
    // Lot and position reads
    // =========================================================================

    /// All lots for a (user, mint) in FIFO order, exhausted lots included.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored decimal is unreadable.
    pub async fn query_lots(&self, user: &UserId, mint: &Mint) -> Result<Vec<Lot>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT lot_id, qty_remaining, unit_cost, created_at_ms
            FROM lots
            WHERE user = ? AND mint = ?
            ORDER BY created_at_ms ASC, lot_id ASC
            "#,
        )
        .bind(user.as_str())
        .bind(mint.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Lot {
                    id: row.get::<i64, _>("lot_id"),
                    user: user.clone(),
                    mint: mint.clone(),
                    qty_remaining: parse_decimal(
                        &row.get::<String, _>("qty_remaining"),
                        "qty_remaining",
                    )?,
                    unit_cost: parse_decimal(&row.get::<String, _>("unit_cost"), "unit_cost")?,
                    created_at: TimeMs::new(row.get::<i64, _>("created_at_ms")),
                })
            })
            .collect()
    }

    /// The stored Position for a (user, mint), if one exists.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored decimal is unreadable.
    pub async fn query_position(
        &self,
        user: &UserId,
        mint: &Mint,
    ) -> Result<Option<Position>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT qty, cost_basis FROM positions WHERE user = ? AND mint = ?
            "#,
        )
        .bind(user.as_str())
        .bind(mint.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(Position {
                user: user.clone(),
                mint: mint.clone(),
                qty: parse_decimal(&row.get::<String, _>("qty"), "qty")?,
                cost_basis: parse_decimal(&row.get::<String, _>("cost_basis"), "cost_basis")?,
            })
        })
        .transpose()
    }

    // =========================================================================
    // Realized PnL reads
    // =========================================================================

    /// Realized-PnL entries for a user, newest first, with paging.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored decimal is unreadable.
    pub async fn query_realized_pnl(
        &self,
        user: &UserId,
        mint: Option<&Mint>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RealizedPnl>, sqlx::Error> {
        let (sql, binds_mint) = if mint.is_some() {
            (
                r#"
                SELECT user, mint, trade_key, qty_consumed, cost_consumed, proceeds, realized_pnl, occurred_at_ms
                FROM realized_pnl
                WHERE user = ? AND mint = ?
                ORDER BY occurred_at_ms DESC, id DESC
                LIMIT ? OFFSET ?
                "#,
                true,
            )
        } else {
            (
                r#"
                SELECT user, mint, trade_key, qty_consumed, cost_consumed, proceeds, realized_pnl, occurred_at_ms
                FROM realized_pnl
                WHERE user = ?
                ORDER BY occurred_at_ms DESC, id DESC
                LIMIT ? OFFSET ?
                "#,
                false,
            )
        };

        let mut query = sqlx::query(sql).bind(user.as_str());
        if binds_mint {
            query = query.bind(mint.expect("binds_mint implies mint is Some").as_str());
        }
        query = query.bind(limit).bind(offset);

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                Ok(RealizedPnl {
                    user: UserId::new(row.get::<String, _>("user")),
                    mint: Mint::new(row.get::<String, _>("mint")),
                    trade_key: row.get::<String, _>("trade_key"),
                    qty_consumed: parse_decimal(
                        &row.get::<String, _>("qty_consumed"),
                        "qty_consumed",
                    )?,
                    cost_consumed: parse_decimal(
                        &row.get::<String, _>("cost_consumed"),
                        "cost_consumed",
                    )?,
                    proceeds: parse_decimal(&row.get::<String, _>("proceeds"), "proceeds")?,
                    realized_pnl: parse_decimal(
                        &row.get::<String, _>("realized_pnl"),
                        "realized_pnl",
                    )?,
                    occurred_at: TimeMs::new(row.get::<i64, _>("occurred_at_ms")),
                })
            })
            .collect()
    }

    // =========================================================================
    // Ledger writes (transactional)
    // =========================================================================

    /// Persist a buy: the applied trade, its new lot, and the recomputed
    /// position, atomically.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn persist_buy(
        &self,
        trade: &Trade,
        lot: &Lot,
        position: &Position,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        insert_trade_tx(&mut tx, trade).await?;

        sqlx::query(
            r#"
            INSERT INTO lots (user, mint, lot_id, qty_remaining, unit_cost, created_at_ms)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(lot.user.as_str())
        .bind(lot.mint.as_str())
        .bind(lot.id)
        .bind(lot.qty_remaining.to_canonical_string())
        .bind(lot.unit_cost.to_canonical_string())
        .bind(lot.created_at.as_ms())
        .execute(&mut *tx)
        .await?;

        upsert_position(&mut tx, position).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Persist a sell: the applied trade, touched lot balances, the
    /// recomputed position, and the realized-PnL entry, atomically.
    ///
    /// `touched` carries (lot_id, new qty_remaining) for every consumed lot.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn persist_sell(
        &self,
        trade: &Trade,
        touched: &[(i64, Decimal)],
        position: &Position,
        realized: &RealizedPnl,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        insert_trade_tx(&mut tx, trade).await?;

        for (lot_id, qty_remaining) in touched {
            sqlx::query(
                r#"
                UPDATE lots SET qty_remaining = ?
                WHERE user = ? AND mint = ? AND lot_id = ?
                "#,
            )
            .bind(qty_remaining.to_canonical_string())
            .bind(position.user.as_str())
            .bind(position.mint.as_str())
            .bind(lot_id)
            .execute(&mut *tx)
            .await?;
        }

        upsert_position(&mut tx, position).await?;

        sqlx::query(
            r#"
            INSERT INTO realized_pnl
            (user, mint, trade_key, qty_consumed, cost_consumed, proceeds, realized_pnl, occurred_at_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(realized.user.as_str())
        .bind(realized.mint.as_str())
        .bind(&realized.trade_key)
        .bind(realized.qty_consumed.to_canonical_string())
        .bind(realized.cost_consumed.to_canonical_string())
        .bind(realized.proceeds.to_canonical_string())
        .bind(realized.realized_pnl.to_canonical_string())
        .bind(realized.occurred_at.as_ms())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Atomically swap the full lot and position state for a (user, mint).
    ///
    /// Used by the rebuild engine: either the whole replacement lands or the
    /// prior state stays untouched.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn replace_position_state(
        &self,
        user: &UserId,
        mint: &Mint,
        lots: &[Lot],
        position: &Position,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM lots WHERE user = ? AND mint = ?")
            .bind(user.as_str())
            .bind(mint.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM positions WHERE user = ? AND mint = ?")
            .bind(user.as_str())
            .bind(mint.as_str())
            .execute(&mut *tx)
            .await?;

        for lot in lots {
            sqlx::query(
                r#"
                INSERT INTO lots (user, mint, lot_id, qty_remaining, unit_cost, created_at_ms)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(lot.user.as_str())
            .bind(lot.mint.as_str())
            .bind(lot.id)
            .bind(lot.qty_remaining.to_canonical_string())
            .bind(lot.unit_cost.to_canonical_string())
            .bind(lot.created_at.as_ms())
            .execute(&mut *tx)
            .await?;
        }

        upsert_position(&mut tx, position).await?;

        tx.commit().await?;
        Ok(())
    }
}

async fn insert_trade_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    trade: &Trade,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO trades (trade_key, external_id, user, mint, side, quantity, unit_price, occurred_at_ms)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(trade_key) DO NOTHING
        "#,
    )
    .bind(trade.trade_key())
    .bind(trade.external_id)
    .bind(trade.user.as_str())
    .bind(trade.mint.as_str())
    .bind(side_str(trade.side))
    .bind(trade.quantity.to_canonical_string())
    .bind(trade.unit_price.to_canonical_string())
    .bind(trade.occurred_at.as_ms())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn upsert_position(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    position: &Position,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO positions (user, mint, qty, cost_basis)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(user, mint) DO UPDATE SET qty = excluded.qty, cost_basis = excluded.cost_basis
        "#,
    )
    .bind(position.user.as_str())
    .bind(position.mint.as_str())
    .bind(position.qty.to_canonical_string())
    .bind(position.cost_basis.to_canonical_string())
    .execute(&mut **tx)
    .await?;
    Ok(())
}
