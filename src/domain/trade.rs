//! Trade type representing one entry of the append-only trade log.

use crate::domain::{Decimal, Mint, Side, TimeMs, UserId};
use serde::{Deserialize, Serialize};

/// A single executed trade, as recorded by the trade-log writer.
///
/// Trades are immutable facts; the ledger never mutates or re-emits them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Stable unique identifier for this trade.
    pub trade_key: String,
    /// Identifier assigned by the trade-log writer, when known.
    pub external_id: Option<i64>,
    /// Owning user.
    pub user: UserId,
    /// Token mint being traded.
    pub mint: Mint,
    /// Trade side (Buy or Sell).
    pub side: Side,
    /// Quantity traded. Must be > 0 to be applied.
    pub quantity: Decimal,
    /// Price per unit in the base currency.
    pub unit_price: Decimal,
    /// Execution time in milliseconds since Unix epoch.
    pub occurred_at: TimeMs,
}

impl Trade {
    /// Create a new Trade with a derived stable key.
    pub fn new(
        external_id: Option<i64>,
        user: UserId,
        mint: Mint,
        side: Side,
        quantity: Decimal,
        unit_price: Decimal,
        occurred_at: TimeMs,
    ) -> Self {
        let trade_key = Self::compute_trade_key(
            external_id,
            &user,
            &mint,
            side,
            &quantity,
            &unit_price,
            occurred_at,
        );
        Trade {
            trade_key,
            external_id,
            user,
            mint,
            side,
            quantity,
            unit_price,
            occurred_at,
        }
    }

    /// Generate a stable unique key for this trade.
    ///
    /// Priority: `external_id` (if present) > hash of deterministic fields.
    pub fn compute_trade_key(
        external_id: Option<i64>,
        user: &UserId,
        mint: &Mint,
        side: Side,
        quantity: &Decimal,
        unit_price: &Decimal,
        occurred_at: TimeMs,
    ) -> String {
        if let Some(id) = external_id {
            return format!("id:{}", id);
        }

        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(user.as_str());
        hasher.update(mint.as_str());
        hasher.update(occurred_at.as_ms().to_le_bytes());
        hasher.update(if side == Side::Buy { b"B" } else { b"S" });
        hasher.update(quantity.to_canonical_string());
        hasher.update(unit_price.to_canonical_string());
        let hash = hasher.finalize();
        format!("hash:{}", hex::encode(&hash[..16]))
    }

    /// Borrow the precomputed trade key.
    pub fn trade_key(&self) -> &str {
        &self.trade_key
    }

    /// Total value of this trade, quantized at the money scale.
    pub fn notional(&self) -> Decimal {
        (self.quantity * self.unit_price).quantize()
    }
}
