//! Domain types and determinism layer for the lot ledger.
//!
//! This module provides:
//! - Lossless numeric handling via Decimal wrapper
//! - Domain primitives: TimeMs, UserId, Mint, Side
//! - Trade type with a stable key for idempotent ingestion
//! - Stable trade ordering helper for deterministic replay

pub mod decimal;
pub mod ordering;
pub mod primitives;
pub mod trade;

pub use decimal::{Decimal, MONEY_SCALE};
pub use ordering::TradeOrderingKey;
pub use primitives::{Mint, Side, TimeMs, UserId};
pub use trade::Trade;
