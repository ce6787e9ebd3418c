use crate::domain::Decimal;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Accounting errors surfaced by the lot ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Non-positive quantity on a buy/sell input; rejected before any state
    /// mutation.
    #[error("invalid quantity: {0} (must be > 0)")]
    InvalidQuantity(Decimal),
    /// A sell requested more than the sum of remaining lot quantities.
    #[error("insufficient inventory: requested {requested}, available {available}")]
    InsufficientInventory {
        requested: Decimal,
        available: Decimal,
    },
    /// Average cost or percentage PnL against a zero denominator.
    #[error("division by zero")]
    DivisionByZero,
    /// Stored Position and Lot sums disagree; requires manual investigation.
    #[error("ledger corruption: {0}")]
    Corruption(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl LedgerError {
    /// True for errors the rebuild engine records and skips rather than
    /// aborting the run.
    pub fn is_recoverable_on_rebuild(&self) -> bool {
        matches!(
            self,
            LedgerError::InsufficientInventory { .. } | LedgerError::InvalidQuantity(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidQuantity(_) => AppError::BadRequest(err.to_string()),
            LedgerError::InsufficientInventory { .. } => AppError::Conflict(err.to_string()),
            LedgerError::DivisionByZero => AppError::Internal(err.to_string()),
            LedgerError::Corruption(_) => AppError::Internal(err.to_string()),
            LedgerError::Db(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
