use crate::api::positions::{parse_mint, parse_user};
use crate::api::AppState;
use crate::domain::{Decimal, Side, TimeMs, Trade};
use crate::error::AppError;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyTradeRequest {
    pub external_id: Option<i64>,
    pub user: String,
    pub mint: String,
    pub side: Side,
    /// Decimal as a string; parsed losslessly.
    pub quantity: String,
    pub unit_price: String,
    pub occurred_at_ms: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealizedPnlDto {
    pub trade_key: String,
    pub qty_consumed: String,
    pub cost_consumed: String,
    pub proceeds: String,
    pub realized_pnl: String,
    pub occurred_at_ms: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyTradeResponse {
    pub trade_key: String,
    pub qty: String,
    pub cost_basis: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realized: Option<RealizedPnlDto>,
}

pub async fn apply_trade(
    State(state): State<AppState>,
    Json(req): Json<ApplyTradeRequest>,
) -> Result<Json<ApplyTradeResponse>, AppError> {
    let user = parse_user(&req.user)?;
    let mint = parse_mint(&req.mint)?;

    let quantity = Decimal::from_str_canonical(&req.quantity)
        .map_err(|_| AppError::BadRequest("Invalid quantity".to_string()))?;
    let unit_price = Decimal::from_str_canonical(&req.unit_price)
        .map_err(|_| AppError::BadRequest("Invalid unitPrice".to_string()))?;
    if unit_price.is_negative() {
        return Err(AppError::BadRequest(
            "unitPrice must not be negative".to_string(),
        ));
    }

    let trade = Trade::new(
        req.external_id,
        user,
        mint,
        req.side,
        quantity,
        unit_price,
        TimeMs::new(req.occurred_at_ms),
    );

    let outcome = state
        .ledger
        .apply_trade(&trade)
        .await
        .map_err(AppError::from)?;

    Ok(Json(ApplyTradeResponse {
        trade_key: trade.trade_key().to_string(),
        qty: outcome.position.qty.to_canonical_string(),
        cost_basis: outcome.position.cost_basis.to_canonical_string(),
        realized: outcome.realized.map(|r| RealizedPnlDto {
            trade_key: r.trade_key,
            qty_consumed: r.qty_consumed.to_canonical_string(),
            cost_consumed: r.cost_consumed.to_canonical_string(),
            proceeds: r.proceeds.to_canonical_string(),
            realized_pnl: r.realized_pnl.to_canonical_string(),
            occurred_at_ms: r.occurred_at.as_ms(),
        }),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradesQuery {
    pub user: String,
    pub mint: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeDto {
    pub trade_key: String,
    pub external_id: Option<i64>,
    pub mint: String,
    pub side: Side,
    pub quantity: String,
    pub unit_price: String,
    pub occurred_at_ms: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradesResponse {
    pub user: String,
    pub trades: Vec<TradeDto>,
}

pub async fn get_trades(
    Query(params): Query<TradesQuery>,
    State(state): State<AppState>,
) -> Result<Json<TradesResponse>, AppError> {
    let user = parse_user(&params.user)?;
    let mint = params
        .mint
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_mint(s))
        .transpose()?;

    let trades = state
        .repo
        .query_trades(&user, mint.as_ref())
        .await
        .map_err(AppError::from)?;

    Ok(Json(TradesResponse {
        user: user.as_str().to_string(),
        trades: trades
            .into_iter()
            .map(|t| TradeDto {
                trade_key: t.trade_key.clone(),
                external_id: t.external_id,
                mint: t.mint.as_str().to_string(),
                side: t.side,
                quantity: t.quantity.to_canonical_string(),
                unit_price: t.unit_price.to_canonical_string(),
                occurred_at_ms: t.occurred_at.as_ms(),
            })
            .collect(),
    }))
}
