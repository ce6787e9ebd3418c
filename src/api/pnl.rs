use crate::api::positions::{parse_mint, parse_user};
use crate::api::AppState;
use crate::error::AppError;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 1000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealizedPnlQuery {
    pub user: String,
    pub mint: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealizedEntryDto {
    pub mint: String,
    pub trade_key: String,
    pub qty_consumed: String,
    pub cost_consumed: String,
    pub proceeds: String,
    pub realized_pnl: String,
    pub occurred_at_ms: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealizedPnlResponse {
    pub user: String,
    pub entries: Vec<RealizedEntryDto>,
}

pub async fn get_realized_pnl(
    Query(params): Query<RealizedPnlQuery>,
    State(state): State<AppState>,
) -> Result<Json<RealizedPnlResponse>, AppError> {
    let user = parse_user(&params.user)?;
    let mint = params
        .mint
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_mint)
        .transpose()?;

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }
    let offset = params.offset.unwrap_or(0);
    if offset < 0 {
        return Err(AppError::BadRequest("offset must be >= 0".to_string()));
    }

    let entries = state
        .ledger
        .realized_pnl(&user, mint.as_ref(), limit, offset)
        .await
        .map_err(AppError::from)?;

    Ok(Json(RealizedPnlResponse {
        user: user.as_str().to_string(),
        entries: entries
            .into_iter()
            .map(|e| RealizedEntryDto {
                mint: e.mint.as_str().to_string(),
                trade_key: e.trade_key,
                qty_consumed: e.qty_consumed.to_canonical_string(),
                cost_consumed: e.cost_consumed.to_canonical_string(),
                proceeds: e.proceeds.to_canonical_string(),
                realized_pnl: e.realized_pnl.to_canonical_string(),
                occurred_at_ms: e.occurred_at.as_ms(),
            })
            .collect(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivePnlQuery {
    pub user: String,
    pub mint: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LivePnlResponse {
    pub user: String,
    pub mint: String,
    pub price: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_cost: Option<String>,
    pub current_value: String,
    pub unrealized_pnl: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unrealized_pnl_percent: Option<String>,
    pub time_ms: i64,
}

pub async fn get_live_pnl(
    Query(params): Query<LivePnlQuery>,
    State(state): State<AppState>,
) -> Result<Json<LivePnlResponse>, AppError> {
    let user = parse_user(&params.user)?;
    let mint = parse_mint(&params.mint)?;

    let update = state
        .broadcaster
        .current(&user, &mint)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "no live pnl for user={} mint={} (no price or position yet)",
                user, mint
            ))
        })?;

    Ok(Json(LivePnlResponse {
        user: update.user.as_str().to_string(),
        mint: update.mint.as_str().to_string(),
        price: update.price.to_canonical_string(),
        avg_cost: update.avg_cost.map(|v| v.to_canonical_string()),
        current_value: update.current_value.to_canonical_string(),
        unrealized_pnl: update.unrealized_pnl.to_canonical_string(),
        unrealized_pnl_percent: update
            .unrealized_pnl_percent
            .map(|v| v.to_canonical_string()),
        time_ms: update.time_ms.as_ms(),
    }))
}
