use crate::api::AppState;
use crate::domain::{Mint, UserId};
use crate::error::AppError;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

pub(crate) fn parse_user(input: &str) -> Result<UserId, AppError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("user must not be empty".to_string()));
    }
    Ok(UserId::new(trimmed.to_string()))
}

pub(crate) fn parse_mint(input: &str) -> Result<Mint, AppError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("mint must not be empty".to_string()));
    }
    Ok(Mint::new(trimmed.to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionQuery {
    pub user: String,
    pub mint: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionDto {
    pub user: String,
    pub mint: String,
    pub qty: String,
    pub cost_basis: String,
    /// Absent for a flat position, where average cost is undefined.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_cost: Option<String>,
}

pub async fn get_position(
    Query(params): Query<PositionQuery>,
    State(state): State<AppState>,
) -> Result<Json<PositionDto>, AppError> {
    let user = parse_user(&params.user)?;
    let mint = parse_mint(&params.mint)?;

    let position = state
        .ledger
        .position(&user, &mint)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| {
            AppError::NotFound(format!("no position for user={} mint={}", user, mint))
        })?;

    let avg_cost = position.avg_cost().ok();
    Ok(Json(PositionDto {
        user: position.user.as_str().to_string(),
        mint: position.mint.as_str().to_string(),
        qty: position.qty.to_canonical_string(),
        cost_basis: position.cost_basis.to_canonical_string(),
        avg_cost: avg_cost.map(|v| v.to_canonical_string()),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LotDto {
    pub lot_id: i64,
    pub qty_remaining: String,
    pub unit_cost: String,
    pub created_at_ms: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LotsResponse {
    pub user: String,
    pub mint: String,
    pub lots: Vec<LotDto>,
}

pub async fn get_lots(
    Query(params): Query<PositionQuery>,
    State(state): State<AppState>,
) -> Result<Json<LotsResponse>, AppError> {
    let user = parse_user(&params.user)?;
    let mint = parse_mint(&params.mint)?;

    let lots = state
        .ledger
        .lots(&user, &mint)
        .await
        .map_err(AppError::from)?;

    Ok(Json(LotsResponse {
        user: user.as_str().to_string(),
        mint: mint.as_str().to_string(),
        lots: lots
            .into_iter()
            .map(|lot| LotDto {
                lot_id: lot.id,
                qty_remaining: lot.qty_remaining.to_canonical_string(),
                unit_cost: lot.unit_cost.to_canonical_string(),
                created_at_ms: lot.created_at.as_ms(),
            })
            .collect(),
    }))
}
