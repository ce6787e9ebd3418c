use crate::api::positions::{parse_mint, parse_user};
use crate::api::AppState;
use crate::error::AppError;
use crate::ledger::CancelFlag;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildQuery {
    pub user: String,
    pub mint: Option<String>,
}

pub async fn post_rebuild(
    Query(params): Query<RebuildQuery>,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = parse_user(&params.user)?;
    let mint = params
        .mint
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_mint)
        .transpose()?;

    let report = state
        .rebuilder
        .rebuild(&user, mint.as_ref(), &CancelFlag::new())
        .await
        .map_err(AppError::from)?;

    serde_json::to_value(&report)
        .map(Json)
        .map_err(|e| AppError::Internal(e.to_string()))
}
