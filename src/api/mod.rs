pub mod health;
pub mod pnl;
pub mod positions;
pub mod rebuild;
pub mod trades;

use crate::config::Config;
use crate::db::Repository;
use crate::ledger::{LedgerService, RebuildEngine};
use crate::stream::PnlBroadcaster;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub ledger: Arc<LedgerService>,
    pub rebuilder: Arc<RebuildEngine>,
    pub broadcaster: Arc<PnlBroadcaster>,
}

impl AppState {
    pub fn new(
        repo: Arc<Repository>,
        config: Config,
        ledger: Arc<LedgerService>,
        rebuilder: Arc<RebuildEngine>,
        broadcaster: Arc<PnlBroadcaster>,
    ) -> Self {
        Self {
            repo,
            config,
            ledger,
            rebuilder,
            broadcaster,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/position", get(positions::get_position))
        .route("/v1/lots", get(positions::get_lots))
        .route(
            "/v1/trades",
            get(trades::get_trades).post(trades::apply_trade),
        )
        .route("/v1/pnl/realized", get(pnl::get_realized_pnl))
        .route("/v1/pnl/live", get(pnl::get_live_pnl))
        .route("/v1/rebuild", post(rebuild::post_rebuild))
        .layer(cors)
        .with_state(state)
}
