use axum::http::StatusCode;
use mintledger::api::{self, AppState};
use mintledger::db::init_db;
use mintledger::domain::{Decimal, Mint, Side, TimeMs, Trade, UserId};
use mintledger::{
    Config, KeyLocks, LedgerService, PnlBroadcaster, RebuildEngine, Repository,
};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

struct TestApp {
    app: axum::Router,
    state: AppState,
    _temp: TempDir,
}

fn test_config() -> Config {
    Config {
        port: 0,
        database_path: ":memory:".to_string(),
        price_feed_url: "http://example.invalid".to_string(),
        price_poll_ms: 150,
        tracked_mints: vec![],
    }
}

async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");

    let repo = Arc::new(Repository::new(pool));
    let locks = Arc::new(KeyLocks::new());
    let ledger = Arc::new(LedgerService::new(repo.clone(), locks.clone()));
    let rebuilder = Arc::new(RebuildEngine::new(repo.clone(), locks));
    let broadcaster = Arc::new(PnlBroadcaster::new(repo.clone()));

    let state = AppState::new(repo, test_config(), ledger, rebuilder, broadcaster);
    let app = api::create_router(state.clone());

    TestApp {
        app,
        state,
        _temp: temp_dir,
    }
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();

    let res = app.oneshot(req).await.unwrap();
    let status = res.status();
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn post_json(
    app: axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap();

    let res = app.oneshot(req).await.unwrap();
    let status = res.status();
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn trade_body(external_id: i64, side: &str, qty: &str, px: &str, at: i64) -> serde_json::Value {
    serde_json::json!({
        "externalId": external_id,
        "user": "user-1",
        "mint": "BONK",
        "side": side,
        "quantity": qty,
        "unitPrice": px,
        "occurredAtMs": at,
    })
}

#[tokio::test]
async fn test_ready_probe_round_trips_database() {
    let test_app = setup_test_app().await;

    let (status, body) = get(test_app.app.clone(), "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_apply_buy_then_get_position() {
    let test_app = setup_test_app().await;

    let (status, body) = post_json(
        test_app.app.clone(),
        "/v1/trades",
        trade_body(1, "buy", "10", "1.5", 1000),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["qty"], "10");
    assert_eq!(body["costBasis"], "15");
    assert_eq!(body["tradeKey"], "id:1");
    assert!(body.get("realized").is_none());

    let (status, body) = get(
        test_app.app.clone(),
        "/v1/position?user=user-1&mint=BONK",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["qty"], "10");
    assert_eq!(body["costBasis"], "15");
    assert_eq!(body["avgCost"], "1.5");
}

#[tokio::test]
async fn test_sell_returns_realized_entry() {
    let test_app = setup_test_app().await;

    post_json(
        test_app.app.clone(),
        "/v1/trades",
        trade_body(1, "buy", "10", "1", 1000),
    )
    .await;
    post_json(
        test_app.app.clone(),
        "/v1/trades",
        trade_body(2, "buy", "10", "2", 2000),
    )
    .await;

    let (status, body) = post_json(
        test_app.app.clone(),
        "/v1/trades",
        trade_body(3, "sell", "15", "3", 3000),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["realized"]["costConsumed"], "20");
    assert_eq!(body["realized"]["proceeds"], "45");
    assert_eq!(body["realized"]["realizedPnl"], "25");

    let (status, body) = get(
        test_app.app.clone(),
        "/v1/pnl/realized?user=user-1&mint=BONK",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"].as_array().unwrap().len(), 1);
    assert_eq!(body["entries"][0]["realizedPnl"], "25");
}

#[tokio::test]
async fn test_oversell_maps_to_conflict() {
    let test_app = setup_test_app().await;

    let (status, body) = post_json(
        test_app.app.clone(),
        "/v1/trades",
        trade_body(1, "sell", "5", "1", 1000),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("insufficient inventory"));
}

#[tokio::test]
async fn test_zero_quantity_maps_to_bad_request() {
    let test_app = setup_test_app().await;

    let (status, _body) = post_json(
        test_app.app.clone(),
        "/v1/trades",
        trade_body(1, "buy", "0", "1", 1000),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unparseable_quantity_maps_to_bad_request() {
    let test_app = setup_test_app().await;

    let (status, _body) = post_json(
        test_app.app.clone(),
        "/v1/trades",
        trade_body(1, "buy", "ten", "1", 1000),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_position_is_not_found() {
    let test_app = setup_test_app().await;

    let (status, _body) = get(
        test_app.app.clone(),
        "/v1/position?user=user-1&mint=BONK",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_lots_listed_oldest_first() {
    let test_app = setup_test_app().await;

    post_json(
        test_app.app.clone(),
        "/v1/trades",
        trade_body(1, "buy", "10", "1", 1000),
    )
    .await;
    post_json(
        test_app.app.clone(),
        "/v1/trades",
        trade_body(2, "buy", "5", "2", 2000),
    )
    .await;

    let (status, body) = get(test_app.app.clone(), "/v1/lots?user=user-1&mint=BONK").await;
    assert_eq!(status, StatusCode::OK);
    let lots = body["lots"].as_array().unwrap();
    assert_eq!(lots.len(), 2);
    assert_eq!(lots[0]["createdAtMs"], 1000);
    assert_eq!(lots[1]["createdAtMs"], 2000);
}

#[tokio::test]
async fn test_rebuild_endpoint_reports_anomalies() {
    let test_app = setup_test_app().await;

    // Seed a dirty log row directly (no inventory for this sell).
    test_app
        .state
        .repo
        .insert_trade(&Trade::new(
            Some(9),
            UserId::new("user-1".to_string()),
            Mint::new("BONK".to_string()),
            Side::Sell,
            Decimal::from_str_canonical("4").unwrap(),
            Decimal::from_str_canonical("1").unwrap(),
            TimeMs::new(1000),
        ))
        .await
        .unwrap();

    let (status, body) = post_json(
        test_app.app.clone(),
        "/v1/rebuild?user=user-1",
        serde_json::json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["positionsRebuilt"], 1);
    assert_eq!(body["anomalies"].as_array().unwrap().len(), 1);
    assert_eq!(body["anomalies"][0]["tradeKey"], "id:9");
    assert!(body["runId"].is_string());
}

#[tokio::test]
async fn test_live_pnl_without_price_is_not_found() {
    let test_app = setup_test_app().await;

    post_json(
        test_app.app.clone(),
        "/v1/trades",
        trade_body(1, "buy", "10", "1", 1000),
    )
    .await;

    let (status, _body) = get(
        test_app.app.clone(),
        "/v1/pnl/live?user=user-1&mint=BONK",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_empty_user_is_bad_request() {
    let test_app = setup_test_app().await;

    let (status, _body) = get(test_app.app.clone(), "/v1/position?user=&mint=BONK").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
