use anyhow::Context;
use mintledger::pricefeed::{spawn_polling, HttpPriceFeed, PriceFeed};
use mintledger::{
    api, config::Config, db::init_db, KeyLocks, LedgerService, Mint, PnlBroadcaster,
    RebuildEngine, Repository,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("loading configuration")?;
    let port = config.port;

    let pool = init_db(&config.database_path)
        .await
        .context("initializing database")?;

    let repo = Arc::new(Repository::new(pool));
    let locks = Arc::new(KeyLocks::new());
    let ledger = Arc::new(LedgerService::new(repo.clone(), locks.clone()));
    let rebuilder = Arc::new(RebuildEngine::new(repo.clone(), locks));
    let broadcaster = Arc::new(PnlBroadcaster::new(repo.clone()));

    // Price ticks flow on their own bus; ledger writes never wait on them.
    let (tick_tx, tick_rx) = tokio::sync::broadcast::channel(1024);
    tokio::spawn(broadcaster.clone().run(tick_rx));

    if config.tracked_mints.is_empty() {
        tracing::warn!("TRACKED_MINTS is empty; live pnl will see no price ticks");
    } else {
        let feed: Arc<dyn PriceFeed> =
            Arc::new(HttpPriceFeed::new(config.price_feed_url.clone()));
        let mints: Vec<Mint> = config
            .tracked_mints
            .iter()
            .map(|m| Mint::new(m.clone()))
            .collect();
        spawn_polling(
            feed,
            mints,
            Duration::from_millis(config.price_poll_ms),
            tick_tx,
        );
    }

    let app = api::create_router(api::AppState::new(
        repo,
        config,
        ledger,
        rebuilder,
        broadcaster,
    ));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}
