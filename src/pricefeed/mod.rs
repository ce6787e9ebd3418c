//! Price feed abstraction for streaming market prices into the PnL engine.

use crate::domain::{Decimal, Mint, TimeMs};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::warn;

pub mod http;
pub mod mock;

pub use http::HttpPriceFeed;
pub use mock::MockPriceFeed;

/// One observed market price for a mint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceTick {
    pub mint: Mint,
    pub price: Decimal,
    pub time_ms: TimeMs,
}

/// Source of market prices.
///
/// Implementations must handle retry/backoff and rate limiting; the poll loop
/// treats a failed round as a skipped tick, not a fatal error.
#[async_trait]
pub trait PriceFeed: Send + Sync + fmt::Debug {
    /// Fetch current prices for the given mints.
    ///
    /// Mints the source has no quote for are omitted from the result rather
    /// than reported as errors.
    async fn fetch_prices(&self, mints: &[Mint]) -> Result<Vec<PriceTick>, PriceFeedError>;
}

/// Error type for price feed operations.
#[derive(Debug, Clone)]
pub enum PriceFeedError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 429 rate limit, 5xx server error)
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
    /// Rate limit exceeded (caller should implement backoff)
    RateLimited,
    /// Other error
    Other(String),
}

impl fmt::Display for PriceFeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceFeedError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            PriceFeedError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            PriceFeedError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            PriceFeedError::RateLimited => write!(f, "Rate limited"),
            PriceFeedError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for PriceFeedError {}

/// Poll a feed on a fixed cadence and fan ticks out on a broadcast bus.
///
/// Slow subscribers lag and drop old ticks (broadcast semantics); a failed
/// poll round is logged and the next round proceeds. The task ends when every
/// receiver is gone.
pub fn spawn_polling(
    feed: Arc<dyn PriceFeed>,
    mints: Vec<Mint>,
    poll_interval: Duration,
    tx: broadcast::Sender<PriceTick>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            match feed.fetch_prices(&mints).await {
                Ok(ticks) => {
                    for tick in ticks {
                        if tx.send(tick).is_err() {
                            // No receivers left.
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "price poll failed; skipping round");
                }
            }
        }
    })
}
