//! HTTP polling price feed for the market-data collaborator's quote API.

use super::{PriceFeed, PriceFeedError, PriceTick};
use crate::domain::{Decimal, Mint, TimeMs};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use futures::future::try_join_all;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Price feed backed by a `GET {base_url}/v1/price/{mint}` quote endpoint.
#[derive(Debug, Clone)]
pub struct HttpPriceFeed {
    client: Client,
    base_url: String,
}

impl HttpPriceFeed {
    /// Create a new HTTP price feed.
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    async fn fetch_one(&self, mint: &Mint) -> Result<Option<PriceTick>, PriceFeedError> {
        let url = format!("{}/v1/price/{}", self.base_url.trim_end_matches('/'), mint);
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(5)),
            ..Default::default()
        };

        let response = retry(backoff, || async {
            let response = self.client.get(&url).send().await.map_err(|e| {
                backoff::Error::transient(PriceFeedError::NetworkError(e.to_string()))
            })?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(PriceFeedError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(PriceFeedError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if status == 404 {
                // Unknown mint: no quote, not an error.
                return Ok(None);
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(PriceFeedError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map(Some)
                .map_err(|e| backoff::Error::permanent(PriceFeedError::ParseError(e.to_string())))
        })
        .await?;

        let Some(body) = response else {
            return Ok(None);
        };

        let price = parse_price(&body)?;
        debug!(mint = %mint, price = %price, "price fetched");

        Ok(Some(PriceTick {
            mint: mint.clone(),
            price,
            time_ms: TimeMs::now(),
        }))
    }
}

#[async_trait]
impl PriceFeed for HttpPriceFeed {
    async fn fetch_prices(&self, mints: &[Mint]) -> Result<Vec<PriceTick>, PriceFeedError> {
        let fetches = mints.iter().map(|mint| self.fetch_one(mint));
        let ticks = try_join_all(fetches).await?;
        Ok(ticks.into_iter().flatten().collect())
    }
}

/// Extract the decimal price from a quote body.
///
/// Accepts `{"price": "1.23"}` or `{"price": 1.23}`; the numeric form is
/// parsed from its exact JSON text, never through a float.
fn parse_price(body: &serde_json::Value) -> Result<Decimal, PriceFeedError> {
    let field = body
        .get("price")
        .ok_or_else(|| PriceFeedError::ParseError("missing price field".to_string()))?;

    let text = match field {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        other => {
            return Err(PriceFeedError::ParseError(format!(
                "unexpected price value: {}",
                other
            )))
        }
    };

    Decimal::from_str_canonical(&text)
        .map_err(|e| PriceFeedError::ParseError(format!("bad price {:?}: {}", text, e)))
}
