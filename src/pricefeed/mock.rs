//! In-memory price feed for tests.

use super::{PriceFeed, PriceFeedError, PriceTick};
use crate::domain::{Decimal, Mint, TimeMs};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Scripted price feed returning preset quotes.
#[derive(Debug, Default)]
pub struct MockPriceFeed {
    prices: Mutex<HashMap<Mint, Decimal>>,
    fail_next: Mutex<bool>,
}

impl MockPriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style quote registration.
    pub fn with_price(self, mint: &str, price: &str) -> Self {
        self.set_price(mint, price);
        self
    }

    /// Set or replace the quote for a mint.
    pub fn set_price(&self, mint: &str, price: &str) {
        let price = Decimal::from_str_canonical(price).expect("valid decimal literal");
        self.prices
            .lock()
            .expect("price map poisoned")
            .insert(Mint::new(mint.to_string()), price);
    }

    /// Make the next fetch round fail once.
    pub fn fail_next(&self) {
        *self.fail_next.lock().expect("flag poisoned") = true;
    }
}

#[async_trait]
impl PriceFeed for MockPriceFeed {
    async fn fetch_prices(&self, mints: &[Mint]) -> Result<Vec<PriceTick>, PriceFeedError> {
        {
            let mut fail = self.fail_next.lock().expect("flag poisoned");
            if *fail {
                *fail = false;
                return Err(PriceFeedError::Other("scripted failure".to_string()));
            }
        }

        let prices = self.prices.lock().expect("price map poisoned");
        let now = TimeMs::now();
        Ok(mints
            .iter()
            .filter_map(|mint| {
                prices.get(mint).map(|price| PriceTick {
                    mint: mint.clone(),
                    price: *price,
                    time_ms: now,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_returns_only_known_mints() {
        let feed = MockPriceFeed::new().with_price("BONK", "1.5");

        let ticks = feed
            .fetch_prices(&[
                Mint::new("BONK".to_string()),
                Mint::new("WIF".to_string()),
            ])
            .await
            .unwrap();

        assert_eq!(ticks.len(), 1);
        assert_eq!(ticks[0].mint.as_str(), "BONK");
    }

    #[tokio::test]
    async fn test_mock_fail_next_fails_once() {
        let feed = MockPriceFeed::new().with_price("BONK", "1.5");
        feed.fail_next();

        assert!(feed
            .fetch_prices(&[Mint::new("BONK".to_string())])
            .await
            .is_err());
        assert!(feed
            .fetch_prices(&[Mint::new("BONK".to_string())])
            .await
            .is_ok());
    }
}
