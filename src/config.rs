use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub price_feed_url: String,
    /// Poll cadence for the price feed in milliseconds. The default of 150ms
    /// keeps live PnL in the 5-10Hz band.
    pub price_poll_ms: u64,
    /// Mints the price poller keeps quotes warm for.
    pub tracked_mints: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let price_feed_url = env_map
            .get("PRICE_FEED_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("PRICE_FEED_URL".to_string()))?;

        let price_poll_ms = env_map
            .get("PRICE_POLL_MS")
            .map(|s| s.as_str())
            .unwrap_or("150")
            .parse::<u64>()
            .ok()
            .filter(|ms| *ms > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "PRICE_POLL_MS".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;

        let tracked_mints = parse_tracked_mints_from_map(&env_map)?;

        Ok(Config {
            port,
            database_path,
            price_feed_url,
            price_poll_ms,
            tracked_mints,
        })
    }
}

fn parse_tracked_mints_from_map(
    env_map: &HashMap<String, String>,
) -> Result<Vec<String>, ConfigError> {
    if let Some(mints_str) = env_map.get("TRACKED_MINTS") {
        Ok(mints_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    } else if let Some(file_path) = env_map.get("TRACKED_MINTS_FILE") {
        let content = std::fs::read_to_string(file_path).map_err(|_| {
            ConfigError::InvalidValue(
                "TRACKED_MINTS_FILE".to_string(),
                "file not found or unreadable".to_string(),
            )
        })?;
        Ok(content
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    } else {
        Ok(Vec::new())
    }
}
