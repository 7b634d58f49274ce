//! Configuration module for the feed handler

use serde::Deserialize;
use std::env;
use std::str::FromStr;

use crate::error::FeedError;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Markets to subscribe to, as exchange-native pair names
    /// (e.g., ["XBT/USD", "ETH/USD"])
    pub pairs: Vec<String>,

    /// WebSocket endpoint for the exchange
    pub ws_endpoint: String,

    /// Order book depth requested on book subscriptions
    pub book_depth: u32,

    /// Reconnection settings
    pub reconnect_delay_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let pairs: Vec<String> = env::var("PAIRS")
            .unwrap_or_else(|_| "XBT/USD,ETH/USD".to_string())
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .collect();

        Ok(Self {
            pairs,
            ws_endpoint: env::var("WS_ENDPOINT")
                .unwrap_or_else(|_| "wss://ws.kraken.com".to_string()),
            book_depth: numeric_var("BOOK_DEPTH", 100)?,
            reconnect_delay_ms: numeric_var("RECONNECT_DELAY_MS", 1000)?,
        })
    }
}

/// Read a numeric environment variable, rejecting an unparseable value
/// rather than silently falling back to the default.
fn numeric_var<T: FromStr>(name: &str, default: T) -> Result<T, FeedError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            FeedError::ConfigError(format!("{name} must be numeric, got {raw:?}"))
        }),
        Err(_) => Ok(default),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pairs: vec!["XBT/USD".to_string()],
            ws_endpoint: "wss://ws.kraken.com".to_string(),
            book_depth: 100,
            reconnect_delay_ms: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Distinct variable names per test; the process environment is global.

    #[test]
    fn test_numeric_var_rejects_garbage() {
        env::set_var("MARKETFEED_TEST_BAD_DEPTH", "not-a-number");
        let err = numeric_var::<u32>("MARKETFEED_TEST_BAD_DEPTH", 100).unwrap_err();
        assert!(matches!(err, FeedError::ConfigError(_)));
        env::remove_var("MARKETFEED_TEST_BAD_DEPTH");
    }

    #[test]
    fn test_numeric_var_defaults_when_unset() {
        let depth = numeric_var::<u64>("MARKETFEED_TEST_UNSET_DELAY", 1000).unwrap();
        assert_eq!(depth, 1000);
    }

    #[test]
    fn test_numeric_var_parses_trimmed_value() {
        env::set_var("MARKETFEED_TEST_GOOD_DEPTH", " 25 ");
        let depth = numeric_var::<u32>("MARKETFEED_TEST_GOOD_DEPTH", 100).unwrap();
        assert_eq!(depth, 25);
        env::remove_var("MARKETFEED_TEST_GOOD_DEPTH");
    }
}
