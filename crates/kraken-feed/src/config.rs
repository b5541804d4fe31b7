//! Feed configuration

use crate::endpoint::Endpoint;
use crate::reconnect::ReconnectConfig;
use kraken_book::DEFAULT_INTEGRITY_THRESHOLD;
use kraken_types::{Depth, KrakenError, KrakenResult};
use std::time::Duration;

/// Configuration for a [`FeedConnection`](crate::FeedConnection)
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// WebSocket endpoint
    pub endpoint: Endpoint,
    /// Pairs to maintain books for, e.g. `XBT/USD`
    pub pairs: Vec<String>,
    /// Book depth to subscribe with
    pub depth: Depth,
    /// Reconnection settings
    pub reconnect: ReconnectConfig,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Failed verification cycles before an integrity error is raised
    pub integrity_threshold: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::Public,
            pairs: Vec::new(),
            depth: Depth::D10,
            reconnect: ReconnectConfig::default(),
            connect_timeout: Duration::from_secs(10),
            integrity_threshold: DEFAULT_INTEGRITY_THRESHOLD,
        }
    }
}

impl FeedConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<Endpoint>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Add one pair
    pub fn with_pair(mut self, pair: impl Into<String>) -> Self {
        let pair = pair.into();
        if !self.pairs.contains(&pair) {
            self.pairs.push(pair);
        }
        self
    }

    /// Add several pairs
    pub fn with_pairs<I, S>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        pairs.into_iter().fold(self, |config, pair| config.with_pair(pair))
    }

    /// Set orderbook depth
    pub fn with_depth(mut self, depth: Depth) -> Self {
        self.depth = depth;
        self
    }

    /// Set reconnection config
    pub fn with_reconnect(mut self, config: ReconnectConfig) -> Self {
        self.reconnect = config;
        self
    }

    /// Disable automatic reconnection
    pub fn without_reconnect(mut self) -> Self {
        self.reconnect = ReconnectConfig::disabled();
        self
    }

    /// Set connection timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the integrity threshold
    pub fn with_integrity_threshold(mut self, threshold: u32) -> Self {
        self.integrity_threshold = threshold;
        self
    }

    /// Check the config before connecting
    pub fn validate(&self) -> KrakenResult<()> {
        if self.pairs.is_empty() {
            return Err(KrakenError::Configuration("at least one pair is required".into()));
        }
        if let Some(pair) = self.pairs.iter().find(|p| !is_valid_pair(p)) {
            return Err(KrakenError::Configuration(format!(
                "invalid pair {:?}, expected BASE/QUOTE",
                pair
            )));
        }
        if !self.endpoint.is_valid() {
            return Err(KrakenError::Configuration(format!(
                "endpoint {} is not a WebSocket URL",
                self.endpoint
            )));
        }
        if self.connect_timeout.is_zero() {
            return Err(KrakenError::Configuration("connect timeout must be non-zero".into()));
        }
        if self.integrity_threshold == 0 {
            return Err(KrakenError::Configuration(
                "integrity threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn is_valid_pair(pair: &str) -> bool {
    match pair.split_once('/') {
        Some((base, quote)) => {
            !base.is_empty()
                && !quote.is_empty()
                && pair.chars().all(|c| c.is_ascii_alphanumeric() || c == '/' || c == '.')
        }
        None => false,
    }
}
