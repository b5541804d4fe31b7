//! WebSocket endpoint definitions

use std::fmt;

/// Kraken public WebSocket (v1) endpoints carrying the `book` channel
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Endpoint {
    /// Production public market data (default)
    #[default]
    Public,
    /// Public beta/testing
    PublicBeta,
    /// Any other URL (local replay server, proxy)
    Custom(String),
}

impl Endpoint {
    /// Get the WebSocket URL for this endpoint
    pub fn url(&self) -> &str {
        match self {
            Self::Public => "wss://ws.kraken.com",
            Self::PublicBeta => "wss://beta-ws.kraken.com",
            Self::Custom(url) => url,
        }
    }

    /// Check if the URL uses a WebSocket scheme
    pub fn is_valid(&self) -> bool {
        let url = self.url();
        url.starts_with("wss://") || url.starts_with("ws://")
    }
}

impl From<&str> for Endpoint {
    fn from(url: &str) -> Self {
        Self::Custom(url.to_string())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_urls() {
        assert_eq!(Endpoint::Public.url(), "wss://ws.kraken.com");
        assert_eq!(Endpoint::PublicBeta.url(), "wss://beta-ws.kraken.com");
        assert_eq!(Endpoint::from("ws://127.0.0.1:9000").url(), "ws://127.0.0.1:9000");
    }

    #[test]
    fn test_endpoint_validation() {
        assert!(Endpoint::Public.is_valid());
        assert!(Endpoint::Custom("ws://localhost".into()).is_valid());
        assert!(!Endpoint::Custom("https://ws.kraken.com".into()).is_valid());
    }
}
