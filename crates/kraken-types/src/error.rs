//! Error types for order book reconstruction and the book feed

use std::time::Duration;
use thiserror::Error;

use crate::BookSide;

/// Structural problems with the snapshot/update stream
///
/// Any of these aborts the whole message; the caller should resubscribe.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// Snapshot did not carry exactly `depth` levels on one side
    #[error("snapshot {side} side has {actual} levels, expected exactly {expected}")]
    SnapshotDepth {
        side: BookSide,
        expected: usize,
        actual: usize,
    },

    /// Snapshot contained a level that could not be parsed
    #[error("snapshot {side} side is malformed: {reason}")]
    MalformedSnapshot { side: BookSide, reason: String },

    /// Update arrived while no snapshot had been applied
    #[error("update received before snapshot")]
    UpdateBeforeSnapshot,
}

/// A single level record that could not be parsed
///
/// Skipped and counted inside update batches, never fatal on its own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed {field} {value:?}: {reason}")]
pub struct MalformedLevel {
    /// Field that failed (`price`, `volume` or `timestamp`)
    pub field: &'static str,
    /// Offending raw value
    pub value: String,
    /// Parser message
    pub reason: String,
}

impl MalformedLevel {
    /// Create a new malformed level error
    pub fn new(field: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Checksum mismatch that survived at least one full resync cycle
///
/// Reported for observability only; processing continues and the book keeps
/// resynchronizing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "book integrity lost for {pair}: expected checksum {expected}, computed {computed} \
     ({failed_cycles} consecutive failed cycles)"
)]
pub struct BookIntegrityError {
    /// Trading pair
    pub pair: String,
    /// Checksum sent by the exchange
    pub expected: String,
    /// Checksum computed from the local book
    pub computed: String,
    /// Consecutive verifications that failed without a valid one in between
    pub failed_cycles: u32,
}

/// Errors raised by the local book
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookError {
    /// Snapshot shape or message ordering broke the feed contract
    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] ProtocolViolation),

    /// Top of book queried while that side holds no levels
    #[error("{side} side of the book is empty")]
    EmptyBook { side: BookSide },

    /// Checksum kept failing across resyncs
    #[error(transparent)]
    Integrity(#[from] BookIntegrityError),
}

impl BookError {
    /// Returns true if the caller should drop the book and resubscribe
    pub fn requires_resync(&self) -> bool {
        matches!(self, Self::ProtocolViolation(_) | Self::Integrity(_))
    }

    /// Returns true if this only means "no data yet"
    pub fn is_empty_book(&self) -> bool {
        matches!(self, Self::EmptyBook { .. })
    }
}

/// Main error type for feed and connection operations
#[derive(Error, Debug)]
pub enum KrakenError {
    // === Connection Errors ===
    /// Failed to establish WebSocket connection
    #[error("Failed to connect to {url}: {source}")]
    ConnectionFailed {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// Connection attempt timed out
    #[error("Connection timeout after {timeout:?} to {url}")]
    ConnectionTimeout { url: String, timeout: Duration },

    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    // === Protocol Errors ===
    /// Failed to parse or encode a JSON message
    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String, raw: Option<String> },

    /// Subscription was rejected by server
    #[error("Subscription rejected for {pair}: {reason}")]
    SubscriptionRejected { pair: String, reason: String },

    /// Local book rejected a message
    #[error(transparent)]
    Book(#[from] BookError),

    // === Internal Errors ===
    /// Feed is shutting down
    #[error("Shutdown in progress")]
    ShuttingDown,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl KrakenError {
    /// Returns true if this error is potentially recoverable via retry
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::ConnectionTimeout { .. } | Self::WebSocket(_) => {
                true
            }
            Self::Book(e) => e.requires_resync(),
            _ => false,
        }
    }

    /// Returns suggested retry delay, if applicable
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::ConnectionFailed { .. } => Some(Duration::from_millis(100)),
            Self::ConnectionTimeout { .. } => Some(Duration::from_millis(500)),
            _ => None,
        }
    }

    /// Returns true if this error requires reconnection
    pub fn requires_reconnect(&self) -> bool {
        matches!(
            self,
            Self::WebSocket(_) | Self::ConnectionFailed { .. } | Self::ConnectionTimeout { .. }
        )
    }

    /// Returns true if the affected book must be rebuilt from a fresh snapshot
    pub fn requires_resync(&self) -> bool {
        match self {
            Self::Book(e) => e.requires_resync(),
            _ => false,
        }
    }

    /// Create an invalid JSON error
    pub fn invalid_json(message: impl Into<String>, raw: Option<&str>) -> Self {
        Self::InvalidJson {
            message: message.into(),
            raw: raw.map(str::to_string),
        }
    }

    /// Create a subscription rejected error
    pub fn subscription_rejected(pair: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SubscriptionRejected {
            pair: pair.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for feed operations
pub type KrakenResult<T> = Result<T, KrakenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_violation_requires_resync() {
        let err = BookError::from(ProtocolViolation::SnapshotDepth {
            side: BookSide::Bid,
            expected: 10,
            actual: 9,
        });
        assert!(err.requires_resync());
        assert!(err.to_string().contains("9 levels"));

        let err = BookError::from(ProtocolViolation::UpdateBeforeSnapshot);
        assert!(err.requires_resync());
    }

    #[test]
    fn test_empty_book_is_local() {
        let err = BookError::EmptyBook { side: BookSide::Ask };
        assert!(!err.requires_resync());
        assert!(err.is_empty_book());
        assert_eq!(err.to_string(), "ask side of the book is empty");
    }

    #[test]
    fn test_error_retryable() {
        let err = KrakenError::WebSocket("connection reset".into());
        assert!(err.is_retryable());
        assert!(err.requires_reconnect());

        let err = KrakenError::Configuration("no pairs".into());
        assert!(!err.is_retryable());
        assert_eq!(err.retry_after(), None);
    }

    #[test]
    fn test_book_error_conversion() {
        let err: KrakenError = BookError::from(ProtocolViolation::UpdateBeforeSnapshot).into();
        assert!(err.requires_resync());
        assert!(!err.requires_reconnect());
    }

    #[test]
    fn test_integrity_error_display() {
        let err = BookIntegrityError {
            pair: "XBT/USD".into(),
            expected: "974947235".into(),
            computed: "12345".into(),
            failed_cycles: 2,
        };
        let text = err.to_string();
        assert!(text.contains("XBT/USD"));
        assert!(text.contains("2 consecutive"));
    }
}
