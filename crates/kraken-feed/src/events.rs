//! Events published by the feed
//!
//! Everything carrying book data is an owned copy; consumers never see the
//! live book.

use kraken_book::{OrderbookSnapshot, ReconciliationResult};
use kraken_types::{BookError, BookIntegrityError, SystemStatus};
use std::time::Duration;

/// Reason for disconnection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Server closed the connection
    ServerClosed,
    /// Network error occurred
    NetworkError(String),
    /// Client requested shutdown
    Shutdown,
}

/// Connection lifecycle events
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Transport connected and the server announced itself
    Connected {
        /// Connection ID from server
        connection_id: Option<u64>,
        /// API version reported by server
        version: String,
        /// Exchange status at connect time
        status: SystemStatus,
    },
    /// Exchange status changed after connect
    StatusChanged {
        /// New status
        status: SystemStatus,
    },
    /// Connection was lost
    Disconnected {
        /// Reason for disconnection
        reason: DisconnectReason,
    },
    /// Waiting before the next connection attempt
    Reconnecting {
        /// Attempt number (1-indexed)
        attempt: u32,
        /// Delay before this attempt
        delay: Duration,
    },
    /// Reconnection attempts exhausted
    ReconnectFailed {
        /// Final error
        error: String,
    },
}

/// Subscription status changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionEvent {
    /// Server confirmed the book subscription
    Subscribed {
        /// Trading pair
        pair: String,
        /// Channel ID used in data arrays
        channel_id: Option<u64>,
        /// Channel name, e.g. "book-10"
        channel_name: Option<String>,
    },
    /// Subscription was removed
    Unsubscribed {
        /// Trading pair
        pair: String,
    },
    /// Subscription was rejected
    Rejected {
        /// Trading pair (empty if the server did not say)
        pair: String,
        /// Rejection reason
        reason: String,
    },
}

/// Why a book was dropped and resubscribed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResyncReason {
    /// Local checksum disagreed with the server's
    ChecksumMismatch(ReconciliationResult),
    /// Snapshot or update broke the protocol
    ProtocolViolation(BookError),
}

/// Book events for one pair
#[derive(Debug, Clone)]
pub enum BookEvent {
    /// Snapshot applied
    Snapshot {
        /// Trading pair
        pair: String,
        /// Book after the snapshot
        snapshot: OrderbookSnapshot,
    },
    /// Update applied and verified
    Update {
        /// Trading pair
        pair: String,
        /// Book after the update
        snapshot: OrderbookSnapshot,
    },
    /// Checksum verification failed
    ChecksumMismatch {
        /// Trading pair
        pair: String,
        /// The failing comparison
        result: ReconciliationResult,
    },
    /// Message rejected by the book
    ProtocolViolation {
        /// Trading pair
        pair: String,
        /// What was wrong
        error: BookError,
    },
    /// Book dropped, fresh snapshot requested
    ResyncRequested {
        /// Trading pair
        pair: String,
        /// Trigger
        reason: ResyncReason,
    },
    /// Mismatch persisted across resyncs
    IntegrityError(BookIntegrityError),
}

impl BookEvent {
    /// Pair this event belongs to
    pub fn pair(&self) -> &str {
        match self {
            Self::Snapshot { pair, .. }
            | Self::Update { pair, .. }
            | Self::ChecksumMismatch { pair, .. }
            | Self::ProtocolViolation { pair, .. }
            | Self::ResyncRequested { pair, .. } => pair,
            Self::IntegrityError(err) => &err.pair,
        }
    }
}

/// Unified event type
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// Connection-related event
    Connection(ConnectionEvent),
    /// Subscription-related event
    Subscription(SubscriptionEvent),
    /// Book event
    Book(BookEvent),
    /// Heartbeat received
    Heartbeat,
}

impl From<ConnectionEvent> for FeedEvent {
    fn from(event: ConnectionEvent) -> Self {
        FeedEvent::Connection(event)
    }
}

impl From<SubscriptionEvent> for FeedEvent {
    fn from(event: SubscriptionEvent) -> Self {
        FeedEvent::Subscription(event)
    }
}

impl From<BookEvent> for FeedEvent {
    fn from(event: BookEvent) -> Self {
        FeedEvent::Book(event)
    }
}
