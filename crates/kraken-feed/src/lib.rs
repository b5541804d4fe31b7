//! Reconnecting Kraken book feed with checksum-driven resync
//!
//! This crate connects to Kraken's WebSocket v1 API, keeps one
//! checksum-verified [`Orderbook`](kraken_book::Orderbook) per configured
//! pair, and rebuilds a book from a fresh snapshot whenever verification
//! fails.
//!
//! # Features
//!
//! - Automatic reconnection with exponential backoff
//! - Subscription restoration after reconnect
//! - Resync by unsubscribe + subscribe on checksum mismatch
//! - Event channel plus observability hooks
//! - Copy-out book views through a [`DisplaySink`]
//!
//! # Example
//!
//! ```no_run
//! use kraken_feed::{FeedConfig, FeedConnection, Endpoint};
//! use kraken_types::Depth;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = FeedConfig::new()
//!         .with_endpoint(Endpoint::Public)
//!         .with_pairs(["XBT/USD", "ETH/USD"])
//!         .with_depth(Depth::D10);
//!
//!     let feed = Arc::new(FeedConnection::new(config));
//!     let mut events = feed.take_event_receiver().unwrap();
//!
//!     // Spawn connection task
//!     let runner = feed.clone();
//!     tokio::spawn(async move { runner.run().await });
//!
//!     // Process events
//!     while let Some(event) = events.recv().await {
//!         println!("{:?}", event);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod endpoint;
pub mod events;
pub mod hooks;
pub mod ports;
pub mod reconnect;
pub mod session;
pub mod subscription;
pub mod transport;

// Re-export main types
pub use config::FeedConfig;
pub use connection::{ConnectionState, FeedConnection};
pub use endpoint::Endpoint;
pub use events::{
    BookEvent, ConnectionEvent, DisconnectReason, FeedEvent, ResyncReason, SubscriptionEvent,
};
pub use hooks::{ChecksumInfo, ConnectInfo, Hooks, SubscriptionInfo};
pub use ports::{CommandSink, DisplaySink, NullDisplay, Outbox};
pub use reconnect::{Backoff, ReconnectConfig};
pub use session::{BookSession, FeedStats, SessionPhase};
pub use subscription::{PairState, SubscriptionManager};
pub use transport::{Transport, TransportError, WsTransport};

#[cfg(any(test, feature = "test-utils"))]
pub use transport::{MockHandle, MockTransport};
