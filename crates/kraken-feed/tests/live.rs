//! Tests against Kraken's public WebSocket API
//!
//! These tests make real WebSocket connections.
//! Run with: cargo test -p kraken-feed --test live -- --ignored

use kraken_feed::{BookEvent, ConnectionEvent, FeedConfig, FeedConnection, FeedEvent};
use kraken_types::Depth;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Test that we can establish a WebSocket connection
#[tokio::test]
#[ignore = "Makes real WebSocket connection"]
async fn test_live_connection() {
    let feed = Arc::new(FeedConnection::new(FeedConfig::new().with_pair("XBT/USD")));
    let mut events = feed.take_event_receiver().expect("Should have receiver");

    let runner = feed.clone();
    let task = tokio::spawn(async move { runner.run().await });

    let connected = timeout(Duration::from_secs(10), async {
        while let Some(event) = events.recv().await {
            if let FeedEvent::Connection(ConnectionEvent::Connected { .. }) = event {
                return true;
            }
        }
        false
    })
    .await;

    assert!(connected.is_ok(), "Connection timed out");
    assert!(connected.unwrap(), "Should have connected");

    feed.shutdown();
    let _ = timeout(Duration::from_secs(5), task).await;
}

/// Test that live updates keep verifying against the exchange checksum
#[tokio::test]
#[ignore = "Makes real WebSocket connection"]
async fn test_live_book_stays_verified() {
    let config = FeedConfig::new()
        .with_pairs(["XBT/USD", "ETH/USD"])
        .with_depth(Depth::D10);
    let feed = Arc::new(FeedConnection::new(config));
    let mut events = feed.take_event_receiver().expect("Should have receiver");

    let runner = feed.clone();
    let task = tokio::spawn(async move { runner.run().await });

    let mut verified = 0;
    let result = timeout(Duration::from_secs(30), async {
        while let Some(event) = events.recv().await {
            match event {
                FeedEvent::Book(BookEvent::Update { snapshot, .. }) => {
                    if snapshot.last_verification.is_some_and(|r| r.valid) {
                        verified += 1;
                    }
                    if verified >= 20 {
                        break;
                    }
                }
                FeedEvent::Book(BookEvent::IntegrityError(err)) => {
                    panic!("integrity error: {}", err);
                }
                _ => {}
            }
        }
    })
    .await;

    assert!(result.is_ok(), "Timed out waiting for verified updates");
    assert!(feed.snapshot("XBT/USD").is_some());

    feed.shutdown();
    let _ = timeout(Duration::from_secs(5), task).await;
}
