//! Narrow interfaces between the book sessions and the outside world
//!
//! A [`BookSession`](crate::BookSession) never touches the socket or the
//! screen directly. Outbound requests go to a [`CommandSink`], finished book
//! views go to a [`DisplaySink`]. The feed source is the
//! [`Transport`](crate::transport::Transport).

use kraken_book::{OrderbookSnapshot, ReconciliationResult};
use kraken_types::SubscriptionRequest;
use tokio::sync::mpsc;

/// Receives subscribe / unsubscribe requests issued by sessions
///
/// Submission is synchronous so book handling never suspends mid-message;
/// the connection flushes queued requests after the handler returns.
pub trait CommandSink {
    /// Queue a request for sending
    fn submit(&mut self, request: SubscriptionRequest);
}

/// Requests queued while one inbound message is handled
#[derive(Debug, Default)]
pub struct Outbox {
    requests: Vec<SubscriptionRequest>,
}

impl Outbox {
    /// Create an empty outbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if nothing was queued
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Take the queued requests in submission order
    pub fn drain(&mut self) -> Vec<SubscriptionRequest> {
        std::mem::take(&mut self.requests)
    }
}

impl CommandSink for Outbox {
    fn submit(&mut self, request: SubscriptionRequest) {
        self.requests.push(request);
    }
}

/// Receives copy-out book views for presentation
pub trait DisplaySink: Send {
    /// The book changed
    ///
    /// Called after snapshots and after every accepted update. Updates that
    /// carried no checksum were not verified, so `last_verification` may
    /// describe an earlier message.
    fn show(&mut self, snapshot: &OrderbookSnapshot);

    /// The book for `pair` was dropped and is being rebuilt
    fn resyncing(&mut self, _pair: &str, _result: Option<&ReconciliationResult>) {}
}

/// Display sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDisplay;

impl DisplaySink for NullDisplay {
    fn show(&mut self, _snapshot: &OrderbookSnapshot) {}
}

/// Forwards every book view into a channel
impl DisplaySink for mpsc::UnboundedSender<OrderbookSnapshot> {
    fn show(&mut self, snapshot: &OrderbookSnapshot) {
        let _ = self.send(snapshot.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kraken_types::Depth;

    #[test]
    fn test_outbox_keeps_order() {
        let mut outbox = Outbox::new();
        outbox.submit(SubscriptionRequest::unsubscribe(vec!["XBT/USD".into()], Depth::D10));
        outbox.submit(SubscriptionRequest::subscribe(vec!["XBT/USD".into()], Depth::D10));

        let requests = outbox.drain();
        assert_eq!(requests.len(), 2);
        assert!(!requests[0].is_subscribe());
        assert!(requests[1].is_subscribe());
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_channel_display() {
        let (mut tx, mut rx) = mpsc::unbounded_channel::<OrderbookSnapshot>();
        let book = kraken_book::Orderbook::new("XBT/USD", Depth::D10);
        tx.show(&book.snapshot());
        assert_eq!(rx.try_recv().unwrap().pair, "XBT/USD");

        // resync notices are not forwarded as views
        tx.resyncing("XBT/USD", None);
        assert!(rx.try_recv().is_err());
    }
}
