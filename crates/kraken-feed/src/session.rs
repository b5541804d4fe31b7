//! Per-pair book session
//!
//! Owns one [`Orderbook`] and drives it from parsed book messages. Handling
//! is synchronous: resubscription requests go to a [`CommandSink`] and book
//! views to a [`DisplaySink`], and the connection does the I/O afterwards.
//!
//! # Lifecycle
//!
//! ```text
//! Subscribing → AwaitingSnapshot → Live
//!                     ↑              │ mismatch / violation
//!                     └─ Resyncing ←─┘
//! ```

use crate::events::{BookEvent, ResyncReason};
use crate::ports::{CommandSink, DisplaySink};
use kraken_book::{Orderbook, OrderbookSnapshot, Verdict};
use kraken_types::{BookError, BookMessage, BookPayload, BookUpdate, Depth, RawLevel, SubscriptionRequest};
use tracing::{debug, info, warn};

/// Where a session is in its subscription lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Subscribe sent (or about to be), not yet confirmed
    Subscribing,
    /// Subscription confirmed, waiting for the snapshot
    AwaitingSnapshot,
    /// Snapshot applied, updates are being verified
    Live,
    /// Book dropped, unsubscribe + subscribe in flight
    Resyncing,
}

/// Per-pair processing counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeedStats {
    /// Book messages handled
    pub messages: u64,
    /// Snapshots applied
    pub snapshots: u64,
    /// Updates applied
    pub updates: u64,
    /// Level records skipped as malformed
    pub malformed_records: u64,
    /// Failed checksum verifications
    pub checksum_failures: u64,
    /// Resyncs requested
    pub resyncs: u64,
    /// Integrity errors raised
    pub integrity_errors: u64,
    /// Updates dropped while no snapshot was applied
    pub dropped_updates: u64,
    /// Subscriptions the server refused
    pub rejections: u64,
}

impl FeedStats {
    /// Fold another session's counters into this one
    pub fn merge(&mut self, other: FeedStats) {
        self.messages += other.messages;
        self.snapshots += other.snapshots;
        self.updates += other.updates;
        self.malformed_records += other.malformed_records;
        self.checksum_failures += other.checksum_failures;
        self.resyncs += other.resyncs;
        self.integrity_errors += other.integrity_errors;
        self.dropped_updates += other.dropped_updates;
        self.rejections += other.rejections;
    }
}

/// Book state and lifecycle for one subscribed pair
#[derive(Debug)]
pub struct BookSession {
    pair: String,
    depth: Depth,
    book: Orderbook,
    phase: SessionPhase,
    stats: FeedStats,
}

impl BookSession {
    /// Create a session for `pair`
    pub fn new(pair: impl Into<String>, depth: Depth, integrity_threshold: u32) -> Self {
        let pair = pair.into();
        Self {
            book: Orderbook::new(pair.clone(), depth).with_integrity_threshold(integrity_threshold),
            pair,
            depth,
            phase: SessionPhase::Subscribing,
            stats: FeedStats::default(),
        }
    }

    /// Trading pair
    pub fn pair(&self) -> &str {
        &self.pair
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Processing counters
    pub fn stats(&self) -> FeedStats {
        self.stats
    }

    /// The managed book
    pub fn book(&self) -> &Orderbook {
        &self.book
    }

    /// Copy out the current book
    pub fn snapshot(&self) -> OrderbookSnapshot {
        self.book.snapshot()
    }

    /// Server confirmed the subscription
    pub fn on_subscribed(&mut self) {
        if self.phase != SessionPhase::Live {
            self.phase = SessionPhase::AwaitingSnapshot;
        }
    }

    /// Server confirmed an unsubscribe
    ///
    /// Ignored while resyncing; the matching subscribe is already in flight.
    pub fn on_unsubscribed(&mut self) {
        if self.phase != SessionPhase::Resyncing {
            self.book.reset();
            self.phase = SessionPhase::Subscribing;
        }
    }

    /// Server rejected the subscription
    ///
    /// The pair stays without a book until the next reconnect restores it.
    pub fn on_rejected(&mut self) {
        self.stats.rejections += 1;
        if self.phase == SessionPhase::Resyncing {
            warn!(pair = %self.pair, "Resubscribe rejected, book stays empty until reconnect");
        } else {
            warn!(pair = %self.pair, "Subscription rejected, book stays empty until reconnect");
        }
        self.book.reset();
        self.phase = SessionPhase::Subscribing;
    }

    /// Connection lost: the book is stale until a new snapshot arrives
    pub fn reset(&mut self) {
        self.book.reset();
        self.phase = SessionPhase::Subscribing;
    }

    /// Apply one book message
    ///
    /// Returns the events to publish, in order.
    pub fn handle_book(
        &mut self,
        message: &BookMessage,
        commands: &mut dyn CommandSink,
        display: &mut dyn DisplaySink,
    ) -> Vec<BookEvent> {
        self.stats.messages += 1;
        match &message.payload {
            BookPayload::Snapshot {
                asks,
                bids,
                malformed,
            } => self.handle_snapshot(asks, bids, *malformed, commands, display),
            BookPayload::Update(update) => self.handle_update(update, commands, display),
        }
    }

    fn handle_snapshot(
        &mut self,
        asks: &[RawLevel],
        bids: &[RawLevel],
        malformed: usize,
        commands: &mut dyn CommandSink,
        display: &mut dyn DisplaySink,
    ) -> Vec<BookEvent> {
        self.stats.malformed_records += malformed as u64;

        match self.book.on_snapshot(bids, asks) {
            Ok(()) => {
                info!(pair = %self.pair, bids = bids.len(), asks = asks.len(), "snapshot applied");
                self.stats.snapshots += 1;
                self.phase = SessionPhase::Live;

                let snapshot = self.book.snapshot();
                display.show(&snapshot);
                vec![BookEvent::Snapshot {
                    pair: self.pair.clone(),
                    snapshot,
                }]
            }
            Err(error) => self.violation(error, commands, display),
        }
    }

    fn handle_update(
        &mut self,
        update: &BookUpdate,
        commands: &mut dyn CommandSink,
        display: &mut dyn DisplaySink,
    ) -> Vec<BookEvent> {
        if self.phase != SessionPhase::Live {
            debug!(pair = %self.pair, phase = ?self.phase, "dropping update without snapshot");
            self.stats.dropped_updates += 1;
            return Vec::new();
        }

        self.stats.updates += 1;
        self.stats.malformed_records += update.malformed as u64;

        let outcome = match self
            .book
            .on_update_message(&update.asks, &update.bids, update.checksum.as_deref())
        {
            Ok(outcome) => outcome,
            Err(error) => return self.violation(error, commands, display),
        };
        self.stats.malformed_records += outcome.stats.malformed as u64;

        match outcome.verdict {
            None | Some(Verdict::InSync) => {
                let snapshot = self.book.snapshot();
                display.show(&snapshot);
                vec![BookEvent::Update {
                    pair: self.pair.clone(),
                    snapshot,
                }]
            }
            Some(Verdict::Resync { result, integrity }) => {
                self.stats.checksum_failures += 1;
                let mut events = vec![BookEvent::ChecksumMismatch {
                    pair: self.pair.clone(),
                    result: result.clone(),
                }];
                if let Some(err) = integrity {
                    self.stats.integrity_errors += 1;
                    events.push(BookEvent::IntegrityError(err));
                }
                events.push(self.request_resync(
                    ResyncReason::ChecksumMismatch(result),
                    commands,
                    display,
                ));
                events
            }
        }
    }

    fn violation(
        &mut self,
        error: BookError,
        commands: &mut dyn CommandSink,
        display: &mut dyn DisplaySink,
    ) -> Vec<BookEvent> {
        warn!(pair = %self.pair, %error, "book message rejected");
        vec![
            BookEvent::ProtocolViolation {
                pair: self.pair.clone(),
                error: error.clone(),
            },
            self.request_resync(ResyncReason::ProtocolViolation(error), commands, display),
        ]
    }

    /// Drop the book and ask for a fresh snapshot (unsubscribe + subscribe)
    pub fn request_resync(
        &mut self,
        reason: ResyncReason,
        commands: &mut dyn CommandSink,
        display: &mut dyn DisplaySink,
    ) -> BookEvent {
        if self.book.is_synced() {
            self.book.reset();
        }
        self.stats.resyncs += 1;
        self.phase = SessionPhase::Resyncing;

        info!(pair = %self.pair, ?reason, "resubscribing for a fresh snapshot");
        let pairs = vec![self.pair.clone()];
        commands.submit(SubscriptionRequest::unsubscribe(pairs.clone(), self.depth));
        commands.submit(SubscriptionRequest::subscribe(pairs, self.depth));

        let result = match &reason {
            ResyncReason::ChecksumMismatch(result) => Some(result),
            ResyncReason::ProtocolViolation(_) => None,
        };
        display.resyncing(&self.pair, result);

        BookEvent::ResyncRequested {
            pair: self.pair.clone(),
            reason,
        }
    }
}
