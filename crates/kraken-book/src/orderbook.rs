//! Checksum-verified orderbook
//!
//! Wraps a [`BookStore`] with verification after every update and the
//! resync decision from [`ReconciliationController`].
//!
//! # State Machine
//!
//! ```text
//! AwaitingSnapshot → Synced → (checksum mismatch) → AwaitingSnapshot
//! ```
//!
//! On a mismatch the whole book is discarded (never partially) and the
//! resync handler fires; the feed layer then resubscribes and the next
//! snapshot rebuilds the book.

use crate::{
    checksum::{ChecksumVerifier, ReconciliationResult},
    reconcile::{ReconciliationController, Verdict},
    store::{BookState, BookStore, UpdateStats},
};
use kraken_types::{BookError, BookSide, Depth, PriceLevel, RawLevel};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Callback fired when the book has been dropped and needs a fresh snapshot
pub type ResyncHandler = Box<dyn FnMut(&ReconciliationResult) + Send>;

/// Result of applying one update message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Counters summed over every side in the message
    pub stats: UpdateStats,
    /// Verification verdict, `None` if the message carried no checksum
    pub verdict: Option<Verdict>,
}

impl UpdateOutcome {
    /// Returns true if the book was dropped and needs a new snapshot
    pub fn requires_resync(&self) -> bool {
        self.verdict.as_ref().is_some_and(Verdict::requires_resync)
    }
}

/// Managed orderbook with checksum validation and resync signalling
pub struct Orderbook {
    pair: String,
    store: BookStore,
    controller: ReconciliationController,
    on_resync: Option<ResyncHandler>,
}

impl fmt::Debug for Orderbook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orderbook")
            .field("pair", &self.pair)
            .field("store", &self.store)
            .field("controller", &self.controller)
            .field("on_resync", &self.on_resync.is_some())
            .finish()
    }
}

impl Orderbook {
    /// Create a new orderbook for a pair
    pub fn new(pair: impl Into<String>, depth: Depth) -> Self {
        Self {
            pair: pair.into(),
            store: BookStore::new(depth),
            controller: ReconciliationController::new(),
            on_resync: None,
        }
    }

    /// Escalate mismatches to integrity errors after `threshold` failed cycles
    pub fn with_integrity_threshold(mut self, threshold: u32) -> Self {
        self.controller = ReconciliationController::with_integrity_threshold(threshold);
        self
    }

    /// Register the callback fired whenever a resync is required
    pub fn set_resync_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&ReconciliationResult) + Send + 'static,
    {
        self.on_resync = Some(Box::new(handler));
    }

    /// Get the pair
    pub fn pair(&self) -> &str {
        &self.pair
    }

    /// Get the current state
    pub fn state(&self) -> BookState {
        self.store.state()
    }

    /// Check if the orderbook holds a snapshot
    pub fn is_synced(&self) -> bool {
        self.store.is_initialized()
    }

    /// Underlying level store
    pub fn store(&self) -> &BookStore {
        &self.store
    }

    /// Verification history for this book
    pub fn reconciliation(&self) -> &ReconciliationController {
        &self.controller
    }

    /// Apply a full snapshot
    pub fn on_snapshot(&mut self, bids: &[RawLevel], asks: &[RawLevel]) -> Result<(), BookError> {
        self.store.initialize_from_snapshot(bids, asks)
    }

    /// Apply one side's update records and verify against `checksum`
    pub fn on_update(
        &mut self,
        side: BookSide,
        records: &[RawLevel],
        checksum: &str,
    ) -> Result<UpdateOutcome, BookError> {
        let stats = self.store.apply_updates(side, records, checksum)?;
        let verdict = self.verify(checksum);
        Ok(UpdateOutcome {
            stats,
            verdict: Some(verdict),
        })
    }

    /// Apply an update message that may carry both sides
    ///
    /// Asks are applied before bids; the checksum, when present, is checked
    /// once against the resulting book.
    pub fn on_update_message(
        &mut self,
        asks: &[RawLevel],
        bids: &[RawLevel],
        checksum: Option<&str>,
    ) -> Result<UpdateOutcome, BookError> {
        let mut stats = self.store.apply_batch(BookSide::Ask, asks)?;
        stats.merge(self.store.apply_batch(BookSide::Bid, bids)?);

        let verdict = checksum.map(|c| {
            self.store.record_checksum(c);
            self.verify(c)
        });
        Ok(UpdateOutcome { stats, verdict })
    }

    fn verify(&mut self, checksum: &str) -> Verdict {
        let result = ChecksumVerifier::verify(&self.store, checksum);
        let verdict = self.controller.record(&self.pair, result);

        if let Verdict::Resync { result, .. } = &verdict {
            self.store.reset();
            if let Some(handler) = self.on_resync.as_mut() {
                handler(result);
            }
        }
        verdict
    }

    /// The `n` best levels on `side`, copied out
    pub fn top_levels(&self, side: BookSide, n: usize) -> Vec<PriceLevel> {
        self.store.top_levels(side, n).cloned().collect()
    }

    /// Get the best bid
    pub fn best_bid(&self) -> Result<&PriceLevel, BookError> {
        self.store.best_bid()
    }

    /// Get the best ask
    pub fn best_ask(&self) -> Result<&PriceLevel, BookError> {
        self.store.best_ask()
    }

    /// Most recent verification, if any
    pub fn last_verification(&self) -> Option<&ReconciliationResult> {
        self.controller.last_verification()
    }

    /// Get the spread (ask - bid)
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_ask(), self.best_bid()) {
            (Ok(ask), Ok(bid)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    /// Get the mid price ((ask + bid) / 2)
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_ask(), self.best_bid()) {
            (Ok(ask), Ok(bid)) => Some((ask.price + bid.price) / Decimal::TWO),
            _ => None,
        }
    }

    /// Discard the book and in-flight verification state (unsubscribe)
    pub fn reset(&mut self) {
        self.store.reset();
        self.controller.reset();
    }

    /// Capture current state as an owned snapshot
    pub fn snapshot(&self) -> OrderbookSnapshot {
        let depth = self.store.depth();
        OrderbookSnapshot {
            pair: self.pair.clone(),
            bids: self.top_levels(BookSide::Bid, depth),
            asks: self.top_levels(BookSide::Ask, depth),
            checksum: self.store.last_checksum().map(str::to_string),
            state: self.store.state(),
            last_verification: self.controller.last_verification().cloned(),
        }
    }
}

/// Per-side volume sums of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VolumeTotals {
    /// Sum of bid volume
    pub bids: Decimal,
    /// Sum of ask volume
    pub asks: Decimal,
}

impl VolumeTotals {
    /// Bid share of total volume in percent, rounded to a whole number
    pub fn bid_percentage(&self) -> Option<Decimal> {
        self.share(self.bids)
    }

    /// Ask share of total volume in percent, rounded to a whole number
    pub fn ask_percentage(&self) -> Option<Decimal> {
        self.share(self.asks)
    }

    fn share(&self, part: Decimal) -> Option<Decimal> {
        let total = self.bids + self.asks;
        if total.is_zero() {
            return None;
        }
        Some((part / total * Decimal::ONE_HUNDRED).round())
    }
}

/// Immutable copy of an orderbook handed to readers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderbookSnapshot {
    /// Trading pair
    pub pair: String,
    /// Bid levels, best first
    pub bids: Vec<PriceLevel>,
    /// Ask levels, best first
    pub asks: Vec<PriceLevel>,
    /// Last server checksum
    pub checksum: Option<String>,
    /// State at time of snapshot
    #[serde(skip)]
    pub state: BookState,
    /// Most recent verification
    pub last_verification: Option<ReconciliationResult>,
}

impl OrderbookSnapshot {
    /// Get the best bid price
    pub fn best_bid_price(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    /// Get the best ask price
    pub fn best_ask_price(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    /// Get the spread
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_ask_price(), self.best_bid_price()) {
            (Some(ask), Some(bid)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Get the mid price
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_ask_price(), self.best_bid_price()) {
            (Some(ask), Some(bid)) => Some((ask + bid) / Decimal::TWO),
            _ => None,
        }
    }

    /// Sum of volume per side
    pub fn volume_totals(&self) -> VolumeTotals {
        VolumeTotals {
            bids: self.bids.iter().map(|l| l.volume).sum(),
            asks: self.asks.iter().map(|l| l.volume).sum(),
        }
    }

    /// (bid volume - ask volume) / total volume, in [-1, 1]
    pub fn imbalance(&self) -> Option<Decimal> {
        let totals = self.volume_totals();
        let total = totals.bids + totals.asks;
        if total.is_zero() {
            None
        } else {
            Some((totals.bids - totals.asks) / total)
        }
    }

    /// True when the last verification failed and a resync is in flight
    pub fn is_resyncing(&self) -> bool {
        self.state == BookState::AwaitingSnapshot
            && self.last_verification.as_ref().is_some_and(|v| !v.valid)
    }
}
