//! Local orderbook engine for Kraken's WebSocket book feed
//!
//! This crate rebuilds a depth-limited two-sided book from snapshot and
//! update messages and verifies it against the CRC32 checksum the exchange
//! sends with every update. It has no networking or async code.
//!
//! # Example
//!
//! ```
//! use kraken_book::{BookState, Orderbook};
//! use kraken_types::Depth;
//!
//! let book = Orderbook::new("XBT/USD", Depth::D10);
//! assert_eq!(book.state(), BookState::AwaitingSnapshot);
//! assert!(book.best_bid().is_err());
//! ```

pub mod checksum;
pub mod orderbook;
pub mod reconcile;
pub mod storage;
pub mod store;

// Re-export main types
pub use checksum::{
    checksum_digits, checksum_payload, compute_checksum, ChecksumVerifier, ReconciliationResult,
    CHECKSUM_LEVELS,
};
pub use orderbook::{Orderbook, OrderbookSnapshot, ResyncHandler, UpdateOutcome, VolumeTotals};
pub use reconcile::{ReconciliationController, Verdict, DEFAULT_INTEGRITY_THRESHOLD};
pub use storage::{TopLevels, TreeBook};
pub use store::{BookState, BookStore, UpdateStats};
