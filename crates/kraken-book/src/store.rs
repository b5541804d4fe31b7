//! Depth-bounded two-sided book built from snapshot and update batches
//!
//! # State Machine
//!
//! ```text
//! AwaitingSnapshot --snapshot--> Synced --reset--> AwaitingSnapshot
//! ```
//!
//! Updates are only accepted in `Synced`. Conflicts between records for the
//! same price are resolved by exchange timestamp: a positive volume overwrites
//! only a strictly older entry, a zero volume removes the level.

use crate::storage::{TopLevels, TreeBook};
use kraken_types::{BookError, BookSide, Depth, PriceLevel, ProtocolViolation, RawLevel};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Book lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookState {
    /// Created or reset, waiting for the first snapshot
    #[default]
    AwaitingSnapshot,
    /// Snapshot applied, processing updates
    Synced,
}

/// Outcome counters for one update batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateStats {
    /// Levels inserted or overwritten
    pub written: usize,
    /// Levels removed by zero-volume records
    pub removed: usize,
    /// Records dropped by the timestamp rule
    pub stale: usize,
    /// Records that failed to parse
    pub malformed: usize,
    /// Levels pushed out past the subscribed depth
    pub truncated: usize,
}

impl UpdateStats {
    /// Fold another batch's counters into this one
    pub fn merge(&mut self, other: UpdateStats) {
        self.written += other.written;
        self.removed += other.removed;
        self.stale += other.stale;
        self.malformed += other.malformed;
        self.truncated += other.truncated;
    }
}

/// Local order book for one subscription
#[derive(Debug, Clone)]
pub struct BookStore {
    depth: usize,
    levels: TreeBook,
    last_checksum: Option<String>,
    state: BookState,
    malformed_records: u64,
}

impl BookStore {
    /// Create an empty store for the given subscription depth
    pub fn new(depth: Depth) -> Self {
        Self {
            depth: depth.levels(),
            levels: TreeBook::new(),
            last_checksum: None,
            state: BookState::AwaitingSnapshot,
            malformed_records: 0,
        }
    }

    /// Subscribed depth (levels per side)
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Current lifecycle state
    pub fn state(&self) -> BookState {
        self.state
    }

    /// Check if a snapshot has been applied
    pub fn is_initialized(&self) -> bool {
        self.state == BookState::Synced
    }

    /// Checksum carried by the most recent update batch
    pub fn last_checksum(&self) -> Option<&str> {
        self.last_checksum.as_deref()
    }

    /// Number of levels currently held on `side`
    pub fn len(&self, side: BookSide) -> usize {
        self.levels.len(side)
    }

    /// Check if both sides are empty
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Total update records skipped as malformed since creation
    pub fn malformed_records(&self) -> u64 {
        self.malformed_records
    }

    /// Replace the whole book with a snapshot
    ///
    /// Both sides must carry exactly `depth` well-formed levels with distinct
    /// prices. On error the existing state is left untouched.
    pub fn initialize_from_snapshot(
        &mut self,
        bids: &[RawLevel],
        asks: &[RawLevel],
    ) -> Result<(), BookError> {
        for (side, records) in [(BookSide::Bid, bids), (BookSide::Ask, asks)] {
            if records.len() != self.depth {
                return Err(ProtocolViolation::SnapshotDepth {
                    side,
                    expected: self.depth,
                    actual: records.len(),
                }
                .into());
            }
        }

        let mut levels = TreeBook::new();
        load_snapshot_side(&mut levels, BookSide::Bid, bids)?;
        load_snapshot_side(&mut levels, BookSide::Ask, asks)?;

        self.levels = levels;
        self.last_checksum = None;
        self.state = BookState::Synced;
        debug!(depth = self.depth, "snapshot applied");
        Ok(())
    }

    /// Apply one side's update records and remember the server checksum
    pub fn apply_updates(
        &mut self,
        side: BookSide,
        records: &[RawLevel],
        checksum: &str,
    ) -> Result<UpdateStats, BookError> {
        let stats = self.apply_batch(side, records)?;
        self.record_checksum(checksum);
        Ok(stats)
    }

    /// Apply one side's update records without touching `last_checksum`
    ///
    /// Used when a single exchange message carries both sides and only one
    /// checksum for the result.
    pub fn apply_batch(
        &mut self,
        side: BookSide,
        records: &[RawLevel],
    ) -> Result<UpdateStats, BookError> {
        if self.state != BookState::Synced {
            return Err(ProtocolViolation::UpdateBeforeSnapshot.into());
        }

        let mut stats = UpdateStats::default();
        // Removals seen in this batch, by price, holding the removal timestamp
        let mut tombstones: HashMap<Decimal, Decimal> = HashMap::new();
        // Prices written by this batch
        let mut touched: HashSet<Decimal> = HashSet::new();

        for raw in records {
            let level = match PriceLevel::parse(raw, side) {
                Ok(level) => level,
                Err(e) => {
                    warn!(%side, error = %e, "skipping malformed book record");
                    stats.malformed += 1;
                    self.malformed_records += 1;
                    continue;
                }
            };

            if level.is_removal() {
                if let Some(existing) = self.levels.get(side, &level.price) {
                    if touched.contains(&level.price) && existing.timestamp > level.timestamp {
                        stats.stale += 1;
                        continue;
                    }
                    self.levels.remove(side, &level.price);
                    touched.remove(&level.price);
                    stats.removed += 1;
                }
                tombstones
                    .entry(level.price)
                    .and_modify(|ts| *ts = (*ts).max(level.timestamp))
                    .or_insert(level.timestamp);
                continue;
            }

            if let Some(removed_at) = tombstones.get(&level.price) {
                if level.timestamp <= *removed_at {
                    stats.stale += 1;
                    continue;
                }
            }
            if let Some(existing) = self.levels.get(side, &level.price) {
                if existing.timestamp >= level.timestamp {
                    stats.stale += 1;
                    continue;
                }
            }

            touched.insert(level.price);
            self.levels.insert(level);
            stats.written += 1;
        }

        stats.truncated = self.levels.truncate(side, self.depth);
        Ok(stats)
    }

    /// Remember the checksum the server sent for the current state
    pub fn record_checksum(&mut self, checksum: &str) {
        self.last_checksum = Some(checksum.to_string());
    }

    /// The `n` best levels on `side` (asks ascending, bids descending)
    pub fn top_levels(&self, side: BookSide, n: usize) -> TopLevels<'_> {
        self.levels.top(side, n)
    }

    /// Highest bid
    pub fn best_bid(&self) -> Result<&PriceLevel, BookError> {
        self.best(BookSide::Bid)
    }

    /// Lowest ask
    pub fn best_ask(&self) -> Result<&PriceLevel, BookError> {
        self.best(BookSide::Ask)
    }

    fn best(&self, side: BookSide) -> Result<&PriceLevel, BookError> {
        self.levels.best(side).ok_or(BookError::EmptyBook { side })
    }

    /// Discard all levels and wait for a new snapshot
    pub fn reset(&mut self) {
        self.levels.clear();
        self.last_checksum = None;
        self.state = BookState::AwaitingSnapshot;
    }
}

fn load_snapshot_side(
    levels: &mut TreeBook,
    side: BookSide,
    records: &[RawLevel],
) -> Result<(), BookError> {
    for raw in records {
        let level = PriceLevel::parse(raw, side).map_err(|e| ProtocolViolation::MalformedSnapshot {
            side,
            reason: e.to_string(),
        })?;
        if level.is_removal() {
            return Err(ProtocolViolation::MalformedSnapshot {
                side,
                reason: format!("zero volume at {}", level.price_text),
            }
            .into());
        }
        if levels.get(side, &level.price).is_some() {
            return Err(ProtocolViolation::MalformedSnapshot {
                side,
                reason: format!("duplicate price {}", level.price_text),
            }
            .into());
        }
        levels.insert(level);
    }
    Ok(())
}
