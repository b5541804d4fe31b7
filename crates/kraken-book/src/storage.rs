//! BTreeMap-based ladder storage
//!
//! Provides O(log N) lookups and ordered iteration for both sides.
//! Uses `Reverse<Decimal>` for bids to maintain descending order.

use kraken_types::{BookSide, PriceLevel};
use rust_decimal::Decimal;
use std::cmp::Reverse;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::iter::Take;

/// Two-sided price ladder keyed by price
///
/// - Bids: stored with `Reverse<Decimal>` key for descending order (highest first)
/// - Asks: stored with `Decimal` key for ascending order (lowest first)
///
/// Every entry sits in the map matching its own `side`, so iteration order is
/// always best-to-worst.
#[derive(Debug, Clone, Default)]
pub struct TreeBook {
    bids: BTreeMap<Reverse<Decimal>, PriceLevel>,
    asks: BTreeMap<Decimal, PriceLevel>,
}

impl TreeBook {
    /// Create an empty ladder
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the level at `price` on `side`
    pub fn get(&self, side: BookSide, price: &Decimal) -> Option<&PriceLevel> {
        match side {
            BookSide::Bid => self.bids.get(&Reverse(*price)),
            BookSide::Ask => self.asks.get(price),
        }
    }

    /// Insert or overwrite a level on its own side
    pub fn insert(&mut self, level: PriceLevel) {
        match level.side {
            BookSide::Bid => {
                self.bids.insert(Reverse(level.price), level);
            }
            BookSide::Ask => {
                self.asks.insert(level.price, level);
            }
        }
    }

    /// Remove the level at `price`, returning it if it existed
    pub fn remove(&mut self, side: BookSide, price: &Decimal) -> Option<PriceLevel> {
        match side {
            BookSide::Bid => self.bids.remove(&Reverse(*price)),
            BookSide::Ask => self.asks.remove(price),
        }
    }

    /// Best level on `side`
    pub fn best(&self, side: BookSide) -> Option<&PriceLevel> {
        self.top(side, 1).next()
    }

    /// The `n` best levels on `side`, best first
    pub fn top(&self, side: BookSide, n: usize) -> TopLevels<'_> {
        let inner = match side {
            BookSide::Bid => TopIter::Bids(self.bids.values().take(n)),
            BookSide::Ask => TopIter::Asks(self.asks.values().take(n)),
        };
        TopLevels { inner }
    }

    /// Number of levels on `side`
    pub fn len(&self, side: BookSide) -> usize {
        match side {
            BookSide::Bid => self.bids.len(),
            BookSide::Ask => self.asks.len(),
        }
    }

    /// Check if both sides are empty
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Clear all levels
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
    }

    /// Drop levels beyond the `max_depth` best on `side`, returning how many went
    pub fn truncate(&mut self, side: BookSide, max_depth: usize) -> usize {
        match side {
            BookSide::Bid => {
                if self.bids.len() <= max_depth {
                    return 0;
                }
                let keys: Vec<_> = self.bids.keys().skip(max_depth).cloned().collect();
                for key in &keys {
                    self.bids.remove(key);
                }
                keys.len()
            }
            BookSide::Ask => {
                if self.asks.len() <= max_depth {
                    return 0;
                }
                let keys: Vec<_> = self.asks.keys().skip(max_depth).cloned().collect();
                for key in &keys {
                    self.asks.remove(key);
                }
                keys.len()
            }
        }
    }
}

/// Lazy iterator over the best levels of one side
///
/// Cloning it restarts from the same position, so callers can walk the
/// same top-of-book view more than once without touching the ladder.
#[derive(Debug, Clone)]
pub struct TopLevels<'a> {
    inner: TopIter<'a>,
}

#[derive(Debug, Clone)]
enum TopIter<'a> {
    Bids(Take<btree_map::Values<'a, Reverse<Decimal>, PriceLevel>>),
    Asks(Take<btree_map::Values<'a, Decimal, PriceLevel>>),
}

impl<'a> Iterator for TopLevels<'a> {
    type Item = &'a PriceLevel;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            TopIter::Bids(it) => it.next(),
            TopIter::Asks(it) => it.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            TopIter::Bids(it) => it.size_hint(),
            TopIter::Asks(it) => it.size_hint(),
        }
    }
}

impl ExactSizeIterator for TopLevels<'_> {}
