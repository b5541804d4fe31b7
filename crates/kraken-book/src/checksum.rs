//! CRC32 checksum validation for orderbook integrity
//!
//! Implements Kraken's book checksum to detect drift between the local book
//! and the exchange's.
//!
//! # Algorithm
//!
//! 1. Use top 10 levels only (regardless of subscribed depth)
//! 2. Process asks first (sorted low→high), then bids (sorted high→low)
//! 3. For each level: take the price and volume strings as received, remove
//!    the decimal point, strip leading zeros
//! 4. Concatenate all: asks_string + bids_string
//! 5. Apply standard CRC32 (ISO 3309, polynomial 0xEDB88320)
//! 6. Compare the decimal rendering with the checksum string from the server
//!
//! The digits come from the wire text, never from a re-rendered number:
//! `"0.00000500"` must encode as `500`, which a `Decimal` round-trip would
//! not preserve.

use crate::store::BookStore;
use crc32fast::Hasher;
use kraken_types::{BookSide, PriceLevel};
use serde::{Deserialize, Serialize};

/// Levels per side covered by the checksum
pub const CHECKSUM_LEVELS: usize = 10;

/// Encode one price or volume string the way the exchange does
///
/// `"0.05005"` → `"5005"`, `"0.00000500"` → `"500"`, `"0.0"` → `"0"`
pub fn checksum_digits(text: &str) -> String {
    let without_decimal = text.trim().replace('.', "");
    let trimmed = without_decimal.trim_start_matches('0');

    // If all zeros, return "0"
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Build the string the checksum is computed over
///
/// `asks` must be best-first ascending, `bids` best-first descending; only the
/// first [`CHECKSUM_LEVELS`] of each are used.
pub fn checksum_payload<'a, A, B>(asks: A, bids: B) -> String
where
    A: IntoIterator<Item = &'a PriceLevel>,
    B: IntoIterator<Item = &'a PriceLevel>,
{
    let mut payload = String::new();
    for level in asks
        .into_iter()
        .take(CHECKSUM_LEVELS)
        .chain(bids.into_iter().take(CHECKSUM_LEVELS))
    {
        payload.push_str(&checksum_digits(&level.price_text));
        payload.push_str(&checksum_digits(&level.volume_text));
    }
    payload
}

/// Compute Kraken's CRC32 checksum over the top levels
pub fn compute_checksum<'a, A, B>(asks: A, bids: B) -> u32
where
    A: IntoIterator<Item = &'a PriceLevel>,
    B: IntoIterator<Item = &'a PriceLevel>,
{
    let mut hasher = Hasher::new();
    hasher.update(checksum_payload(asks, bids).as_bytes());
    hasher.finalize()
}

/// Outcome of comparing the local book with one server checksum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    /// True when both checksums agree
    pub valid: bool,
    /// Checksum sent by the exchange
    pub expected_checksum: String,
    /// Checksum computed from the local book
    pub computed_checksum: String,
}

/// Stateless verifier for the local book
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksumVerifier;

impl ChecksumVerifier {
    /// Compare the book's top levels against `server_checksum`
    ///
    /// Pure: reads at most 20 levels, never mutates the book.
    pub fn verify(book: &BookStore, server_checksum: &str) -> ReconciliationResult {
        let computed = compute_checksum(
            book.top_levels(BookSide::Ask, CHECKSUM_LEVELS),
            book.top_levels(BookSide::Bid, CHECKSUM_LEVELS),
        )
        .to_string();
        let expected = server_checksum.trim().to_string();

        ReconciliationResult {
            valid: computed == expected,
            expected_checksum: expected,
            computed_checksum: computed,
        }
    }

    /// Whether a result calls for a full resubscription
    pub fn should_resync(result: &ReconciliationResult) -> bool {
        !result.valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kraken_types::RawLevel;

    fn level(side: BookSide, price: &str, volume: &str) -> PriceLevel {
        PriceLevel::parse(&RawLevel::new(price, volume, "1.0"), side).unwrap()
    }

    #[test]
    fn test_checksum_digits() {
        assert_eq!(checksum_digits("0.05005"), "5005");
        assert_eq!(checksum_digits("0.00000500"), "500");
        assert_eq!(checksum_digits("5541.30000"), "554130000");
        assert_eq!(checksum_digits("2.50700000"), "250700000");
        assert_eq!(checksum_digits("100"), "100");
        assert_eq!(checksum_digits("0.00000000"), "0");
    }

    #[test]
    fn test_payload_asks_before_bids() {
        let asks = [level(BookSide::Ask, "101.5", "1.0")];
        let bids = [level(BookSide::Bid, "100.5", "2.0")];
        assert_eq!(checksum_payload(&asks, &bids), "101510100520");
    }

    #[test]
    fn test_checksum_uses_top_10() {
        let mut asks: Vec<PriceLevel> = (1..=15)
            .map(|i| level(BookSide::Ask, &format!("{}.0", 100 + i), "1.0"))
            .collect();
        let mut bids: Vec<PriceLevel> = (1..=15)
            .map(|i| level(BookSide::Bid, &format!("{}.0", 100 - i), "1.0"))
            .collect();

        let checksum1 = compute_checksum(&asks, &bids);

        // Add more levels beyond top 10
        asks.push(level(BookSide::Ask, "200.0", "1.0"));
        bids.push(level(BookSide::Bid, "1.0", "1.0"));

        assert_eq!(checksum1, compute_checksum(&asks, &bids));
    }

    #[test]
    fn test_checksum_order_matters() {
        let a = level(BookSide::Ask, "100", "1");
        let b = level(BookSide::Bid, "101", "2");

        assert_ne!(
            compute_checksum([&a], [&b]),
            compute_checksum([&b], [&a])
        );
    }

    #[test]
    fn test_should_resync() {
        let ok = ReconciliationResult {
            valid: true,
            expected_checksum: "1".into(),
            computed_checksum: "1".into(),
        };
        assert!(!ChecksumVerifier::should_resync(&ok));

        let bad = ReconciliationResult {
            valid: false,
            computed_checksum: "2".into(),
            ..ok
        };
        assert!(ChecksumVerifier::should_resync(&bad));
    }
}
