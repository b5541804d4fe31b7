//! Price level types with decimal precision
//!
//! The book feed ships every level as a tuple of strings:
//! `[price, volume, timestamp]`, optionally followed by `"r"` when the
//! exchange republishes a level. [`RawLevel`] keeps those strings exactly as
//! received, [`PriceLevel`] is the parsed, side-tagged entry stored in the book.

use crate::{BookSide, MalformedLevel};
use rust_decimal::Decimal;
use serde::de::Error as _;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::str::FromStr;

/// A single level record exactly as it appeared on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLevel {
    /// Price string, e.g. `"0.05005"`
    pub price: String,
    /// Volume string, e.g. `"0.00000500"`
    pub volume: String,
    /// Exchange timestamp string, e.g. `"1582905487.684110"`
    pub timestamp: String,
    /// Set when the exchange flagged this record as a republish (`"r"`)
    pub republish: bool,
}

impl RawLevel {
    /// Create a record from its three string fields
    pub fn new(
        price: impl Into<String>,
        volume: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            price: price.into(),
            volume: volume.into(),
            timestamp: timestamp.into(),
            republish: false,
        }
    }

    /// Mark the record as a republish
    pub fn republished(mut self) -> Self {
        self.republish = true;
        self
    }

    /// Build a record from a JSON array value
    ///
    /// Returns `None` when the value is not an array of at least three
    /// string-or-number elements.
    pub fn from_value(value: &Value) -> Option<Self> {
        let items = value.as_array()?;
        if items.len() < 3 {
            return None;
        }
        let field = |v: &Value| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        };
        Some(Self {
            price: field(&items[0])?,
            volume: field(&items[1])?,
            timestamp: field(&items[2])?,
            republish: items.get(3).and_then(Value::as_str) == Some("r"),
        })
    }
}

impl Serialize for RawLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.republish { 4 } else { 3 };
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&self.price)?;
        seq.serialize_element(&self.volume)?;
        seq.serialize_element(&self.timestamp)?;
        if self.republish {
            seq.serialize_element("r")?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for RawLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        RawLevel::from_value(&value)
            .ok_or_else(|| D::Error::custom("expected [price, volume, timestamp] level tuple"))
    }
}

/// A single price level held by the order book
///
/// At most one `PriceLevel` exists per (side, price). The wire strings are
/// kept next to the parsed decimals because the checksum is computed over the
/// literal digits, not over a re-rendered number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Price of this level
    pub price: Decimal,
    /// Volume resting at this price
    pub volume: Decimal,
    /// Exchange timestamp of the last accepted write
    pub timestamp: Decimal,
    /// Side this level belongs to
    pub side: BookSide,
    /// Price exactly as received
    pub price_text: String,
    /// Volume exactly as received
    pub volume_text: String,
}

impl PriceLevel {
    /// Parse a wire record into a level on `side`
    pub fn parse(raw: &RawLevel, side: BookSide) -> Result<Self, MalformedLevel> {
        let price = parse_field(&raw.price, "price")?;
        let volume = parse_field(&raw.volume, "volume")?;
        let timestamp = parse_field(&raw.timestamp, "timestamp")?;

        if price.is_sign_negative() || price.is_zero() {
            return Err(MalformedLevel::new("price", &raw.price, "must be positive"));
        }
        if volume.is_sign_negative() && !volume.is_zero() {
            return Err(MalformedLevel::new("volume", &raw.volume, "must not be negative"));
        }

        Ok(Self {
            price,
            volume,
            timestamp,
            side,
            price_text: raw.price.trim().to_string(),
            volume_text: raw.volume.trim().to_string(),
        })
    }

    /// Check if this record removes its price level
    pub fn is_removal(&self) -> bool {
        self.volume.is_zero()
    }

    /// Get price as f64 (for display)
    pub fn price_f64(&self) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        self.price.to_f64().unwrap_or(0.0)
    }

    /// Get volume as f64 (for display)
    pub fn volume_f64(&self) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        self.volume.to_f64().unwrap_or(0.0)
    }
}

fn parse_field(text: &str, field: &'static str) -> Result<Decimal, MalformedLevel> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(MalformedLevel::new(field, text, "empty"));
    }
    Decimal::from_str(trimmed).map_err(|e| MalformedLevel::new(field, text, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_raw_level_from_json() {
        let raw: RawLevel =
            serde_json::from_str(r#"["5541.30000","2.50700000","1534614248.123678"]"#).unwrap();
        assert_eq!(raw.price, "5541.30000");
        assert_eq!(raw.volume, "2.50700000");
        assert_eq!(raw.timestamp, "1534614248.123678");
        assert!(!raw.republish);
    }

    #[test]
    fn test_raw_level_republish_flag() {
        let raw: RawLevel =
            serde_json::from_str(r#"["5541.30000","0.00000000","1534614335.345903","r"]"#)
                .unwrap();
        assert!(raw.republish);
        assert_eq!(serde_json::to_string(&raw).unwrap().matches(',').count(), 3);
    }

    #[test]
    fn test_raw_level_rejects_short_tuple() {
        assert!(serde_json::from_str::<RawLevel>(r#"["1.0","2.0"]"#).is_err());
        assert!(RawLevel::from_value(&serde_json::json!({"price": "1"})).is_none());
    }

    #[test]
    fn test_price_level_keeps_wire_text() {
        let raw = RawLevel::new("0.05005", "0.00000500", "1582905487.684110");
        let level = PriceLevel::parse(&raw, BookSide::Ask).unwrap();

        assert_eq!(level.price, dec!(0.05005));
        assert_eq!(level.volume, dec!(0.000005));
        assert_eq!(level.timestamp, dec!(1582905487.684110));
        assert_eq!(level.price_text, "0.05005");
        assert_eq!(level.volume_text, "0.00000500");
        assert_eq!(level.side, BookSide::Ask);
        assert!(!level.is_removal());
    }

    #[test]
    fn test_price_level_zero_volume_is_removal() {
        let raw = RawLevel::new("100.0", "0.00000000", "1.0");
        assert!(PriceLevel::parse(&raw, BookSide::Bid).unwrap().is_removal());
    }

    #[test]
    fn test_price_level_rejects_non_numeric() {
        let err = PriceLevel::parse(&RawLevel::new("abc", "1.0", "1.0"), BookSide::Bid)
            .unwrap_err();
        assert_eq!(err.field, "price");

        let err = PriceLevel::parse(&RawLevel::new("1.0", "", "1.0"), BookSide::Bid)
            .unwrap_err();
        assert_eq!(err.field, "volume");

        assert!(PriceLevel::parse(&RawLevel::new("1.0", "-2", "1.0"), BookSide::Bid).is_err());
    }
}
