//! Book side, depth and system status enums

use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of the order book a price level lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    /// Resting buy interest, best = highest price
    Bid,
    /// Resting sell interest, best = lowest price
    Ask,
}

impl BookSide {
    /// Returns the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Self::Bid => Self::Ask,
            Self::Ask => Self::Bid,
        }
    }

    /// Returns the side name as used in logs and events
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bid => "bid",
            Self::Ask => "ask",
        }
    }
}

impl fmt::Display for BookSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orderbook depth levels accepted by the `book` channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(into = "u32", try_from = "u32")]
pub enum Depth {
    /// 10 price levels per side
    #[default]
    D10 = 10,
    /// 25 price levels per side
    D25 = 25,
    /// 100 price levels per side
    D100 = 100,
    /// 500 price levels per side
    D500 = 500,
    /// 1000 price levels per side
    D1000 = 1000,
}

impl Depth {
    /// Returns the depth as a u32
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    /// Returns the depth as a level count
    pub fn levels(&self) -> usize {
        *self as usize
    }

    /// Parse a depth from its level count
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            10 => Some(Self::D10),
            25 => Some(Self::D25),
            100 => Some(Self::D100),
            500 => Some(Self::D500),
            1000 => Some(Self::D1000),
            _ => None,
        }
    }

    /// Channel name the exchange uses for this depth (`book-10`, ...)
    pub fn channel_name(&self) -> String {
        format!("book-{}", self.as_u32())
    }
}

impl From<Depth> for u32 {
    fn from(depth: Depth) -> Self {
        depth.as_u32()
    }
}

impl TryFrom<u32> for Depth {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Depth::from_u32(value).ok_or_else(|| format!("unsupported book depth {}", value))
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

/// Exchange system status reported by `systemStatus`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemStatus {
    /// Normal operation
    Online,
    /// Cancel-only mode
    CancelOnly,
    /// Post-only mode
    PostOnly,
    /// Limit-only mode
    LimitOnly,
    /// Maintenance mode
    Maintenance,
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::CancelOnly => write!(f, "cancel_only"),
            Self::PostOnly => write!(f, "post_only"),
            Self::LimitOnly => write!(f, "limit_only"),
            Self::Maintenance => write!(f, "maintenance"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_opposite() {
        assert_eq!(BookSide::Bid.opposite(), BookSide::Ask);
        assert_eq!(BookSide::Ask.opposite(), BookSide::Bid);
    }

    #[test]
    fn test_depth_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Depth::D25).unwrap(), "25");

        let parsed: Depth = serde_json::from_str("100").unwrap();
        assert_eq!(parsed, Depth::D100);
        assert!(serde_json::from_str::<Depth>("15").is_err());
    }

    #[test]
    fn test_depth_channel_name() {
        assert_eq!(Depth::D10.channel_name(), "book-10");
        assert_eq!(Depth::from_u32(1000), Some(Depth::D1000));
        assert_eq!(Depth::from_u32(7), None);
    }

    #[test]
    fn test_system_status_serde() {
        let status: SystemStatus = serde_json::from_str("\"cancel_only\"").unwrap();
        assert_eq!(status, SystemStatus::CancelOnly);
        assert_eq!(status.to_string(), "cancel_only");
    }
}
