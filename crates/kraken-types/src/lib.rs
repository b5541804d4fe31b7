//! Shared types for Kraken's WebSocket book feed
//!
//! This crate provides the core type definitions used across the krakenbook
//! crates. It has minimal dependencies and can be used independently.
//!
//! # Key Types
//!
//! - [`RawLevel`] - Level record exactly as it appeared on the wire
//! - [`PriceLevel`] - Parsed book level with decimal precision
//! - [`BookSide`], [`Depth`] - Book enums
//! - [`WsMessage`], [`BookMessage`] - Parsed WebSocket messages
//! - [`SubscriptionRequest`] - Outbound subscribe / unsubscribe
//! - [`BookError`], [`ProtocolViolation`], [`KrakenError`] - Error types

pub mod enums;
pub mod error;
pub mod level;
pub mod messages;

// Re-export commonly used types
pub use enums::*;
pub use error::*;
pub use level::*;
pub use messages::*;

// Re-export rust_decimal for users
pub use rust_decimal::Decimal;
