//! Request and response message types for the Kraken WebSocket book feed
//!
//! Events are JSON objects tagged by `"event"`; channel data arrives as
//! JSON arrays of the form `[channelID, payload.., channelName, pair]`.

use crate::{Depth, RawLevel, SystemStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Request Types
// ============================================================================

/// Book subscription details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSubscription {
    /// Always "book"
    pub name: String,
    /// Number of levels per side
    pub depth: Depth,
}

impl BookSubscription {
    /// Create a book subscription with the given depth
    pub fn new(depth: Depth) -> Self {
        Self {
            name: "book".to_string(),
            depth,
        }
    }
}

/// Subscribe / unsubscribe request message
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionRequest {
    /// "subscribe" or "unsubscribe"
    pub event: &'static str,
    /// Optional request ID (echoed in the status reply)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reqid: Option<u64>,
    /// Pairs to (un)subscribe
    pub pair: Vec<String>,
    /// Subscription details
    pub subscription: BookSubscription,
}

impl SubscriptionRequest {
    /// Create a book subscribe request
    pub fn subscribe(pairs: Vec<String>, depth: Depth) -> Self {
        Self {
            event: "subscribe",
            reqid: None,
            pair: pairs,
            subscription: BookSubscription::new(depth),
        }
    }

    /// Create a book unsubscribe request
    pub fn unsubscribe(pairs: Vec<String>, depth: Depth) -> Self {
        Self {
            event: "unsubscribe",
            reqid: None,
            pair: pairs,
            subscription: BookSubscription::new(depth),
        }
    }

    /// Add a request ID
    pub fn with_reqid(mut self, id: u64) -> Self {
        self.reqid = Some(id);
        self
    }

    /// Returns true for subscribe requests
    pub fn is_subscribe(&self) -> bool {
        self.event == "subscribe"
    }
}

/// Ping request for keepalive
#[derive(Debug, Clone, Serialize)]
pub struct PingRequest {
    /// Always "ping"
    pub event: &'static str,
    /// Optional request ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reqid: Option<u64>,
}

impl PingRequest {
    /// Create a new ping request
    pub fn new() -> Self {
        Self {
            event: "ping",
            reqid: None,
        }
    }

    /// Add a request ID
    pub fn with_reqid(mut self, id: u64) -> Self {
        self.reqid = Some(id);
        self
    }
}

impl Default for PingRequest {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Event Types
// ============================================================================

/// `systemStatus` event sent on connect and on status changes
#[derive(Debug, Clone, Deserialize)]
pub struct SystemStatusEvent {
    /// Connection ID assigned by the server
    #[serde(rename = "connectionID", default)]
    pub connection_id: Option<u64>,
    /// Exchange status
    pub status: SystemStatus,
    /// API version
    #[serde(default)]
    pub version: String,
}

/// Subscription lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
    /// Subscription is active
    Subscribed,
    /// Subscription was removed
    Unsubscribed,
    /// Request failed, see `error_message`
    Error,
}

/// Subscription details echoed by the server
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionEcho {
    /// Channel name ("book")
    pub name: String,
    /// Depth, when applicable
    #[serde(default)]
    pub depth: Option<u32>,
}

/// `subscriptionStatus` event
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionStatus {
    /// Channel ID used in subsequent data arrays
    #[serde(rename = "channelID", default)]
    pub channel_id: Option<u64>,
    /// Channel name, e.g. "book-10"
    #[serde(rename = "channelName", default)]
    pub channel_name: Option<String>,
    /// Pair this status applies to
    #[serde(default)]
    pub pair: Option<String>,
    /// Resulting state
    pub status: SubscriptionState,
    /// Echoed request ID
    #[serde(default)]
    pub reqid: Option<u64>,
    /// Error description when `status == error`
    #[serde(rename = "errorMessage", default)]
    pub error_message: Option<String>,
    /// Echoed subscription
    #[serde(default)]
    pub subscription: Option<SubscriptionEcho>,
}

// ============================================================================
// Book Data
// ============================================================================

/// Incremental book changes carried by one update message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookUpdate {
    /// Ask side records (`"a"`)
    pub asks: Vec<RawLevel>,
    /// Bid side records (`"b"`)
    pub bids: Vec<RawLevel>,
    /// Checksum of the book after applying this message (`"c"`)
    pub checksum: Option<String>,
    /// Records dropped because they were not level tuples
    pub malformed: usize,
}

/// Payload of a book data array
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookPayload {
    /// Full book (`"as"` / `"bs"`)
    Snapshot {
        /// Ask levels
        asks: Vec<RawLevel>,
        /// Bid levels
        bids: Vec<RawLevel>,
        /// Records dropped because they were not level tuples
        malformed: usize,
    },
    /// Incremental update
    Update(BookUpdate),
}

/// Book channel data message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookMessage {
    /// Channel ID from the subscription status
    pub channel_id: u64,
    /// Channel name, e.g. "book-10"
    pub channel_name: String,
    /// Trading pair
    pub pair: String,
    /// Snapshot or update contents
    pub payload: BookPayload,
}

impl BookMessage {
    /// Returns true if this message is a full snapshot
    pub fn is_snapshot(&self) -> bool {
        matches!(self.payload, BookPayload::Snapshot { .. })
    }

    /// Depth encoded in the channel name, if any
    pub fn depth(&self) -> Option<Depth> {
        self.channel_name
            .strip_prefix("book-")
            .and_then(|d| d.parse().ok())
            .and_then(Depth::from_u32)
    }

    fn from_array(items: &[Value]) -> Option<Self> {
        // [channelID, payload, (payload,) channelName, pair]
        if items.len() < 4 {
            return None;
        }
        let channel_id = items[0].as_u64()?;
        let pair = items[items.len() - 1].as_str()?.to_string();
        let channel_name = items[items.len() - 2].as_str()?.to_string();
        if !channel_name.starts_with("book") {
            return None;
        }

        let objects: Vec<&Map<String, Value>> = items[1..items.len() - 2]
            .iter()
            .map(Value::as_object)
            .collect::<Option<_>>()?;

        let is_snapshot = objects
            .iter()
            .any(|o| o.contains_key("as") || o.contains_key("bs"));

        let payload = if is_snapshot {
            let mut malformed = 0;
            let mut asks = Vec::new();
            let mut bids = Vec::new();
            for obj in &objects {
                malformed += collect_levels(obj.get("as"), &mut asks);
                malformed += collect_levels(obj.get("bs"), &mut bids);
            }
            BookPayload::Snapshot {
                asks,
                bids,
                malformed,
            }
        } else {
            let mut update = BookUpdate::default();
            for obj in &objects {
                update.malformed += collect_levels(obj.get("a"), &mut update.asks);
                update.malformed += collect_levels(obj.get("b"), &mut update.bids);
                if let Some(c) = obj.get("c") {
                    update.checksum = match c {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    };
                }
            }
            BookPayload::Update(update)
        };

        Some(Self {
            channel_id,
            channel_name,
            pair,
            payload,
        })
    }
}

/// Append every well-formed record of `value` to `out`, returning the number skipped
fn collect_levels(value: Option<&Value>, out: &mut Vec<RawLevel>) -> usize {
    let Some(records) = value.and_then(Value::as_array) else {
        return 0;
    };
    let mut skipped = 0;
    for record in records {
        match RawLevel::from_value(record) {
            Some(level) => out.push(level),
            None => skipped += 1,
        }
    }
    skipped
}

// ============================================================================
// Parsed Message
// ============================================================================

/// Parsed WebSocket message
#[derive(Debug, Clone)]
pub enum WsMessage {
    /// `systemStatus` event
    SystemStatus(SystemStatusEvent),
    /// `subscriptionStatus` event
    SubscriptionStatus(SubscriptionStatus),
    /// Book snapshot or update
    Book(BookMessage),
    /// `heartbeat` event
    Heartbeat,
    /// `pong` reply
    Pong {
        /// Echoed request ID
        reqid: Option<u64>,
    },
    /// Anything else (other channels, unknown events)
    Unknown(String),
}

impl WsMessage {
    /// Parse a raw text frame
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;

        match value {
            Value::Array(items) => Ok(BookMessage::from_array(&items)
                .map(WsMessage::Book)
                .unwrap_or_else(|| WsMessage::Unknown(text.to_string()))),
            Value::Object(ref obj) => match obj.get("event").and_then(Value::as_str) {
                Some("systemStatus") => Ok(WsMessage::SystemStatus(serde_json::from_value(value)?)),
                Some("subscriptionStatus") => {
                    Ok(WsMessage::SubscriptionStatus(serde_json::from_value(value)?))
                }
                Some("heartbeat") => Ok(WsMessage::Heartbeat),
                Some("pong") => Ok(WsMessage::Pong {
                    reqid: obj.get("reqid").and_then(Value::as_u64),
                }),
                _ => Ok(WsMessage::Unknown(text.to_string())),
            },
            _ => Ok(WsMessage::Unknown(text.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_request_json() {
        let req = SubscriptionRequest::subscribe(vec!["XBT/USD".into()], Depth::D10).with_reqid(7);
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["event"], "subscribe");
        assert_eq!(json["reqid"], 7);
        assert_eq!(json["pair"][0], "XBT/USD");
        assert_eq!(json["subscription"]["name"], "book");
        assert_eq!(json["subscription"]["depth"], 10);
    }

    #[test]
    fn test_unsubscribe_request_omits_reqid() {
        let req = SubscriptionRequest::unsubscribe(vec!["ETH/USD".into()], Depth::D25);
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("reqid"));
        assert!(json.contains("\"unsubscribe\""));
        assert!(!req.is_subscribe());
    }

    #[test]
    fn test_parse_system_status() {
        let msg = WsMessage::parse(
            r#"{"connectionID":8628615390848610000,"event":"systemStatus","status":"online","version":"1.9.0"}"#,
        )
        .unwrap();
        match msg {
            WsMessage::SystemStatus(s) => {
                assert_eq!(s.status, SystemStatus::Online);
                assert_eq!(s.version, "1.9.0");
                assert_eq!(s.connection_id, Some(8628615390848610000));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_subscription_status() {
        let msg = WsMessage::parse(
            r#"{"channelID":10001,"channelName":"book-10","event":"subscriptionStatus","pair":"XBT/USD","status":"subscribed","subscription":{"depth":10,"name":"book"}}"#,
        )
        .unwrap();
        match msg {
            WsMessage::SubscriptionStatus(s) => {
                assert_eq!(s.channel_id, Some(10001));
                assert_eq!(s.channel_name.as_deref(), Some("book-10"));
                assert_eq!(s.status, SubscriptionState::Subscribed);
                assert_eq!(s.subscription.unwrap().depth, Some(10));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_subscription_error() {
        let msg = WsMessage::parse(
            r#"{"errorMessage":"Currency pair not supported","event":"subscriptionStatus","pair":"XBT/EUX","status":"error","subscription":{"depth":10,"name":"book"}}"#,
        )
        .unwrap();
        match msg {
            WsMessage::SubscriptionStatus(s) => {
                assert_eq!(s.status, SubscriptionState::Error);
                assert_eq!(s.error_message.as_deref(), Some("Currency pair not supported"));
                assert!(s.channel_id.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_heartbeat_and_pong() {
        assert!(matches!(
            WsMessage::parse(r#"{"event":"heartbeat"}"#).unwrap(),
            WsMessage::Heartbeat
        ));
        assert!(matches!(
            WsMessage::parse(r#"{"event":"pong","reqid":42}"#).unwrap(),
            WsMessage::Pong { reqid: Some(42) }
        ));
    }

    #[test]
    fn test_parse_book_snapshot() {
        let msg = WsMessage::parse(
            r#"[0,{"as":[["5541.30000","2.50700000","1534614248.123678"],["5541.80000","0.33000000","1534614098.345543"]],"bs":[["5541.20000","1.52900000","1534614248.765567"],["5539.90000","0.30000000","1534614241.769870"]]},"book-2","XBT/USD"]"#,
        )
        .unwrap();
        let WsMessage::Book(book) = msg else {
            panic!("expected book message");
        };
        assert!(book.is_snapshot());
        assert_eq!(book.channel_name, "book-2");
        assert_eq!(book.pair, "XBT/USD");
        match book.payload {
            BookPayload::Snapshot { asks, bids, malformed } => {
                assert_eq!(asks.len(), 2);
                assert_eq!(bids.len(), 2);
                assert_eq!(malformed, 0);
                assert_eq!(asks[0].price, "5541.30000");
            }
            _ => panic!("expected snapshot"),
        }
    }

    #[test]
    fn test_parse_single_side_update() {
        let msg = WsMessage::parse(
            r#"[1234,{"a":[["5541.30000","2.50700000","1534614248.456738"],["5542.50000","0.40100000","1534614248.456738"]],"c":"974942666"},"book-10","XBT/USD"]"#,
        )
        .unwrap();
        let WsMessage::Book(book) = msg else {
            panic!("expected book message");
        };
        assert_eq!(book.depth(), Some(Depth::D10));
        match book.payload {
            BookPayload::Update(update) => {
                assert_eq!(update.asks.len(), 2);
                assert!(update.bids.is_empty());
                assert_eq!(update.checksum.as_deref(), Some("974942666"));
            }
            _ => panic!("expected update"),
        }
    }

    #[test]
    fn test_parse_two_sided_update() {
        let msg = WsMessage::parse(
            r#"[1234,{"a":[["5541.30000","2.50700000","1534614248.456738","r"]]},{"b":[["5541.30000","0.00000000","1534614335.345903"]],"c":"974942666"},"book-10","XBT/USD"]"#,
        )
        .unwrap();
        let WsMessage::Book(book) = msg else {
            panic!("expected book message");
        };
        match book.payload {
            BookPayload::Update(update) => {
                assert_eq!(update.asks.len(), 1);
                assert!(update.asks[0].republish);
                assert_eq!(update.bids.len(), 1);
                assert_eq!(update.checksum.as_deref(), Some("974942666"));
            }
            _ => panic!("expected update"),
        }
    }

    #[test]
    fn test_parse_update_counts_malformed_records() {
        let msg = WsMessage::parse(
            r#"[1,{"b":[["100.0","1.0","1.0"],{"oops":true},["1.0"]],"c":"1"},"book-10","XBT/USD"]"#,
        )
        .unwrap();
        let WsMessage::Book(BookMessage {
            payload: BookPayload::Update(update),
            ..
        }) = msg
        else {
            panic!("expected update");
        };
        assert_eq!(update.bids.len(), 1);
        assert_eq!(update.malformed, 2);
    }

    #[test]
    fn test_parse_other_channel_is_unknown() {
        let msg = WsMessage::parse(r#"[42,[["5541.2","0.15","1534614057.3","s","l",""]],"trade","XBT/USD"]"#)
            .unwrap();
        assert!(matches!(msg, WsMessage::Unknown(_)));
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(WsMessage::parse("{not json").is_err());
    }
}
