//! Observability hooks
//!
//! Callbacks for feed lifecycle and book integrity events, invoked alongside
//! the event channel. Useful for logging and metrics without consuming the
//! event stream.
//!
//! # Example
//!
//! ```
//! use kraken_feed::hooks::Hooks;
//!
//! let hooks = Hooks::new()
//!     .on_connect(|info| println!("connected: {:?}", info))
//!     .on_resync_required(|pair, reason| eprintln!("{} resync: {:?}", pair, reason))
//!     .on_integrity_error(|err| eprintln!("{}", err));
//! ```

use crate::events::{DisconnectReason, ResyncReason};
use kraken_book::ReconciliationResult;
use kraken_types::{BookIntegrityError, SystemStatus};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Information about a successful connection
#[derive(Debug, Clone)]
pub struct ConnectInfo {
    /// Connection ID assigned by server
    pub connection_id: Option<u64>,
    /// API version reported by server
    pub version: String,
    /// Exchange status
    pub status: SystemStatus,
    /// Whether this is a reconnection
    pub is_reconnection: bool,
}

/// Subscription status change information
#[derive(Debug, Clone)]
pub struct SubscriptionInfo {
    /// Trading pair
    pub pair: String,
    /// Whether the subscription is now active
    pub accepted: bool,
    /// Rejection reason, if any
    pub reason: Option<String>,
}

/// Checksum mismatch information
#[derive(Debug, Clone)]
pub struct ChecksumInfo {
    /// Trading pair
    pub pair: String,
    /// The failing comparison
    pub result: ReconciliationResult,
}

pub type ConnectHook = Arc<dyn Fn(&ConnectInfo) + Send + Sync>;
pub type DisconnectHook = Arc<dyn Fn(&DisconnectReason) + Send + Sync>;
pub type ReconnectAttemptHook = Arc<dyn Fn(u32, Duration) + Send + Sync>;
pub type SubscriptionHook = Arc<dyn Fn(&SubscriptionInfo) + Send + Sync>;
pub type ChecksumHook = Arc<dyn Fn(&ChecksumInfo) + Send + Sync>;
pub type ResyncHook = Arc<dyn Fn(&str, &ResyncReason) + Send + Sync>;
pub type IntegrityHook = Arc<dyn Fn(&BookIntegrityError) + Send + Sync>;
pub type MessageHook = Arc<dyn Fn(usize) + Send + Sync>;
pub type ErrorHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Observability hooks container
///
/// All hooks are optional and run synchronously on the connection task, so
/// keep them fast.
#[derive(Clone, Default)]
pub struct Hooks {
    pub(crate) on_connect: Option<ConnectHook>,
    pub(crate) on_disconnect: Option<DisconnectHook>,
    pub(crate) on_reconnect_attempt: Option<ReconnectAttemptHook>,
    pub(crate) on_subscription: Option<SubscriptionHook>,
    pub(crate) on_checksum_mismatch: Option<ChecksumHook>,
    pub(crate) on_resync_required: Option<ResyncHook>,
    pub(crate) on_integrity_error: Option<IntegrityHook>,
    pub(crate) on_message: Option<MessageHook>,
    pub(crate) on_error: Option<ErrorHook>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_connect", &self.on_connect.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .field("on_reconnect_attempt", &self.on_reconnect_attempt.is_some())
            .field("on_subscription", &self.on_subscription.is_some())
            .field("on_checksum_mismatch", &self.on_checksum_mismatch.is_some())
            .field("on_resync_required", &self.on_resync_required.is_some())
            .field("on_integrity_error", &self.on_integrity_error.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl Hooks {
    /// Create a new empty hooks container
    pub fn new() -> Self {
        Self::default()
    }

    /// Called each time a connection is established (including reconnections)
    pub fn on_connect<F>(mut self, f: F) -> Self
    where
        F: Fn(&ConnectInfo) + Send + Sync + 'static,
    {
        self.on_connect = Some(Arc::new(f));
        self
    }

    /// Called when the connection is lost
    pub fn on_disconnect<F>(mut self, f: F) -> Self
    where
        F: Fn(&DisconnectReason) + Send + Sync + 'static,
    {
        self.on_disconnect = Some(Arc::new(f));
        self
    }

    /// Called before each reconnection attempt with the attempt number and delay
    pub fn on_reconnect_attempt<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, Duration) + Send + Sync + 'static,
    {
        self.on_reconnect_attempt = Some(Arc::new(f));
        self
    }

    /// Called when a subscription is confirmed or rejected
    pub fn on_subscription<F>(mut self, f: F) -> Self
    where
        F: Fn(&SubscriptionInfo) + Send + Sync + 'static,
    {
        self.on_subscription = Some(Arc::new(f));
        self
    }

    /// Called when checksum verification fails
    pub fn on_checksum_mismatch<F>(mut self, f: F) -> Self
    where
        F: Fn(&ChecksumInfo) + Send + Sync + 'static,
    {
        self.on_checksum_mismatch = Some(Arc::new(f));
        self
    }

    /// Called whenever a book is dropped and a fresh snapshot is requested
    pub fn on_resync_required<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &ResyncReason) + Send + Sync + 'static,
    {
        self.on_resync_required = Some(Arc::new(f));
        self
    }

    /// Called when a mismatch survives a resync cycle
    pub fn on_integrity_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&BookIntegrityError) + Send + Sync + 'static,
    {
        self.on_integrity_error = Some(Arc::new(f));
        self
    }

    /// Called on each frame with its size in bytes
    pub fn on_message<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.on_message = Some(Arc::new(f));
        self
    }

    /// Called on errors with the error message
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub(crate) fn invoke_connect(&self, info: &ConnectInfo) {
        if let Some(hook) = &self.on_connect {
            hook(info);
        }
    }

    pub(crate) fn invoke_disconnect(&self, reason: &DisconnectReason) {
        if let Some(hook) = &self.on_disconnect {
            hook(reason);
        }
    }

    pub(crate) fn invoke_reconnect_attempt(&self, attempt: u32, delay: Duration) {
        if let Some(hook) = &self.on_reconnect_attempt {
            hook(attempt, delay);
        }
    }

    pub(crate) fn invoke_subscription(&self, info: &SubscriptionInfo) {
        if let Some(hook) = &self.on_subscription {
            hook(info);
        }
    }

    pub(crate) fn invoke_checksum_mismatch(&self, info: &ChecksumInfo) {
        if let Some(hook) = &self.on_checksum_mismatch {
            hook(info);
        }
    }

    pub(crate) fn invoke_resync_required(&self, pair: &str, reason: &ResyncReason) {
        if let Some(hook) = &self.on_resync_required {
            hook(pair, reason);
        }
    }

    pub(crate) fn invoke_integrity_error(&self, err: &BookIntegrityError) {
        if let Some(hook) = &self.on_integrity_error {
            hook(err);
        }
    }

    pub(crate) fn invoke_message(&self, size: usize) {
        if let Some(hook) = &self.on_message {
            hook(size);
        }
    }

    pub(crate) fn invoke_error(&self, msg: &str) {
        if let Some(hook) = &self.on_error {
            hook(msg);
        }
    }
}
