//! Reconnecting book feed connection

use crate::config::FeedConfig;
use crate::events::{
    BookEvent, ConnectionEvent, DisconnectReason, FeedEvent, SubscriptionEvent,
};
use crate::hooks::{ChecksumInfo, ConnectInfo, Hooks, SubscriptionInfo};
use crate::ports::{DisplaySink, NullDisplay, Outbox};
use crate::reconnect::Backoff;
use crate::session::{BookSession, FeedStats, SessionPhase};
use crate::subscription::{PairState, SubscriptionManager};
use crate::transport::{Transport, WsTransport};

use kraken_book::OrderbookSnapshot;
use kraken_types::{
    KrakenError, KrakenResult, SubscriptionRequest, SubscriptionState, SubscriptionStatus,
    SystemStatusEvent, WsMessage,
};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, Mutex as AsyncMutex, Notify};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Connection in progress
    Connecting,
    /// Connected and ready
    Connected,
    /// Waiting to reconnect after a disconnect
    Reconnecting,
    /// Shutting down
    ShuttingDown,
}

/// Per-connection bookkeeping, rebuilt on every (re)connect
#[derive(Debug, Default)]
struct Link {
    outbox: Outbox,
    announced: bool,
    is_reconnection: bool,
}

/// Book feed over one transport, maintaining a verified book per pair
///
/// Owns the subscriptions for every configured pair, resubscribes on
/// reconnect, and turns book-level resync requests into unsubscribe +
/// subscribe round trips.
///
/// # Example
///
/// ```no_run
/// use kraken_feed::{FeedConfig, FeedConnection, FeedEvent};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), kraken_types::KrakenError> {
/// let config = FeedConfig::new().with_pair("XBT/USD");
/// let feed = Arc::new(FeedConnection::new(config));
/// let mut events = feed.take_event_receiver().expect("receiver taken once");
///
/// let runner = feed.clone();
/// tokio::spawn(async move { runner.run().await });
///
/// while let Some(event) = events.recv().await {
///     if let FeedEvent::Book(book) = event {
///         println!("{}: {:?}", book.pair(), book);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct FeedConnection<T: Transport = WsTransport> {
    config: FeedConfig,
    transport: AsyncMutex<T>,
    state: RwLock<ConnectionState>,
    sessions: Mutex<BTreeMap<String, BookSession>>,
    subscriptions: Mutex<SubscriptionManager>,
    display: Mutex<Box<dyn DisplaySink>>,
    hooks: Hooks,
    shutdown: AtomicBool,
    shutdown_notify: Notify,
    event_tx: mpsc::UnboundedSender<FeedEvent>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<FeedEvent>>>,
}

impl FeedConnection<WsTransport> {
    /// Create a feed over a real WebSocket connection
    pub fn new(config: FeedConfig) -> Self {
        let transport =
            WsTransport::new(config.endpoint.url()).with_timeout(config.connect_timeout);
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> FeedConnection<T> {
    /// Create a feed over any transport
    pub fn with_transport(config: FeedConfig, transport: T) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let sessions = config
            .pairs
            .iter()
            .map(|pair| {
                (
                    pair.clone(),
                    BookSession::new(pair.clone(), config.depth, config.integrity_threshold),
                )
            })
            .collect();
        let subscriptions = SubscriptionManager::new(config.pairs.iter().cloned(), config.depth);

        Self {
            config,
            transport: AsyncMutex::new(transport),
            state: RwLock::new(ConnectionState::Disconnected),
            sessions: Mutex::new(sessions),
            subscriptions: Mutex::new(subscriptions),
            display: Mutex::new(Box::new(NullDisplay)),
            hooks: Hooks::default(),
            shutdown: AtomicBool::new(false),
            shutdown_notify: Notify::new(),
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
        }
    }

    /// Attach observability hooks
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Send book views to `display`
    pub fn with_display(self, display: impl DisplaySink + 'static) -> Self {
        *self.display.lock() = Box::new(display);
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Get the current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Take the event receiver (can only be called once)
    pub fn take_event_receiver(&self) -> Option<mpsc::UnboundedReceiver<FeedEvent>> {
        self.event_rx.lock().take()
    }

    /// Copy out the current book for `pair`
    pub fn snapshot(&self, pair: &str) -> Option<OrderbookSnapshot> {
        self.sessions.lock().get(pair).map(BookSession::snapshot)
    }

    /// Lifecycle phase of the book for `pair`
    pub fn phase(&self, pair: &str) -> Option<SessionPhase> {
        self.sessions.lock().get(pair).map(BookSession::phase)
    }

    /// Subscription state for `pair`
    pub fn subscription_state(&self, pair: &str) -> Option<PairState> {
        self.subscriptions.lock().state(pair)
    }

    /// Counters for `pair`
    pub fn stats(&self, pair: &str) -> Option<FeedStats> {
        self.sessions.lock().get(pair).map(BookSession::stats)
    }

    /// Counters summed over every pair
    pub fn total_stats(&self) -> FeedStats {
        self.sessions
            .lock()
            .values()
            .fold(FeedStats::default(), |mut total, session| {
                total.merge(session.stats());
                total
            })
    }

    /// Request shutdown
    ///
    /// The run loop stops handling book data, unsubscribes, closes the
    /// transport and returns.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        *self.state.write() = ConnectionState::ShuttingDown;
        self.shutdown_notify.notify_one();
    }

    fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Connect and run until shutdown or until reconnection gives up
    pub async fn run(&self) -> KrakenResult<()> {
        self.config.validate()?;

        let mut backoff = self.config.reconnect.backoff();
        let mut is_reconnection = false;

        loop {
            if self.is_shutting_down() {
                break;
            }
            {
                let mut state = self.state.write();
                if *state != ConnectionState::Reconnecting {
                    *state = ConnectionState::Connecting;
                }
            }

            let error = match self.run_connection(&mut backoff, &mut is_reconnection).await {
                Ok(()) => break,
                Err(e) => e,
            };
            self.reset_books();
            if self.is_shutting_down() {
                break;
            }

            let Some((attempt, delay)) = backoff.next_delay() else {
                error!(attempts = backoff.attempts(), %error, "reconnection attempts exhausted");
                self.hooks.invoke_error(&error.to_string());
                self.emit(ConnectionEvent::ReconnectFailed {
                    error: error.to_string(),
                });
                *self.state.write() = ConnectionState::Disconnected;
                return Err(error);
            };

            warn!(?delay, attempt, %error, "connection lost, reconnecting");
            self.hooks.invoke_reconnect_attempt(attempt, delay);
            self.emit(ConnectionEvent::Reconnecting { attempt, delay });
            *self.state.write() = ConnectionState::Reconnecting;

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown_notify.notified() => break,
            }
        }

        self.reset_books();
        *self.state.write() = ConnectionState::Disconnected;
        Ok(())
    }

    /// One connection lifetime; `Ok` means a requested shutdown
    async fn run_connection(
        &self,
        backoff: &mut Backoff,
        is_reconnection: &mut bool,
    ) -> KrakenResult<()> {
        let url = self.config.endpoint.url().to_string();
        let mut transport = self.transport.lock().await;

        info!("connecting to {}", url);
        timeout(self.config.connect_timeout, transport.connect())
            .await
            .map_err(|_| KrakenError::ConnectionTimeout {
                url: url.clone(),
                timeout: self.config.connect_timeout,
            })?
            .map_err(|e| e.into_kraken(&url))?;

        backoff.reset();
        *self.state.write() = ConnectionState::Connected;

        let mut link = Link {
            is_reconnection: *is_reconnection,
            ..Link::default()
        };
        *is_reconnection = true;

        let requests = self.subscriptions.lock().restoration_requests();
        self.send_requests(&mut *transport, requests, &url).await?;

        loop {
            let frame = tokio::select! {
                frame = transport.recv() => frame,
                _ = self.shutdown_notify.notified() => {
                    self.close_gracefully(&mut *transport, &url).await;
                    return Ok(());
                }
            };

            match frame {
                Ok(Some(text)) => {
                    if self.is_shutting_down() {
                        self.close_gracefully(&mut *transport, &url).await;
                        return Ok(());
                    }
                    self.hooks.invoke_message(text.len());
                    self.handle_text(&text, &mut link);

                    if !link.outbox.is_empty() {
                        let requests = {
                            let mut subscriptions = self.subscriptions.lock();
                            link.outbox
                                .drain()
                                .into_iter()
                                .map(|request| subscriptions.track(request))
                                .collect()
                        };
                        self.send_requests(&mut *transport, requests, &url).await?;
                    }
                }
                Ok(None) => {
                    info!("server closed connection");
                    self.disconnected(DisconnectReason::ServerClosed);
                    return Err(KrakenError::WebSocket("server closed connection".into()));
                }
                Err(e) => {
                    error!("transport error: {}", e);
                    self.disconnected(DisconnectReason::NetworkError(e.to_string()));
                    return Err(e.into_kraken(&url));
                }
            }
        }
    }

    async fn send_requests(
        &self,
        transport: &mut T,
        requests: Vec<SubscriptionRequest>,
        url: &str,
    ) -> KrakenResult<()> {
        for request in requests {
            let json = serde_json::to_string(&request)
                .map_err(|e| KrakenError::invalid_json(e.to_string(), None))?;
            debug!("sending {}", json);
            if let Err(e) = transport.send(&json).await {
                self.disconnected(DisconnectReason::NetworkError(e.to_string()));
                return Err(e.into_kraken(url));
            }
        }
        Ok(())
    }

    /// Unsubscribe active pairs and close the transport, ignoring failures
    async fn close_gracefully(&self, transport: &mut T, url: &str) {
        info!("shutdown requested, closing connection");
        let request = {
            let mut subscriptions = self.subscriptions.lock();
            let active = subscriptions.active_pairs();
            (!active.is_empty()).then(|| {
                subscriptions.track(SubscriptionRequest::unsubscribe(active, self.config.depth))
            })
        };
        if let Some(request) = request {
            if let Err(e) = self.send_requests(transport, vec![request], url).await {
                debug!("unsubscribe on shutdown failed: {}", e);
            }
        }
        if let Err(e) = transport.close().await {
            debug!("close failed: {}", e);
        }
        self.subscriptions.lock().deactivate_all();
        self.disconnected(DisconnectReason::Shutdown);
    }

    fn disconnected(&self, reason: DisconnectReason) {
        self.hooks.invoke_disconnect(&reason);
        self.emit(ConnectionEvent::Disconnected { reason });
    }

    fn reset_books(&self) {
        self.subscriptions.lock().deactivate_all();
        for session in self.sessions.lock().values_mut() {
            session.reset();
        }
    }

    fn handle_text(&self, text: &str, link: &mut Link) {
        let message = match WsMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("failed to parse message: {} - {}", e, text);
                self.hooks.invoke_error(&e.to_string());
                return;
            }
        };

        match message {
            WsMessage::SystemStatus(status) => self.handle_system_status(status, link),
            WsMessage::SubscriptionStatus(status) => self.handle_subscription_status(status),
            WsMessage::Book(message) => {
                let events = {
                    let mut sessions = self.sessions.lock();
                    let Some(session) = sessions.get_mut(&message.pair) else {
                        debug!(pair = %message.pair, "book data for unconfigured pair");
                        return;
                    };
                    let mut display = self.display.lock();
                    session.handle_book(&message, &mut link.outbox, &mut **display)
                };
                for event in events {
                    self.publish_book_event(event);
                }
            }
            WsMessage::Heartbeat => self.emit(FeedEvent::Heartbeat),
            WsMessage::Pong { reqid } => debug!(?reqid, "pong"),
            WsMessage::Unknown(_) => debug!("unknown message: {}", text),
        }
    }

    fn handle_system_status(&self, status: SystemStatusEvent, link: &mut Link) {
        if link.announced {
            info!(status = %status.status, "exchange status changed");
            self.emit(ConnectionEvent::StatusChanged {
                status: status.status,
            });
            return;
        }

        link.announced = true;
        info!(
            "connected to Kraken API {} (connection_id: {:?}, status: {})",
            status.version, status.connection_id, status.status
        );
        self.hooks.invoke_connect(&ConnectInfo {
            connection_id: status.connection_id,
            version: status.version.clone(),
            status: status.status,
            is_reconnection: link.is_reconnection,
        });
        self.emit(ConnectionEvent::Connected {
            connection_id: status.connection_id,
            version: status.version,
            status: status.status,
        });
    }

    fn handle_subscription_status(&self, status: SubscriptionStatus) {
        let pair = status.pair.clone().unwrap_or_default();

        match status.status {
            SubscriptionState::Subscribed => {
                info!(%pair, channel_id = ?status.channel_id, "subscribed");
                self.subscriptions.lock().confirm(&pair, status.channel_id);
                if let Some(session) = self.sessions.lock().get_mut(&pair) {
                    session.on_subscribed();
                }
                self.hooks.invoke_subscription(&SubscriptionInfo {
                    pair: pair.clone(),
                    accepted: true,
                    reason: None,
                });
                self.emit(SubscriptionEvent::Subscribed {
                    pair,
                    channel_id: status.channel_id,
                    channel_name: status.channel_name,
                });
            }
            SubscriptionState::Unsubscribed => {
                debug!(%pair, "unsubscribed");
                self.subscriptions.lock().mark_unsubscribed(&pair);
                if let Some(session) = self.sessions.lock().get_mut(&pair) {
                    session.on_unsubscribed();
                }
                self.emit(SubscriptionEvent::Unsubscribed { pair });
            }
            SubscriptionState::Error => {
                let reason = status
                    .error_message
                    .unwrap_or_else(|| "unknown error".to_string());
                let err = KrakenError::subscription_rejected(pair.clone(), reason.clone());
                warn!("{}", err);

                self.subscriptions.lock().reject(&pair);
                if let Some(session) = self.sessions.lock().get_mut(&pair) {
                    session.on_rejected();
                }
                self.hooks.invoke_subscription(&SubscriptionInfo {
                    pair: pair.clone(),
                    accepted: false,
                    reason: Some(reason.clone()),
                });
                self.emit(SubscriptionEvent::Rejected { pair, reason });
            }
        }
    }

    fn publish_book_event(&self, event: BookEvent) {
        match &event {
            BookEvent::ChecksumMismatch { pair, result } => {
                self.hooks.invoke_checksum_mismatch(&ChecksumInfo {
                    pair: pair.clone(),
                    result: result.clone(),
                });
            }
            BookEvent::ResyncRequested { pair, reason } => {
                self.hooks.invoke_resync_required(pair, reason);
            }
            BookEvent::IntegrityError(err) => self.hooks.invoke_integrity_error(err),
            BookEvent::ProtocolViolation { error, .. } => {
                self.hooks.invoke_error(&error.to_string());
            }
            BookEvent::Snapshot { .. } | BookEvent::Update { .. } => {}
        }
        self.emit(event);
    }

    /// Emit an event
    fn emit(&self, event: impl Into<FeedEvent>) {
        let _ = self.event_tx.send(event.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use kraken_types::Depth;

    fn feed() -> FeedConnection<MockTransport> {
        let (transport, _handle) = MockTransport::new("wss://mock.test");
        FeedConnection::with_transport(
            FeedConfig::new().with_pairs(["XBT/USD", "ETH/USD"]).with_depth(Depth::D25),
            transport,
        )
    }

    #[test]
    fn test_initial_state() {
        let feed = feed();
        assert_eq!(feed.state(), ConnectionState::Disconnected);
        assert!(!feed.is_connected());
        assert_eq!(feed.phase("XBT/USD"), Some(SessionPhase::Subscribing));
        assert_eq!(feed.subscription_state("ETH/USD"), Some(PairState::Inactive));
        assert!(feed.snapshot("DOGE/USD").is_none());
        assert_eq!(feed.total_stats(), FeedStats::default());
    }

    #[test]
    fn test_event_receiver_taken_once() {
        let feed = feed();
        assert!(feed.take_event_receiver().is_some());
        assert!(feed.take_event_receiver().is_none());
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_config() {
        let (transport, _handle) = MockTransport::new("wss://mock.test");
        let feed = FeedConnection::with_transport(FeedConfig::new(), transport);
        let err = feed.run().await.unwrap_err();
        assert!(matches!(err, KrakenError::Configuration(_)));
    }

    #[test]
    fn test_shutdown_sets_state() {
        let feed = feed();
        feed.shutdown();
        assert_eq!(feed.state(), ConnectionState::ShuttingDown);
    }
}
