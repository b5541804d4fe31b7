//! WebSocket transport abstraction
//!
//! The feed source seen by [`FeedConnection`](crate::FeedConnection). The
//! trait keeps the connection loop testable without a network: production
//! code uses [`WsTransport`], tests script frames through `MockTransport`
//! (`test-utils` feature).
//!
//! # Example
//!
//! ```no_run
//! use kraken_feed::transport::{Transport, TransportError, WsTransport};
//!
//! async fn example() -> Result<(), TransportError> {
//!     let mut transport = WsTransport::new("wss://ws.kraken.com");
//!     transport.connect().await?;
//!     transport.send(r#"{"event":"ping"}"#).await?;
//!     if let Some(frame) = transport.recv().await? {
//!         println!("Received: {}", frame);
//!     }
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use kraken_types::KrakenError;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, instrument, trace};

/// Transport layer errors
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed without a close frame
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Connection timeout
    #[error("connection timeout after {0:?}")]
    Timeout(Duration),

    /// Not connected
    #[error("not connected")]
    NotConnected,

    /// Frame could not be decoded as text
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Convert into the feed-level error for `url`
    pub fn into_kraken(self, url: &str) -> KrakenError {
        match self {
            Self::ConnectionFailed(msg) => KrakenError::ConnectionFailed {
                url: url.to_string(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, msg),
            },
            Self::Timeout(timeout) => KrakenError::ConnectionTimeout {
                url: url.to_string(),
                timeout,
            },
            other => KrakenError::WebSocket(other.to_string()),
        }
    }
}

/// Source of raw feed frames and sink for outbound requests
#[async_trait]
pub trait Transport: Send {
    /// Connect to the WebSocket endpoint
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Send a text frame
    async fn send(&mut self, message: &str) -> Result<(), TransportError>;

    /// Receive the next text frame
    ///
    /// Returns `None` once the peer closed the connection gracefully.
    async fn recv(&mut self) -> Result<Option<String>, TransportError>;

    /// Close the connection gracefully
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Check if currently connected
    fn is_connected(&self) -> bool;

    /// Get the endpoint URL
    fn endpoint(&self) -> &str;
}

/// Real WebSocket transport using tokio-tungstenite
pub struct WsTransport {
    url: String,
    stream: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    connect_timeout: Duration,
}

impl WsTransport {
    /// Create a new WebSocket transport
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stream: None,
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Set connection timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[async_trait]
impl Transport for WsTransport {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn connect(&mut self) -> Result<(), TransportError> {
        debug!("connecting");

        let (stream, _response) = timeout(self.connect_timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| TransportError::Timeout(self.connect_timeout))?
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        self.stream = Some(stream);
        debug!("connected");
        Ok(())
    }

    #[instrument(skip(self, message), fields(len = message.len()))]
    async fn send(&mut self, message: &str) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        stream
            .send(Message::Text(message.to_string()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;

            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Binary(data))) => {
                    return String::from_utf8(data)
                        .map(Some)
                        .map_err(|e| TransportError::Protocol(e.to_string()));
                }
                Some(Ok(Message::Ping(payload))) => {
                    trace!("ping");
                    stream
                        .send(Message::Pong(payload))
                        .await
                        .map_err(|e| TransportError::SendFailed(e.to_string()))?;
                }
                Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "server sent close frame");
                    self.stream = None;
                    return Ok(None);
                }
                Some(Err(e)) => {
                    self.stream = None;
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
                None => {
                    self.stream = None;
                    return Err(TransportError::ConnectionClosed);
                }
            }
        }
    }

    #[instrument(skip(self))]
    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(mut stream) = self.stream.take() {
            stream
                .close(None)
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{MockHandle, MockTransport};

#[cfg(any(test, feature = "test-utils"))]
mod mock {
    use super::{Transport, TransportError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use tokio::sync::Notify;

    #[derive(Debug, Default)]
    struct MockState {
        frames: VecDeque<Result<Option<String>, TransportError>>,
        sent: Vec<String>,
        connects: u32,
        fail_connects: u32,
        fail_send: bool,
    }

    /// Scripted transport for tests
    ///
    /// Frames pushed through the [`MockHandle`] are returned by `recv()` in
    /// order. When the script runs dry `recv()` waits for more frames instead
    /// of failing, so a test decides when the connection ends.
    #[derive(Debug)]
    pub struct MockTransport {
        url: String,
        connected: bool,
        state: Arc<Mutex<MockState>>,
        notify: Arc<Notify>,
    }

    /// Test-side handle to a [`MockTransport`] that has been moved into a connection
    #[derive(Debug, Clone)]
    pub struct MockHandle {
        state: Arc<Mutex<MockState>>,
        notify: Arc<Notify>,
    }

    impl MockTransport {
        /// Create a mock transport and its control handle
        pub fn new(url: impl Into<String>) -> (Self, MockHandle) {
            let state = Arc::new(Mutex::new(MockState::default()));
            let notify = Arc::new(Notify::new());
            let transport = Self {
                url: url.into(),
                connected: false,
                state: state.clone(),
                notify: notify.clone(),
            };
            (transport, MockHandle { state, notify })
        }
    }

    impl MockHandle {
        /// Queue a text frame
        pub fn push_frame(&self, frame: impl Into<String>) {
            self.state.lock().frames.push_back(Ok(Some(frame.into())));
            self.notify.notify_one();
        }

        /// Queue several text frames
        pub fn push_frames(&self, frames: impl IntoIterator<Item = impl Into<String>>) {
            for frame in frames {
                self.push_frame(frame);
            }
        }

        /// Queue a graceful close
        pub fn push_close(&self) {
            self.state.lock().frames.push_back(Ok(None));
            self.notify.notify_one();
        }

        /// Queue a receive error
        pub fn push_error(&self, error: TransportError) {
            self.state.lock().frames.push_back(Err(error));
            self.notify.notify_one();
        }

        /// Make the next `n` connection attempts fail
        pub fn fail_connects(&self, n: u32) {
            self.state.lock().fail_connects = n;
        }

        /// Make every send fail
        pub fn fail_sends(&self, fail: bool) {
            self.state.lock().fail_send = fail;
        }

        /// Messages sent so far
        pub fn sent(&self) -> Vec<String> {
            self.state.lock().sent.clone()
        }

        /// Drain the messages sent so far
        pub fn take_sent(&self) -> Vec<String> {
            std::mem::take(&mut self.state.lock().sent)
        }

        /// Successful connection attempts so far
        pub fn connects(&self) -> u32 {
            self.state.lock().connects
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn connect(&mut self) -> Result<(), TransportError> {
            let mut state = self.state.lock();
            if state.fail_connects > 0 {
                state.fail_connects -= 1;
                return Err(TransportError::ConnectionFailed("mock connection failure".into()));
            }
            state.connects += 1;
            self.connected = true;
            Ok(())
        }

        async fn send(&mut self, message: &str) -> Result<(), TransportError> {
            if !self.connected {
                return Err(TransportError::NotConnected);
            }
            let mut state = self.state.lock();
            if state.fail_send {
                return Err(TransportError::SendFailed("mock send failure".into()));
            }
            state.sent.push(message.to_string());
            Ok(())
        }

        async fn recv(&mut self) -> Result<Option<String>, TransportError> {
            loop {
                if !self.connected {
                    return Err(TransportError::NotConnected);
                }
                let next = self.state.lock().frames.pop_front();
                match next {
                    Some(Ok(None)) => {
                        self.connected = false;
                        return Ok(None);
                    }
                    Some(frame) => return frame,
                    None => self.notify.notified().await,
                }
            }
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            self.connected = false;
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn endpoint(&self) -> &str {
            &self.url
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_transport_send_recv() {
        let (mut transport, handle) = MockTransport::new("wss://mock.test");
        handle.push_frame(r#"{"event":"pong"}"#);

        transport.connect().await.unwrap();
        assert!(transport.is_connected());

        transport.send(r#"{"event":"ping"}"#).await.unwrap();
        assert_eq!(handle.sent().len(), 1);
        assert!(handle.sent()[0].contains("ping"));

        let frame = transport.recv().await.unwrap();
        assert!(frame.unwrap().contains("pong"));
    }

    #[tokio::test]
    async fn test_mock_transport_connection_failure() {
        let (mut transport, handle) = MockTransport::new("wss://mock.test");
        handle.fail_connects(1);

        assert!(transport.connect().await.is_err());
        assert!(!transport.is_connected());
        assert!(transport.connect().await.is_ok());
        assert_eq!(handle.connects(), 1);
    }

    #[tokio::test]
    async fn test_mock_transport_close() {
        let (mut transport, handle) = MockTransport::new("wss://mock.test");
        handle.push_close();

        transport.connect().await.unwrap();
        assert!(transport.recv().await.unwrap().is_none());
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_mock_transport_waits_for_frames() {
        let (mut transport, handle) = MockTransport::new("wss://mock.test");
        transport.connect().await.unwrap();

        let pusher = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            pusher.push_frame("late");
        });

        assert_eq!(transport.recv().await.unwrap().as_deref(), Some("late"));
    }

    #[test]
    fn test_transport_error_conversion() {
        let err = TransportError::Timeout(Duration::from_secs(3)).into_kraken("wss://x");
        assert!(matches!(err, KrakenError::ConnectionTimeout { .. }));

        let err = TransportError::ConnectionClosed.into_kraken("wss://x");
        assert!(err.requires_reconnect());
    }
}
