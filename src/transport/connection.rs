//! Session connection and event loop.
//!
//! This module owns the single WebSocket connection to the analysis
//! service for one session.
//!
//! # Event Loop
//!
//! [`ConnectionManager::connect`] spawns a tokio task that:
//!
//! - Performs the WebSocket handshake (cancellable by `disconnect`)
//! - Hands inbound text messages to the message handler, in arrival order
//! - Writes outbound frames submitted through [`ConnectionManager::send_frame`]
//! - Enforces the optional liveness policy
//! - Sends the stop control message and closes on `disconnect`
//!
//! # State Machine
//!
//! ```text
//! Idle ──connect──► Connecting ──handshake ok──► Open ──close frame / disconnect──► Closed
//!                        │                        │
//!                        └──handshake failed──────┴──reset / EOF / stall──────────► Failed
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::pending;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::{ControlMessage, OutboundFrame};

// ============================================================================
// Constants
// ============================================================================

/// Upper bound on how long `disconnect` waits for the stop message and close handshake.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

// ============================================================================
// Types
// ============================================================================

/// Inbound text message callback.
///
/// Called on the event loop for each text message, in arrival order.
pub type MessageHandler = Box<dyn Fn(&str) + Send + Sync>;

/// Last connection-level error, shared with observers.
pub type ConnectionFault = Option<Arc<Error>>;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of the session connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Never connected.
    #[default]
    Idle,
    /// Handshake in progress.
    Connecting,
    /// Ready for frames.
    Open,
    /// Closed normally.
    Closed,
    /// Handshake failed or connection lost abnormally.
    Failed,
}

impl ConnectionState {
    /// Returns `true` if frames may be sent.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns `true` if a connection exists (connecting or open).
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }

    /// Returns the state as a short label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// LivenessPolicy
// ============================================================================

/// Policy for connections that go silent without closing.
///
/// Disabled by default: a stalled connection stays Open until the caller
/// stops the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LivenessPolicy {
    /// Fail the connection after this long without any inbound message.
    pub keepalive_timeout: Option<Duration>,
}

impl LivenessPolicy {
    /// No liveness detection.
    #[inline]
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            keepalive_timeout: None,
        }
    }

    /// Fails the connection after `timeout` of inbound silence.
    #[inline]
    #[must_use]
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self {
            keepalive_timeout: Some(timeout),
        }
    }

    /// Returns the stall deadline given the last inbound message time.
    #[inline]
    fn deadline(&self, last_inbound: Instant) -> Option<Instant> {
        self.keepalive_timeout.map(|t| last_inbound + t)
    }
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Write one binary frame.
    SendFrame {
        message: Message,
        done: oneshot::Sender<Result<()>>,
    },
    /// Send the stop signal and close.
    Close,
}

/// Why the open-phase loop ended.
enum LoopExit {
    /// Local disconnect; state handled by the caller.
    Local,
    /// Service sent a close frame.
    RemoteClosed,
    /// Transport error or EOF without a close frame.
    Abnormal(String),
    /// Liveness policy tripped.
    Stalled(Duration),
}

// ============================================================================
// Shared State
// ============================================================================

/// Handle to a running event loop.
struct ActiveLink {
    generation: u64,
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    task: JoinHandle<()>,
}

/// State shared between the manager and its event loop task.
struct Shared {
    state_tx: watch::Sender<ConnectionState>,
    fault_tx: watch::Sender<ConnectionFault>,
    handler: Mutex<Option<MessageHandler>>,
    link: Mutex<Option<ActiveLink>>,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Connection state changed");
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.link
            .lock()
            .as_ref()
            .is_some_and(|link| link.generation == generation)
    }

    /// Records the end of a connection, unless `disconnect` already detached it.
    fn finish(&self, generation: u64, state: ConnectionState, fault: Option<Error>) {
        let current = {
            let mut link = self.link.lock();
            let current = link
                .as_ref()
                .is_some_and(|link| link.generation == generation);
            if current {
                *link = None;
            }
            current
        };

        if !current {
            return;
        }

        if let Some(err) = fault {
            error!(error = %err, "Session connection failed");
            self.fault_tx.send_replace(Some(Arc::new(err)));
        }
        self.set_state(state);
    }

    fn dispatch(&self, text: &str) {
        let handler = self.handler.lock();
        if let Some(ref handler) = *handler {
            handler(text);
        }
    }
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Owns the lifetime of one session connection.
///
/// At most one connection exists at a time; `connect` while one exists is a
/// no-op. State changes are published on a watch channel.
///
/// # Example
///
/// ```ignore
/// let manager = ConnectionManager::new(Some(url), LivenessPolicy::disabled());
/// manager.set_message_handler(Box::new(|text| println!("{text}")));
/// manager.connect()?;
///
/// let mut state = manager.subscribe();
/// state.wait_for(|s| s.is_open()).await?;
///
/// manager.send_frame(frame).await?;
/// manager.disconnect().await;
/// ```
pub struct ConnectionManager {
    /// Socket URL; `None` when no session is configured.
    url: Option<Url>,
    /// Stall handling.
    liveness: LivenessPolicy,
    /// Connection attempts started.
    attempts: AtomicU64,
    /// State shared with the event loop.
    shared: Arc<Shared>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.url.as_ref().map(Url::as_str))
            .field("state", &self.state())
            .field("attempts", &self.attempt_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ConnectionManager - Constructor
// ============================================================================

impl ConnectionManager {
    /// Creates a manager for the given socket URL.
    #[must_use]
    pub fn new(url: Option<Url>, liveness: LivenessPolicy) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        let (fault_tx, _) = watch::channel(None);

        Self {
            url,
            liveness,
            attempts: AtomicU64::new(0),
            shared: Arc::new(Shared {
                state_tx,
                fault_tx,
                handler: Mutex::new(None),
                link: Mutex::new(None),
            }),
        }
    }
}

// ============================================================================
// ConnectionManager - Public API
// ============================================================================

impl ConnectionManager {
    /// Returns the socket URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.shared.state_tx.borrow()
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Returns the last connection error, if any.
    #[must_use]
    pub fn last_error(&self) -> ConnectionFault {
        self.shared.fault_tx.borrow().clone()
    }

    /// Subscribes to connection errors.
    #[must_use]
    pub fn subscribe_errors(&self) -> watch::Receiver<ConnectionFault> {
        self.shared.fault_tx.subscribe()
    }

    /// Returns how many connection attempts have been started.
    #[inline]
    #[must_use]
    pub fn attempt_count(&self) -> u64 {
        self.attempts.load(Ordering::Acquire)
    }

    /// Sets the inbound message handler.
    pub fn set_message_handler(&self, handler: MessageHandler) {
        *self.shared.handler.lock() = Some(handler);
    }

    /// Clears the inbound message handler.
    pub fn clear_message_handler(&self) {
        *self.shared.handler.lock() = None;
    }

    /// Starts connecting.
    ///
    /// Returns immediately; watch [`subscribe`](Self::subscribe) for `Open`.
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if no session is configured.
    pub fn connect(&self) -> Result<()> {
        let url = self
            .url
            .clone()
            .ok_or_else(|| Error::connection("No session ID"))?;

        let mut link = self.shared.link.lock();
        if link.is_some() {
            debug!("Connection already exists, skipping connect");
            return Ok(());
        }

        let generation = self.attempts.fetch_add(1, Ordering::AcqRel) + 1;
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        self.shared.fault_tx.send_replace(None);
        self.shared.set_state(ConnectionState::Connecting);

        let task = tokio::spawn(Self::run_event_loop(
            url,
            generation,
            self.liveness,
            command_rx,
            Arc::clone(&self.shared),
        ));

        *link = Some(ActiveLink {
            generation,
            command_tx,
            task,
        });

        Ok(())
    }

    /// Sends the stop signal (best effort) and closes the connection.
    ///
    /// Always ends in [`ConnectionState::Closed`]. Idempotent.
    pub async fn disconnect(&self) {
        let link = self.shared.link.lock().take();

        if let Some(mut link) = link {
            debug!(generation = link.generation, "Disconnecting");
            let _ = link.command_tx.send(ConnectionCommand::Close);

            if timeout(CLOSE_GRACE, &mut link.task).await.is_err() {
                warn!("Close handshake did not finish in time, aborting");
                link.task.abort();
            }
        }

        self.shared.set_state(ConnectionState::Closed);
    }

    /// Sends one encoded frame and waits until it is written to the socket.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the connection is not open
    /// - [`Error::ChannelClosed`] if the connection ends before the write
    /// - [`Error::Connection`] if the socket write fails
    pub async fn send_frame(&self, frame: OutboundFrame) -> Result<()> {
        if !self.state().is_open() {
            return Err(Error::NotConnected);
        }

        let command_tx = self
            .shared
            .link
            .lock()
            .as_ref()
            .map(|link| link.command_tx.clone())
            .ok_or(Error::NotConnected)?;

        let (done_tx, done_rx) = oneshot::channel();
        command_tx
            .send(ConnectionCommand::SendFrame {
                message: frame.into_message(),
                done: done_tx,
            })
            .map_err(|_| Error::ConnectionClosed)?;

        done_rx.await?
    }
}

// ============================================================================
// ConnectionManager - Event Loop
// ============================================================================

impl ConnectionManager {
    /// Event loop that handles the handshake and WebSocket I/O.
    async fn run_event_loop(
        url: Url,
        generation: u64,
        liveness: LivenessPolicy,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        shared: Arc<Shared>,
    ) {
        info!(url = %url, generation, "Connecting to session service");

        let ws_stream = tokio::select! {
            result = connect_async(url.as_str()) => match result {
                Ok((stream, _response)) => stream,
                Err(e) => {
                    shared.finish(
                        generation,
                        ConnectionState::Failed,
                        Some(Error::abnormal_closure(e)),
                    );
                    return;
                }
            },

            _ = command_rx.recv() => {
                debug!(generation, "Connect cancelled");
                return;
            }
        };

        if !shared.is_current(generation) {
            return;
        }

        info!(generation, "Session connection open");
        shared.set_state(ConnectionState::Open);

        let (mut ws_write, mut ws_read) = ws_stream.split();
        let mut last_inbound = Instant::now();

        let exit = loop {
            let deadline = liveness.deadline(last_inbound);

            tokio::select! {
                // Incoming messages from the service
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            last_inbound = Instant::now();
                            shared.dispatch(text.as_str());
                        }

                        Some(Ok(Message::Close(frame))) => {
                            debug!(?frame, "WebSocket closed by service");
                            break LoopExit::RemoteClosed;
                        }

                        // Binary, Ping, Pong: liveness only
                        Some(Ok(_)) => {
                            last_inbound = Instant::now();
                        }

                        Some(Err(e)) => break LoopExit::Abnormal(e.to_string()),

                        None => break LoopExit::Abnormal("stream ended without close frame".into()),
                    }
                }

                // Commands from the manager
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::SendFrame { message, done }) => {
                            let result = ws_write
                                .send(message)
                                .await
                                .map_err(|e| Error::connection(format!("frame send failed: {e}")));
                            if let Err(ref e) = result {
                                warn!(error = %e, "Failed to send frame");
                            } else {
                                trace!("Frame sent");
                            }
                            let _ = done.send(result);
                        }

                        Some(ConnectionCommand::Close) | None => {
                            Self::send_stop(&mut ws_write).await;
                            break LoopExit::Local;
                        }
                    }
                }

                _ = async {
                    match deadline {
                        Some(deadline) => sleep_until(deadline).await,
                        None => pending::<()>().await,
                    }
                } => {
                    break LoopExit::Stalled(liveness.keepalive_timeout.unwrap_or_default());
                }
            }
        };

        match exit {
            LoopExit::Local => debug!(generation, "Connection closed locally"),
            LoopExit::RemoteClosed => {
                shared.finish(generation, ConnectionState::Closed, None);
            }
            LoopExit::Abnormal(reason) => {
                shared.finish(
                    generation,
                    ConnectionState::Failed,
                    Some(Error::abnormal_closure(reason)),
                );
            }
            LoopExit::Stalled(after) => {
                let _ = timeout(CLOSE_GRACE, ws_write.close()).await;
                shared.finish(
                    generation,
                    ConnectionState::Failed,
                    Some(Error::connection_timeout(after.as_millis() as u64)),
                );
            }
        }

        debug!(generation, "Event loop terminated");
    }

    /// Writes the stop control message and closes, ignoring delivery failures.
    async fn send_stop<S>(ws_write: &mut S)
    where
        S: Sink<Message> + Unpin,
        S::Error: fmt::Display,
    {
        match ControlMessage::Stop.to_message() {
            Ok(stop) => match timeout(CLOSE_GRACE, ws_write.send(stop)).await {
                Ok(Ok(())) => debug!("Stop signal sent"),
                Ok(Err(e)) => debug!(error = %e, "Stop signal not delivered"),
                Err(_) => debug!("Stop signal timed out"),
            },
            Err(e) => debug!(error = %e, "Stop signal not serialized"),
        }

        if let Ok(Err(e)) = timeout(CLOSE_GRACE, ws_write.close()).await {
            debug!(error = %e, "Close handshake failed");
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(link) = self.shared.link.lock().take() {
            link.task.abort();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    use tokio::sync::mpsc::UnboundedReceiver;

    use crate::transport::loopback::LoopbackService;

    const WAIT: Duration = Duration::from_secs(5);

    async fn wait_for_state(manager: &ConnectionManager, state: ConnectionState) {
        let mut rx = manager.subscribe();
        timeout(WAIT, rx.wait_for(|s| *s == state))
            .await
            .expect("state reached in time")
            .expect("state channel open");
    }

    fn collecting_handler(manager: &ConnectionManager) -> UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        manager.set_message_handler(Box::new(move |text| {
            let _ = tx.send(text.to_string());
        }));
        rx
    }

    fn test_frame(data: Vec<u8>) -> OutboundFrame {
        OutboundFrame {
            data,
            width: 2,
            height: 2,
            captured_at: Instant::now(),
        }
    }

    #[tokio::test]
    async fn test_connect_without_session_fails() {
        let manager = ConnectionManager::new(None, LivenessPolicy::disabled());
        let err = manager.connect().expect_err("no session");
        assert!(matches!(err, Error::Connection { .. }));
        assert_eq!(manager.state(), ConnectionState::Idle);
        assert_eq!(manager.attempt_count(), 0);
    }

    #[tokio::test]
    async fn test_connect_twice_is_single_attempt() {
        let service = LoopbackService::bind().await;
        let manager = ConnectionManager::new(Some(service.ws_url("s1")), LivenessPolicy::disabled());

        manager.connect().expect("first connect");
        manager.connect().expect("second connect is a no-op");

        let _peer = service.accept().await;
        wait_for_state(&manager, ConnectionState::Open).await;
        manager.connect().expect("connect while open is a no-op");

        assert_eq!(manager.attempt_count(), 1);
        assert!(service.accept_within(Duration::from_millis(200)).await.is_none());
        assert_eq!(service.accepted(), 1);
    }

    #[tokio::test]
    async fn test_inbound_messages_arrive_in_order() {
        let service = LoopbackService::bind().await;
        let manager = ConnectionManager::new(Some(service.ws_url("s1")), LivenessPolicy::disabled());
        let mut received = collecting_handler(&manager);

        manager.connect().expect("connect");
        let mut peer = service.accept().await;
        wait_for_state(&manager, ConnectionState::Open).await;

        for i in 0..20 {
            peer.send_text(&format!(r#"{{"counter":{i}}}"#)).await;
        }
        peer.send_binary(vec![1, 2, 3]).await;
        peer.send_text(r#"{"type":"keepalive"}"#).await;

        for i in 0..20 {
            let text = timeout(WAIT, received.recv()).await.expect("in time").expect("open");
            assert_eq!(text, format!(r#"{{"counter":{i}}}"#));
        }
        let text = timeout(WAIT, received.recv()).await.expect("in time").expect("open");
        assert_eq!(text, r#"{"type":"keepalive"}"#);
    }

    #[tokio::test]
    async fn test_disconnect_sends_stop_then_closes() {
        let service = LoopbackService::bind().await;
        let manager = ConnectionManager::new(Some(service.ws_url("s1")), LivenessPolicy::disabled());

        manager.connect().expect("connect");
        let mut peer = service.accept().await;
        wait_for_state(&manager, ConnectionState::Open).await;

        let (_, observed) = tokio::join!(manager.disconnect(), async {
            let first = peer.next_text().await;
            let closed = peer.expect_close().await;
            (first, closed)
        });

        assert_eq!(observed.0.as_deref(), Some(r#"{"type":"stop"}"#));
        assert!(observed.1);
        assert_eq!(manager.state(), ConnectionState::Closed);
        assert!(manager.last_error().is_none());

        manager.disconnect().await;
        assert_eq!(manager.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_disconnect_before_connect_is_closed() {
        let manager = ConnectionManager::new(None, LivenessPolicy::disabled());
        manager.disconnect().await;
        assert_eq!(manager.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_disconnect_while_connecting() {
        // Listener that never completes the WebSocket handshake
        let service = LoopbackService::bind().await;
        let manager = ConnectionManager::new(Some(service.ws_url("s1")), LivenessPolicy::disabled());

        manager.connect().expect("connect");
        assert_eq!(manager.state(), ConnectionState::Connecting);

        timeout(WAIT, manager.disconnect()).await.expect("disconnect does not hang");
        assert_eq!(manager.state(), ConnectionState::Closed);
        assert!(manager.last_error().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_service_fails_with_hint() {
        let url = LoopbackService::unused_url("s1").await;
        let manager = ConnectionManager::new(Some(url), LivenessPolicy::disabled());

        manager.connect().expect("connect starts");
        wait_for_state(&manager, ConnectionState::Failed).await;

        let err = manager.last_error().expect("error recorded");
        assert!(matches!(*err, Error::Connection { .. }));
        assert!(err.to_string().contains("check if backend is running"));

        // A failed connection can be retried
        manager.connect().expect("reconnect starts");
        assert_eq!(manager.attempt_count(), 2);
    }

    #[tokio::test]
    async fn test_abrupt_drop_is_abnormal() {
        let service = LoopbackService::bind().await;
        let manager = ConnectionManager::new(Some(service.ws_url("s1")), LivenessPolicy::disabled());

        manager.connect().expect("connect");
        let peer = service.accept().await;
        wait_for_state(&manager, ConnectionState::Open).await;

        drop(peer);
        wait_for_state(&manager, ConnectionState::Failed).await;
        assert!(
            manager
                .last_error()
                .is_some_and(|e| e.is_connection_error())
        );
    }

    #[tokio::test]
    async fn test_close_frame_is_normal_close() {
        let service = LoopbackService::bind().await;
        let manager = ConnectionManager::new(Some(service.ws_url("s1")), LivenessPolicy::disabled());

        manager.connect().expect("connect");
        let mut peer = service.accept().await;
        wait_for_state(&manager, ConnectionState::Open).await;

        peer.close().await;
        wait_for_state(&manager, ConnectionState::Closed).await;
        assert!(manager.last_error().is_none());
    }

    #[tokio::test]
    async fn test_liveness_timeout_fails_silent_connection() {
        let service = LoopbackService::bind().await;
        let policy = LivenessPolicy::with_timeout(Duration::from_millis(150));
        let manager = ConnectionManager::new(Some(service.ws_url("s1")), policy);

        manager.connect().expect("connect");
        let _peer = service.accept().await;
        wait_for_state(&manager, ConnectionState::Failed).await;

        let err = manager.last_error().expect("error recorded");
        assert!(matches!(*err, Error::ConnectionTimeout { timeout_ms: 150 }));
    }

    #[tokio::test]
    async fn test_keepalives_hold_liveness() {
        let service = LoopbackService::bind().await;
        let policy = LivenessPolicy::with_timeout(Duration::from_millis(300));
        let manager = ConnectionManager::new(Some(service.ws_url("s1")), policy);

        manager.connect().expect("connect");
        let mut peer = service.accept().await;
        wait_for_state(&manager, ConnectionState::Open).await;

        for _ in 0..6 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            peer.send_text(r#"{"type":"keepalive"}"#).await;
        }
        assert_eq!(manager.state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn test_send_frame_requires_open() {
        let manager = ConnectionManager::new(None, LivenessPolicy::disabled());
        let err = manager
            .send_frame(test_frame(vec![1]))
            .await
            .expect_err("not connected");
        assert!(matches!(err, Error::NotConnected));
    }

    #[tokio::test]
    async fn test_send_frame_is_binary() {
        let service = LoopbackService::bind().await;
        let manager = ConnectionManager::new(Some(service.ws_url("s1")), LivenessPolicy::disabled());

        manager.connect().expect("connect");
        let mut peer = service.accept().await;
        wait_for_state(&manager, ConnectionState::Open).await;

        manager
            .send_frame(test_frame(vec![0xFF, 0xD8, 0xFF]))
            .await
            .expect("frame sent");
        assert_eq!(peer.next_binary().await, Some(vec![0xFF, 0xD8, 0xFF]));
    }

    #[tokio::test]
    async fn test_handler_can_be_cleared() {
        let service = LoopbackService::bind().await;
        let manager = ConnectionManager::new(Some(service.ws_url("s1")), LivenessPolicy::disabled());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        manager.set_message_handler(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        manager.clear_message_handler();

        manager.connect().expect("connect");
        let mut peer = service.accept().await;
        wait_for_state(&manager, ConnectionState::Open).await;
        peer.send_text(r#"{"counter":1}"#).await;
        peer.close().await;
        wait_for_state(&manager, ConnectionState::Closed).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
