//! In-process WebSocket service for connection tests.
//!
//! Binds to `127.0.0.1:0` and upgrades connections only when the test asks,
//! so a client can be held mid-handshake.

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;
use url::Url;

use crate::identifiers::SessionId;
use crate::transport::ServiceEndpoint;

// ============================================================================
// Constants
// ============================================================================

/// How long a test waits for the client to show up.
const ACCEPT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a peer waits for the next client message.
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// LoopbackService
// ============================================================================

/// Bound listener standing in for the analysis service.
pub(crate) struct LoopbackService {
    listener: TcpListener,
    port: u16,
    accepted: AtomicUsize,
}

impl LoopbackService {
    /// Binds to a random local port.
    pub(crate) async fn bind() -> Self {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
        let listener = TcpListener::bind(addr).await.expect("bind loopback");
        let port = listener.local_addr().expect("local addr").port();

        debug!(port, "Loopback service bound");

        Self {
            listener,
            port,
            accepted: AtomicUsize::new(0),
        }
    }

    /// Returns the REST-style base URL.
    pub(crate) fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Returns an endpoint pointing at this service.
    pub(crate) fn endpoint(&self) -> ServiceEndpoint {
        ServiceEndpoint::new(&self.base_url()).expect("loopback endpoint")
    }

    /// Returns the socket URL for a session.
    pub(crate) fn ws_url(&self, session_id: &str) -> Url {
        let id = SessionId::new(session_id).expect("session id");
        self.endpoint().websocket_url(&id).expect("socket url")
    }

    /// Returns a socket URL on a port nothing listens on.
    pub(crate) async fn unused_url(session_id: &str) -> Url {
        let service = Self::bind().await;
        let url = service.ws_url(session_id);
        drop(service);
        url
    }

    /// Number of upgraded connections so far.
    pub(crate) fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Accepts the next client and completes the upgrade.
    pub(crate) async fn accept(&self) -> LoopbackPeer {
        self.accept_within(ACCEPT_TIMEOUT)
            .await
            .expect("client connected in time")
    }

    /// Accepts the next client if one arrives within `wait`.
    pub(crate) async fn accept_within(&self, wait: Duration) -> Option<LoopbackPeer> {
        let (stream, addr) = timeout(wait, self.listener.accept())
            .await
            .ok()?
            .expect("tcp accept");

        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .expect("websocket upgrade");

        self.accepted.fetch_add(1, Ordering::SeqCst);
        debug!(?addr, "Loopback peer connected");

        Some(LoopbackPeer { ws })
    }
}

// ============================================================================
// LoopbackPeer
// ============================================================================

/// Service side of one accepted connection.
pub(crate) struct LoopbackPeer {
    ws: WebSocketStream<TcpStream>,
}

impl LoopbackPeer {
    pub(crate) async fn send_text(&mut self, text: &str) {
        self.ws
            .send(Message::Text(text.to_string().into()))
            .await
            .expect("send text");
    }

    pub(crate) async fn send_binary(&mut self, data: Vec<u8>) {
        self.ws
            .send(Message::Binary(data.into()))
            .await
            .expect("send binary");
    }

    /// Sends a close frame.
    pub(crate) async fn close(&mut self) {
        let _ = self.ws.close(None).await;
    }

    /// Next data message, skipping control frames. `None` once closed.
    pub(crate) async fn recv(&mut self) -> Option<Message> {
        loop {
            let message = timeout(RECV_TIMEOUT, self.ws.next()).await.ok()??.ok()?;
            match message {
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
                other => return Some(other),
            }
        }
    }

    pub(crate) async fn next_text(&mut self) -> Option<String> {
        match self.recv().await? {
            Message::Text(text) => Some(text.as_str().to_string()),
            _ => None,
        }
    }

    pub(crate) async fn next_binary(&mut self) -> Option<Vec<u8>> {
        match self.recv().await? {
            Message::Binary(data) => Some(data.to_vec()),
            _ => None,
        }
    }

    /// Returns `true` if the client closes next (close frame or EOF).
    pub(crate) async fn expect_close(&mut self) -> bool {
        matches!(self.recv().await, None | Some(Message::Close(_)))
    }
}
