//! Session controller.
//!
//! Composition root of a streaming session. Owns the connection, the frame
//! source, the transmitter and the telemetry merger, and exposes the live
//! snapshot and error state.
//!
//! # Lifecycle
//!
//! ```text
//! start() ──► connect ──► Open ──► capture running ──► stop()
//!                │                      │                 │
//!                │                      │                 ├─ capture stopped, device released
//!                │                      │                 ├─ {"type":"stop"}, close
//!                │                      │                 └─ final metrics (REST)
//!                └─ Failed ─────────────┴─ capture stopped, last_error set
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{FinalMetrics, SessionApi, SessionInfo};
use crate::capture::{CaptureHandle, CapturePipeline, SharedSource};
use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::protocol::{HandshakeAck, MessageKind};
use crate::telemetry::{MergeOutcome, MergeStats, MetricsSnapshot, TelemetryMerger};
use crate::transmitter::{FrameSink, TransmitStats, Transmitter};
use crate::transport::{ConnectionFault, ConnectionManager, ConnectionState};

use super::builder::SessionBuilder;
use super::options::SessionOptions;

// ============================================================================
// Inner
// ============================================================================

/// State shared with the supervisor task.
struct Inner {
    instance_id: Uuid,
    session_id: Option<SessionId>,
    options: SessionOptions,
    connection: Arc<ConnectionManager>,
    source: SharedSource,
    transmitter: Arc<Transmitter>,
    api: Option<Arc<dyn SessionApi>>,
    merger: Arc<Mutex<TelemetryMerger>>,
    snapshot_tx: Arc<watch::Sender<MetricsSnapshot>>,
    error_tx: Arc<watch::Sender<ConnectionFault>>,
    capture: Mutex<Option<CaptureHandle>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    final_metrics: Mutex<Option<FinalMetrics>>,
}

impl Inner {
    fn set_error(&self, error: Arc<Error>) {
        warn!(instance = %self.instance_id, error = %error, "Session error");
        self.error_tx.send_replace(Some(error));
    }
}

// ============================================================================
// SessionController
// ============================================================================

/// One live exercise-coaching session.
///
/// # Example
///
/// ```no_run
/// use exercise_session::{SessionController, SessionId, StaticSource, RawFrame};
///
/// # async fn example() -> exercise_session::Result<()> {
/// let session = SessionController::builder()
///     .session_id(SessionId::new("abc123")?)
///     .source(StaticSource::new(RawFrame::solid(640, 480, [0, 0, 0])?))
///     .http_api()
///     .build()?;
///
/// session.start()?;
/// // ... render session.snapshot() ...
/// let results = session.stop().await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionController {
    inner: Arc<Inner>,
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("instance_id", &self.inner.instance_id)
            .field("session_id", &self.inner.session_id)
            .field("state", &self.state())
            .field("streaming", &self.is_streaming())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SessionController - Constructor
// ============================================================================

impl SessionController {
    /// Creates a builder.
    #[inline]
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub(super) fn from_parts(
        session_id: Option<SessionId>,
        options: SessionOptions,
        connection: Arc<ConnectionManager>,
        source: SharedSource,
        api: Option<Arc<dyn SessionApi>>,
    ) -> Self {
        let sink: Arc<dyn FrameSink> = connection.clone();
        let transmitter = Arc::new(Transmitter::new(
            sink,
            options.encoder,
            options.capture.frame_interval,
        ));

        let merger = Arc::new(Mutex::new(TelemetryMerger::new(Instant::now())));
        let (snapshot_tx, _) = watch::channel(MetricsSnapshot::default());
        let (error_tx, _) = watch::channel(None);
        let snapshot_tx = Arc::new(snapshot_tx);
        let error_tx = Arc::new(error_tx);

        connection.set_message_handler(Self::message_handler(
            Arc::clone(&merger),
            Arc::clone(&snapshot_tx),
            Arc::clone(&error_tx),
        ));

        let instance_id = Uuid::new_v4();
        debug!(instance = %instance_id, session_id = ?session_id, "Session controller created");

        Self {
            inner: Arc::new(Inner {
                instance_id,
                session_id,
                options,
                connection,
                source,
                transmitter,
                api,
                merger,
                snapshot_tx,
                error_tx,
                capture: Mutex::new(None),
                supervisor: Mutex::new(None),
                final_metrics: Mutex::new(None),
            }),
        }
    }

    /// Folds inbound messages into the snapshot on the connection's event loop.
    fn message_handler(
        merger: Arc<Mutex<TelemetryMerger>>,
        snapshot_tx: Arc<watch::Sender<MetricsSnapshot>>,
        error_tx: Arc<watch::Sender<ConnectionFault>>,
    ) -> crate::transport::MessageHandler {
        Box::new(move |text| {
            let mut merger = merger.lock();
            match merger.ingest(text, Instant::now()) {
                MergeOutcome::Applied => {
                    snapshot_tx.send_replace(merger.snapshot().clone());
                }
                MergeOutcome::ServiceError(error) => {
                    error_tx.send_replace(Some(Arc::new(error)));
                }
                MergeOutcome::Handshake | MergeOutcome::Heartbeat | MergeOutcome::Discarded(_) => {}
            }
        })
    }
}

// ============================================================================
// SessionController - Lifecycle
// ============================================================================

impl SessionController {
    /// Starts the session.
    ///
    /// Resets the snapshot, connects, and starts capture once the connection
    /// is open. Returns without waiting for the connection. A no-op while
    /// the session is already connecting or open.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if no session identifier is configured.
    pub fn start(&self) -> Result<()> {
        let inner = &self.inner;

        if inner.connection.state().is_active() {
            debug!(instance = %inner.instance_id, "Session already started");
            return Ok(());
        }

        inner.merger.lock().reset(Instant::now());
        inner.snapshot_tx.send_replace(MetricsSnapshot::default());
        inner.error_tx.send_replace(None);
        inner.final_metrics.lock().take();

        if inner.session_id.is_none() {
            inner.set_error(Arc::new(Error::connection("No session ID")));
            return Err(Error::connection("No session ID"));
        }
        inner.connection.connect()?;

        info!(
            instance = %inner.instance_id,
            session_id = ?inner.session_id,
            "Session starting"
        );

        let supervisor = tokio::spawn(Self::supervise(Arc::clone(inner)));
        if let Some(previous) = inner.supervisor.lock().replace(supervisor) {
            previous.abort();
        }
        Ok(())
    }

    /// Starts capture once the connection opens, then records how it ended.
    async fn supervise(inner: Arc<Inner>) {
        let mut state_rx = inner.connection.subscribe();

        let opened = match state_rx
            .wait_for(|s| matches!(s, ConnectionState::Open | ConnectionState::Closed | ConnectionState::Failed))
            .await
        {
            Ok(state) => state.is_open(),
            Err(_) => false,
        };

        if opened {
            let started = CapturePipeline::start(
                Arc::clone(&inner.source),
                Arc::clone(&inner.transmitter),
                inner.connection.subscribe(),
                inner.options.capture,
            )
            .await;

            match started {
                Ok(handle) => {
                    *inner.capture.lock() = Some(handle);
                }
                Err(e) if e.is_device_error() => inner.set_error(Arc::new(e)),
                Err(e) => debug!(error = %e, "Capture not started"),
            }
        }

        let ended = state_rx
            .wait_for(|s| matches!(s, ConnectionState::Closed | ConnectionState::Failed))
            .await
            .map(|state| *state);

        if let Ok(state) = ended {
            info!(instance = %inner.instance_id, %state, "Session connection ended");
            if let Some(fault) = inner.connection.last_error() {
                inner.set_error(fault);
            }
        }
    }

    /// Stops the session.
    ///
    /// Stops capture, releases the device, sends the stop signal, closes the
    /// connection and, when a REST client is configured, fetches the final
    /// metrics. The connection always ends `Closed` and the device released,
    /// even if the connection never opened.
    ///
    /// # Errors
    ///
    /// Returns an error only if fetching the final metrics fails; teardown
    /// has completed by then.
    pub async fn stop(&self) -> Result<Option<FinalMetrics>> {
        let inner = &self.inner;

        let supervisor = inner.supervisor.lock().take();
        if let Some(supervisor) = supervisor {
            supervisor.abort();
            let _ = supervisor.await;
        }

        let capture = inner.capture.lock().take();
        if let Some(capture) = capture {
            capture.stop().await;
        }
        inner.transmitter.cancel();

        {
            let mut source = inner.source.lock().await;
            source.release().await;
        }

        inner.connection.disconnect().await;
        info!(instance = %inner.instance_id, stats = ?inner.transmitter.stats(), "Session stopped");

        if inner.options.skip_final_metrics {
            return Ok(None);
        }
        let (Some(api), Some(session_id)) = (&inner.api, &inner.session_id) else {
            return Ok(None);
        };

        let metrics = api.session_metrics(session_id).await?;
        *inner.final_metrics.lock() = Some(metrics.clone());
        Ok(Some(metrics))
    }
}

// ============================================================================
// SessionController - Accessors
// ============================================================================

impl SessionController {
    /// Returns the controller's instance id.
    #[inline]
    #[must_use]
    pub fn instance_id(&self) -> Uuid {
        self.inner.instance_id
    }

    /// Returns the session identifier, if configured.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        self.inner.session_id.as_ref()
    }

    /// Returns the options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    /// Returns the current telemetry snapshot.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    /// Subscribes to snapshot updates.
    #[must_use]
    pub fn subscribe_snapshot(&self) -> watch::Receiver<MetricsSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Returns the connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    /// Subscribes to connection state changes.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.subscribe()
    }

    /// Returns the most recent surfaced error, cleared by `start`.
    #[must_use]
    pub fn last_error(&self) -> ConnectionFault {
        self.inner.error_tx.borrow().clone()
    }

    /// Subscribes to surfaced errors.
    #[must_use]
    pub fn subscribe_errors(&self) -> watch::Receiver<ConnectionFault> {
        self.inner.error_tx.subscribe()
    }

    /// Returns `true` while the capture pipeline is running.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.inner
            .capture
            .lock()
            .as_ref()
            .is_some_and(CaptureHandle::is_running)
    }

    /// Returns outbound delivery counters.
    #[must_use]
    pub fn transmit_stats(&self) -> TransmitStats {
        self.inner.transmitter.stats()
    }

    /// Returns inbound message counters.
    #[must_use]
    pub fn merge_stats(&self) -> MergeStats {
        self.inner.merger.lock().stats()
    }

    /// Returns the kind of the most recent well-formed inbound message.
    #[must_use]
    pub fn last_kind(&self) -> Option<MessageKind> {
        self.inner.merger.lock().last_kind()
    }

    /// Returns the service's handshake ack, once received.
    #[must_use]
    pub fn handshake(&self) -> Option<HandshakeAck> {
        self.inner.merger.lock().handshake().cloned()
    }

    /// Returns the final metrics fetched by the last `stop`.
    #[must_use]
    pub fn final_metrics(&self) -> Option<FinalMetrics> {
        self.inner.final_metrics.lock().clone()
    }

    /// Looks up the session through the REST client.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no REST client or session identifier is configured
    /// - [`Error::Api`] / [`Error::Http`] if the request fails
    pub async fn session_info(&self) -> Result<SessionInfo> {
        let api = self
            .inner
            .api
            .as_ref()
            .ok_or_else(|| Error::config("No session API configured"))?;
        let session_id = self
            .inner
            .session_id
            .as_ref()
            .ok_or_else(|| Error::config("No session ID"))?;
        api.session_info(session_id).await
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(supervisor) = self.inner.supervisor.lock().take() {
            supervisor.abort();
        }
        self.inner.connection.clear_message_handler();
    }
}

// ============================================================================
// Tests
// ============================================================================
