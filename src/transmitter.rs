//! Outbound frame delivery with drop-on-busy backpressure.
//!
//! At most one frame is in flight (encoding or sending) at any time. A
//! sample offered while the previous one is still outstanding is dropped,
//! never queued, so a slow link lowers the frame rate instead of building
//! latency.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{trace, warn};

use crate::capture::{EncoderSettings, RawFrame};
use crate::error::{Error, Result};
use crate::protocol::OutboundFrame;
use crate::transport::ConnectionManager;

// ============================================================================
// FrameSink
// ============================================================================

/// Destination for encoded frames.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Returns `true` if frames may be sent now.
    fn is_open(&self) -> bool;

    /// Delivers one frame.
    async fn send_frame(&self, frame: OutboundFrame) -> Result<()>;
}

#[async_trait]
impl FrameSink for ConnectionManager {
    fn is_open(&self) -> bool {
        self.state().is_open()
    }

    async fn send_frame(&self, frame: OutboundFrame) -> Result<()> {
        ConnectionManager::send_frame(self, frame).await
    }
}

// ============================================================================
// OfferOutcome
// ============================================================================

/// What happened to an offered sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OfferOutcome {
    /// Handed to the encoder; delivery continues in the background.
    Dispatched,
    /// A previous frame is still being encoded or sent.
    DroppedBusy,
    /// Less than the minimum interval since the previous attempt.
    DroppedTooSoon,
    /// The connection is not open.
    DroppedNotOpen,
}

impl OfferOutcome {
    #[inline]
    #[must_use]
    pub fn is_dropped(&self) -> bool {
        !matches!(self, Self::Dispatched)
    }
}

// ============================================================================
// TransmitStats
// ============================================================================

/// Delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransmitStats {
    /// Frames written to the socket.
    pub sent: u64,
    /// Samples dropped before encoding.
    pub dropped: u64,
    /// Frames that failed to encode or send.
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    sent: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> TransmitStats {
        TransmitStats {
            sent: self.sent.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Clears the in-flight flag when the delivery task ends, even if aborted.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ============================================================================
// Transmitter
// ============================================================================

/// Encodes samples and pushes them to a [`FrameSink`].
pub struct Transmitter {
    sink: Arc<dyn FrameSink>,
    encoder: EncoderSettings,
    min_interval: Duration,
    in_flight: Arc<AtomicBool>,
    last_attempt: Mutex<Option<Instant>>,
    task: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for Transmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transmitter")
            .field("encoder", &self.encoder)
            .field("min_interval", &self.min_interval)
            .field("busy", &self.is_busy())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Transmitter {
    /// Creates a transmitter.
    #[must_use]
    pub fn new(sink: Arc<dyn FrameSink>, encoder: EncoderSettings, min_interval: Duration) -> Self {
        Self {
            sink,
            encoder,
            min_interval,
            in_flight: Arc::new(AtomicBool::new(false)),
            last_attempt: Mutex::new(None),
            task: Mutex::new(None),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Offers one sample captured at `now`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn offer(&self, frame: RawFrame, now: Instant) -> OfferOutcome {
        let outcome = self.admit(now);

        if outcome.is_dropped() {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            trace!(?outcome, "Sample dropped");
            return outcome;
        }

        let guard = InFlightGuard(Arc::clone(&self.in_flight));
        let sink = Arc::clone(&self.sink);
        let counters = Arc::clone(&self.counters);
        let encoder = self.encoder;

        let task = tokio::spawn(async move {
            let _guard = guard;
            match Self::deliver(sink, encoder, frame, now).await {
                Ok(bytes) => {
                    counters.sent.fetch_add(1, Ordering::Relaxed);
                    trace!(bytes, "Frame delivered");
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, "Frame delivery failed");
                }
            }
        });

        *self.task.lock() = Some(task);
        outcome
    }

    fn admit(&self, now: Instant) -> OfferOutcome {
        if !self.sink.is_open() {
            return OfferOutcome::DroppedNotOpen;
        }

        let mut last_attempt = self.last_attempt.lock();
        if last_attempt.is_some_and(|last| now.saturating_duration_since(last) < self.min_interval) {
            return OfferOutcome::DroppedTooSoon;
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return OfferOutcome::DroppedBusy;
        }

        *last_attempt = Some(now);
        OfferOutcome::Dispatched
    }

    async fn deliver(
        sink: Arc<dyn FrameSink>,
        encoder: EncoderSettings,
        frame: RawFrame,
        captured_at: Instant,
    ) -> Result<usize> {
        let data = tokio::task::spawn_blocking(move || encoder.encode(&frame))
            .await
            .map_err(encoder_failure)??;

        // The connection may have closed while encoding
        if !sink.is_open() {
            return Err(Error::NotConnected);
        }

        let bytes = data.len();
        sink.send_frame(OutboundFrame {
            data,
            width: encoder.width,
            height: encoder.height,
            captured_at,
        })
        .await?;
        Ok(bytes)
    }

    /// Returns `true` while a frame is being encoded or sent.
    #[inline]
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Returns delivery counters.
    #[must_use]
    pub fn stats(&self) -> TransmitStats {
        self.counters.snapshot()
    }

    /// Returns the encoder settings.
    #[inline]
    #[must_use]
    pub fn encoder(&self) -> &EncoderSettings {
        &self.encoder
    }

    /// Waits for the in-flight frame, if any, to finish.
    pub async fn flush(&self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    /// Abandons the in-flight frame, if any.
    pub fn cancel(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

/// Maps a failed encoder task to a capture error.
fn encoder_failure(e: JoinError) -> Error {
    Error::device(format!("frame encoder failed: {e}"))
}

// ============================================================================
// Tests
// ============================================================================
