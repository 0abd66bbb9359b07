//! Inbound message dispatch and snapshot merging.
//!
//! The merger is driven from the connection's event loop, one text message
//! at a time, in arrival order. It never fails: malformed payloads become
//! [`MergeOutcome::Discarded`] and leave the snapshot untouched.

// ============================================================================
// Imports
// ============================================================================

use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::protocol::{HandshakeAck, InboundMessage, MessageKind};

use super::fps::FpsWindow;
use super::snapshot::MetricsSnapshot;

// ============================================================================
// MergeOutcome
// ============================================================================

/// Result of feeding one message to the merger.
#[derive(Debug)]
pub enum MergeOutcome {
    /// Handshake ack recorded.
    Handshake,
    /// Keepalive ignored.
    Heartbeat,
    /// Service reported an error; the caller should surface it.
    ServiceError(Error),
    /// Telemetry patch applied.
    Applied,
    /// Payload was malformed and dropped.
    Discarded(Error),
}

// ============================================================================
// MergeStats
// ============================================================================

/// Counters over everything the merger has seen since the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Messages fed in, including malformed ones.
    pub received: u64,
    /// Data patches applied.
    pub applied: u64,
    /// Malformed payloads dropped.
    pub discarded: u64,
}

// ============================================================================
// TelemetryMerger
// ============================================================================

/// Folds inbound telemetry into a [`MetricsSnapshot`].
#[derive(Debug, Clone)]
pub struct TelemetryMerger {
    snapshot: MetricsSnapshot,
    fps: FpsWindow,
    handshake: Option<HandshakeAck>,
    last_kind: Option<MessageKind>,
    stats: MergeStats,
}

impl TelemetryMerger {
    /// Creates a merger with a default snapshot.
    #[must_use]
    pub fn new(now: Instant) -> Self {
        Self {
            snapshot: MetricsSnapshot::default(),
            fps: FpsWindow::new(now),
            handshake: None,
            last_kind: None,
            stats: MergeStats::default(),
        }
    }

    /// Discards all session state.
    pub fn reset(&mut self, now: Instant) {
        *self = Self::new(now);
    }

    /// Parses a raw text message and dispatches it.
    pub fn ingest(&mut self, text: &str, now: Instant) -> MergeOutcome {
        self.stats.received += 1;

        match InboundMessage::parse(text) {
            Ok(message) => self.dispatch(message, now),
            Err(e) => {
                warn!(error = %e, len = text.len(), "Discarding malformed message");
                self.stats.discarded += 1;
                MergeOutcome::Discarded(e)
            }
        }
    }

    /// Dispatches an already-classified message.
    pub fn dispatch(&mut self, message: InboundMessage, now: Instant) -> MergeOutcome {
        self.last_kind = Some(message.kind());

        match message {
            InboundMessage::Connected(ack) => {
                debug!(session_id = ?ack.session_id, "Session handshake acknowledged");
                self.handshake = Some(ack);
                MergeOutcome::Handshake
            }

            InboundMessage::Keepalive => {
                trace!("Keepalive");
                MergeOutcome::Heartbeat
            }

            InboundMessage::ServiceError(message) => {
                warn!(error = %message, "Service reported error");
                MergeOutcome::ServiceError(Error::service(message))
            }

            InboundMessage::Data(patch) => {
                if let Some(fps) = self.fps.record(now) {
                    self.snapshot.fps = fps;
                }
                self.snapshot.apply(patch);
                self.stats.applied += 1;
                MergeOutcome::Applied
            }
        }
    }

    /// Returns the current snapshot.
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> &MetricsSnapshot {
        &self.snapshot
    }

    /// Returns the handshake ack, once received.
    #[inline]
    #[must_use]
    pub fn handshake(&self) -> Option<&HandshakeAck> {
        self.handshake.as_ref()
    }

    /// Returns the kind of the most recent well-formed message.
    #[inline]
    #[must_use]
    pub fn last_kind(&self) -> Option<MessageKind> {
        self.last_kind
    }

    /// Returns message counters.
    #[inline]
    #[must_use]
    pub fn stats(&self) -> MergeStats {
        self.stats
    }
}

// ============================================================================
// Tests
// ============================================================================
