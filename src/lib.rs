//! Exercise Session - Streaming client for live exercise coaching.
//!
//! This library streams camera frames to a remote analysis service over a
//! WebSocket and folds the telemetry it sends back (rep count, posture
//! stage, coaching feedback, calibration progress, annotated preview) into
//! one live snapshot.
//!
//! # Architecture
//!
//! The client follows a full-duplex streaming model:
//!
//! - **Outbound**: JPEG frames sampled from a local source at a fixed cadence
//! - **Inbound**: Sparse JSON telemetry patches merged into a snapshot
//!
//! Key design principles:
//!
//! - Each [`SessionController`] owns: one connection + one frame source + one event loop
//! - Capture runs only while the connection is open
//! - At most one frame in flight; late samples are dropped, never queued
//! - Malformed telemetry is logged and discarded, never fatal
//!
//! # Quick Start
//!
//! ```no_run
//! use exercise_session::{ImageSequenceSource, Result, SessionController, SessionId};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let session = SessionController::builder()
//!         .session_id(SessionId::new("abc123")?)
//!         .source(ImageSequenceSource::new("./frames"))
//!         .http_api()
//!         .build()?;
//!
//!     session.start()?;
//!
//!     let mut snapshots = session.subscribe_snapshot();
//!     while snapshots.changed().await.is_ok() {
//!         let snapshot = snapshots.borrow_and_update().clone();
//!         println!("{} reps, {}", snapshot.counter, snapshot.feedback);
//!         if snapshot.counter >= 10 {
//!             break;
//!         }
//!     }
//!
//!     if let Some(results) = session.stop().await? {
//!         println!("Final: {}", results.metrics());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | Session REST collaborator |
//! | [`capture`] | Frame sources, throttle, encoder, capture pipeline |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | WebSocket message types |
//! | [`session`] | [`SessionController`] and its builder |
//! | [`telemetry`] | Snapshot merging and rate counting |
//! | [`transmitter`] | Outbound frame delivery |
//! | [`transport`] | WebSocket connection and endpoints |
//!
//! # Features
//!
//! - `camera`: native camera capture via [`CameraSource`](capture::CameraSource)

// ============================================================================
// Modules
// ============================================================================

/// Session REST collaborator.
pub mod api;

/// Frame capture.
///
/// - [`FrameSource`] - Local video frame provider
/// - [`CapturePipeline`](capture::CapturePipeline) - Tick task feeding the transmitter
pub mod capture;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// WebSocket protocol message types.
pub mod protocol;

/// Session composition root.
///
/// Use [`SessionController::builder()`] to create a session.
pub mod session;

/// Inbound telemetry merging.
pub mod telemetry;

/// Outbound frame delivery.
pub mod transmitter;

/// WebSocket transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// API types
pub use api::{CreatedSession, ExerciseKind, FinalMetrics, HttpSessionApi, SessionApi, SessionInfo};

// Capture types
#[cfg(feature = "camera")]
pub use capture::CameraSource;
pub use capture::{EncoderSettings, FrameSource, ImageSequenceSource, PixelFormat, RawFrame, StaticSource};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::SessionId;

// Session types
pub use session::{SessionBuilder, SessionController, SessionOptions};

// Telemetry types
pub use telemetry::{Extremum, ExtremumKind, FeedbackTone, MetricsSnapshot, TelemetryMerger};

// Transmitter types
pub use transmitter::{OfferOutcome, TransmitStats};

// Transport types
pub use transport::{ConnectionState, LivenessPolicy, ServiceEndpoint};
