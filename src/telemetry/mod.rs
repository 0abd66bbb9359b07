//! Inbound telemetry merging.
//!
//! The analysis service pushes sparse telemetry patches. This module folds
//! them into a single [`MetricsSnapshot`] and derives the inbound message
//! rate.
//!
//! # Merge Rule
//!
//! Only fields present in a `data` message overwrite the snapshot; absent
//! fields keep their previous value. The snapshot is only rolled back by
//! [`TelemetryMerger::reset`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `fps` | One-second message rate window |
//! | `merger` | Message dispatch and merging |
//! | `snapshot` | Snapshot type and display helpers |

// ============================================================================
// Submodules
// ============================================================================

/// Message rate window.
pub mod fps;

/// Message dispatch and merging.
pub mod merger;

/// Snapshot type.
pub mod snapshot;

// ============================================================================
// Re-exports
// ============================================================================

pub use fps::{FPS_WINDOW, FpsWindow};
pub use merger::{MergeOutcome, MergeStats, TelemetryMerger};
pub use snapshot::{Extremum, ExtremumKind, FeedbackTone, MetricsSnapshot};
