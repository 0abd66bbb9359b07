//! Live metrics snapshot.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use crate::protocol::TelemetryPatch;

// ============================================================================
// Constants
// ============================================================================

/// Stage label before the service reports one.
pub const DEFAULT_STAGE: &str = "-";

/// Feedback text before the service reports any.
pub const DEFAULT_FEEDBACK: &str = "Waiting...";

// ============================================================================
// MetricsSnapshot
// ============================================================================

/// Merged view of all telemetry received in the current session.
///
/// Mutated only by [`TelemetryMerger`](super::TelemetryMerger); callers get clones.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    /// Repetition counter.
    pub counter: u32,
    /// Posture stage label.
    pub stage: String,
    /// Coaching feedback.
    pub feedback: String,
    /// Calibration progress (0–100).
    pub calibration_progress: f64,
    /// Calibration finished flag.
    pub calibration_complete: bool,
    /// Inbound data messages per second.
    pub fps: u32,
    /// Most recent annotated preview image (JPEG bytes).
    pub preview_frame: Option<Arc<[u8]>>,
    /// Vertical jump extremum.
    pub max_height_cm: Option<f64>,
    /// Broad jump extremum.
    pub max_distance_cm: Option<f64>,
    /// Sit-and-reach extremum.
    pub max_reach_cm: Option<f64>,
    /// Skipping / jumping jack count.
    pub jump_count: Option<u32>,
    /// Generic repetition count.
    pub rep_count: Option<u32>,
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self {
            counter: 0,
            stage: DEFAULT_STAGE.to_string(),
            feedback: DEFAULT_FEEDBACK.to_string(),
            calibration_progress: 0.0,
            calibration_complete: false,
            fps: 0,
            preview_frame: None,
            max_height_cm: None,
            max_distance_cm: None,
            max_reach_cm: None,
            jump_count: None,
            rep_count: None,
        }
    }
}

impl MetricsSnapshot {
    /// Applies a sparse patch: present fields overwrite, absent fields are kept.
    pub fn apply(&mut self, patch: TelemetryPatch) {
        let TelemetryPatch {
            counter,
            stage,
            feedback,
            calibration_progress,
            calibration_complete,
            preview_frame,
            max_reach_cm,
            max_height_cm,
            max_distance_cm,
            jump_count,
            rep_count,
        } = patch;

        overwrite(&mut self.counter, counter);
        overwrite(&mut self.stage, stage);
        overwrite(&mut self.feedback, feedback);
        overwrite(&mut self.calibration_progress, calibration_progress);
        overwrite(&mut self.calibration_complete, calibration_complete);

        if let Some(frame) = preview_frame {
            self.preview_frame = Some(Arc::from(frame));
        }
        if max_reach_cm.is_some() {
            self.max_reach_cm = max_reach_cm;
        }
        if max_height_cm.is_some() {
            self.max_height_cm = max_height_cm;
        }
        if max_distance_cm.is_some() {
            self.max_distance_cm = max_distance_cm;
        }
        if jump_count.is_some() {
            self.jump_count = jump_count;
        }
        if rep_count.is_some() {
            self.rep_count = rep_count;
        }
    }

    /// Classifies the current feedback text for display.
    #[must_use]
    pub fn feedback_tone(&self) -> FeedbackTone {
        FeedbackTone::classify(&self.feedback)
    }

    /// Returns the populated distance extremum, preferring height, then distance, then reach.
    #[must_use]
    pub fn primary_extremum(&self) -> Option<Extremum> {
        [
            (ExtremumKind::MaxHeight, self.max_height_cm),
            (ExtremumKind::MaxDistance, self.max_distance_cm),
            (ExtremumKind::MaxReach, self.max_reach_cm),
        ]
        .into_iter()
        .find_map(|(kind, value)| value.filter(|v| *v != 0.0).map(|cm| Extremum { kind, cm }))
    }
}

#[inline]
fn overwrite<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

// ============================================================================
// FeedbackTone
// ============================================================================

/// Display tone of a coaching message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedbackTone {
    /// Positive reinforcement.
    Success,
    /// Form correction.
    Warning,
    /// Anything else.
    #[default]
    Neutral,
}

impl FeedbackTone {
    const SUCCESS_WORDS: [&str; 3] = ["good", "great", "max"];
    const WARNING_WORDS: [&str; 3] = ["fix", "lower", "straight"];

    /// Classifies feedback text by keyword, case-insensitively.
    #[must_use]
    pub fn classify(feedback: &str) -> Self {
        let lower = feedback.to_lowercase();
        if Self::SUCCESS_WORDS.iter().any(|w| lower.contains(w)) {
            Self::Success
        } else if Self::WARNING_WORDS.iter().any(|w| lower.contains(w)) {
            Self::Warning
        } else {
            Self::Neutral
        }
    }
}

// ============================================================================
// Extremum
// ============================================================================

/// Which exercise-specific distance a value measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtremumKind {
    /// Vertical jump height.
    MaxHeight,
    /// Broad jump distance.
    MaxDistance,
    /// Sit-and-reach distance.
    MaxReach,
}

impl ExtremumKind {
    /// Returns a display label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::MaxHeight => "Max Height",
            Self::MaxDistance => "Max Distance",
            Self::MaxReach => "Max Reach",
        }
    }
}

/// A labelled distance in centimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extremum {
    /// What is measured.
    pub kind: ExtremumKind,
    /// Value in centimetres.
    pub cm: f64,
}

// ============================================================================
// Tests
// ============================================================================
