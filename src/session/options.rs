//! Session tuning options.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use exercise_session::SessionOptions;
//!
//! let options = SessionOptions::new()
//!     .with_frame_size(640, 480)
//!     .with_jpeg_quality(70)
//!     .with_keepalive_timeout(Duration::from_secs(10));
//! assert!(options.validate().is_ok());
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::capture::{CaptureSettings, EncoderSettings};
use crate::error::{Error, Result};
use crate::transport::LivenessPolicy;

// ============================================================================
// SessionOptions
// ============================================================================

/// Frame geometry, cadence and liveness for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionOptions {
    /// Outbound frame size and JPEG quality.
    pub encoder: EncoderSettings,
    /// Tick cadence and sample spacing.
    pub capture: CaptureSettings,
    /// Stall detection.
    pub liveness: LivenessPolicy,
    /// Skip the final-metrics request on stop.
    pub skip_final_metrics: bool,
}

// ============================================================================
// Builder Methods
// ============================================================================

impl SessionOptions {
    /// Creates options with the default 480x360 / q50 / 66 ms profile.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the outbound frame size.
    #[inline]
    #[must_use]
    pub fn with_frame_size(mut self, width: u32, height: u32) -> Self {
        self.encoder.width = width;
        self.encoder.height = height;
        self
    }

    /// Sets the JPEG quality (1-100).
    #[inline]
    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.encoder.quality = quality;
        self
    }

    /// Sets the minimum spacing between outbound frames.
    #[inline]
    #[must_use]
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.capture.frame_interval = interval;
        self
    }

    /// Sets how often the capture task wakes up.
    #[inline]
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.capture.tick = tick;
        self
    }

    /// Fails the connection after `timeout` without inbound messages.
    #[inline]
    #[must_use]
    pub fn with_keepalive_timeout(mut self, timeout: Duration) -> Self {
        self.liveness = LivenessPolicy::with_timeout(timeout);
        self
    }

    /// Does not request final metrics when the session stops.
    #[inline]
    #[must_use]
    pub fn without_final_metrics(mut self) -> Self {
        self.skip_final_metrics = true;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl SessionOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for zero durations, zero frame size or a
    /// quality outside 1-100.
    pub fn validate(&self) -> Result<()> {
        self.encoder.validate()?;

        if self.capture.tick.is_zero() {
            return Err(Error::config("Capture tick must be greater than zero"));
        }
        if self.capture.frame_interval.is_zero() {
            return Err(Error::config("Frame interval must be greater than zero"));
        }
        if self.liveness.keepalive_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::config("Keepalive timeout must be greater than zero"));
        }
        Ok(())
    }

    /// Target outbound frames per second.
    #[must_use]
    pub fn target_fps(&self) -> f64 {
        1.0 / self.capture.frame_interval.as_secs_f64()
    }
}

// ============================================================================
// Tests
// ============================================================================
