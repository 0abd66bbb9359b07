//! Local frame capture.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `source` | [`FrameSource`] trait, [`RawFrame`], [`StaticSource`] |
//! | `replay` | [`ImageSequenceSource`] for headless runs |
//! | `camera` | [`CameraSource`] (feature `camera`) |
//! | `throttle` | [`FrameThrottle`] sample-rate limiter |
//! | `encoder` | JPEG encoding at fixed size and quality |
//! | `pipeline` | Tick task binding a source to the transmitter |

// ============================================================================
// Submodules
// ============================================================================

#[cfg(feature = "camera")]
pub mod camera;
pub mod encoder;
pub mod pipeline;
pub mod replay;
pub mod source;
pub mod throttle;

// ============================================================================
// Re-exports
// ============================================================================

#[cfg(feature = "camera")]
pub use camera::CameraSource;
pub use encoder::{DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH, DEFAULT_JPEG_QUALITY, EncoderSettings};
pub use pipeline::{CaptureHandle, CapturePipeline, CaptureSettings, DEFAULT_TICK, SharedSource};
pub use replay::ImageSequenceSource;
pub use source::{FrameSource, PixelFormat, RawFrame, SourceProbe, StaticSource};
pub use throttle::{DEFAULT_FRAME_INTERVAL, FrameThrottle};
