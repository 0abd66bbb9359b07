//! Frame source abstraction.
//!
//! A [`FrameSource`] is anything that can hand out the most recent raw
//! frame: a camera, a directory of images, or a fixed test frame.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Error, Result};

// ============================================================================
// PixelFormat
// ============================================================================

/// Pixel layout of a [`RawFrame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// 8-bit RGB.
    #[default]
    Rgb8,
    /// 8-bit RGBA.
    Rgba8,
}

impl PixelFormat {
    /// Bytes per pixel.
    #[inline]
    #[must_use]
    pub const fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
        }
    }
}

// ============================================================================
// RawFrame
// ============================================================================

/// Uncompressed frame as produced by a source.
///
/// Pixel data is reference-counted so handing the same frame out repeatedly
/// does not copy it.
#[derive(Clone, PartialEq, Eq)]
pub struct RawFrame {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Arc<[u8]>,
}

impl fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

impl RawFrame {
    /// Creates a frame, checking the buffer length against the dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] if the frame is empty or the buffer has
    /// the wrong length.
    pub fn new(width: u32, height: u32, format: PixelFormat, pixels: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::device(format!("empty frame {width}x{height}")));
        }

        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if pixels.len() != expected {
            return Err(Error::device(format!(
                "frame buffer is {} bytes, expected {expected} for {width}x{height} {format:?}",
                pixels.len()
            )));
        }

        Ok(Self {
            width,
            height,
            format,
            pixels: pixels.into(),
        })
    }

    /// Creates a single-color RGB frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] if either dimension is zero.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self> {
        let pixels = rgb.repeat(width as usize * height as usize);
        Self::new(width, height, PixelFormat::Rgb8, pixels)
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    #[must_use]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Returns the raw pixel bytes.
    #[inline]
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

// ============================================================================
// FrameSource
// ============================================================================

/// Local video frame provider.
#[async_trait]
pub trait FrameSource: Send {
    /// Opens the device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] if the device is missing or access is denied.
    async fn acquire(&mut self) -> Result<()>;

    /// Returns the most recent frame, or `None` while the source has no data yet.
    fn latest_frame(&mut self) -> Option<RawFrame>;

    /// Closes the device. Safe to call when not acquired.
    async fn release(&mut self);

    /// Returns `true` between a successful `acquire` and `release`.
    fn is_acquired(&self) -> bool;

    /// Short name for logs.
    fn name(&self) -> &str {
        "frame-source"
    }
}

// ============================================================================
// SourceProbe
// ============================================================================

/// Observes a [`StaticSource`] after it has been handed to a session.
#[derive(Debug, Clone, Default)]
pub struct SourceProbe {
    acquired: Arc<AtomicBool>,
    acquisitions: Arc<AtomicUsize>,
    frames_served: Arc<AtomicUsize>,
}

impl SourceProbe {
    /// Returns `true` while the source is acquired.
    #[must_use]
    pub fn is_acquired(&self) -> bool {
        self.acquired.load(Ordering::Acquire)
    }

    /// Returns how many times the source was acquired.
    #[must_use]
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::Acquire)
    }

    /// Returns how many frames were handed out.
    #[must_use]
    pub fn frames_served(&self) -> usize {
        self.frames_served.load(Ordering::Acquire)
    }
}

// ============================================================================
// StaticSource
// ============================================================================

/// Source that always yields the same frame.
#[derive(Debug)]
pub struct StaticSource {
    frame: RawFrame,
    denied: Option<String>,
    probe: SourceProbe,
}

impl StaticSource {
    /// Creates a source yielding `frame`.
    #[must_use]
    pub fn new(frame: RawFrame) -> Self {
        Self {
            frame,
            denied: None,
            probe: SourceProbe::default(),
        }
    }

    /// Creates a source whose `acquire` always fails, like a device with access denied.
    #[must_use]
    pub fn denied(frame: RawFrame, reason: impl Into<String>) -> Self {
        Self {
            denied: Some(reason.into()),
            ..Self::new(frame)
        }
    }

    /// Returns a probe that keeps observing the source after it is moved.
    #[must_use]
    pub fn probe(&self) -> SourceProbe {
        self.probe.clone()
    }
}

#[async_trait]
impl FrameSource for StaticSource {
    async fn acquire(&mut self) -> Result<()> {
        if let Some(ref reason) = self.denied {
            return Err(Error::device(reason.clone()));
        }
        self.probe.acquired.store(true, Ordering::Release);
        self.probe.acquisitions.fetch_add(1, Ordering::AcqRel);
        debug!(width = self.frame.width(), height = self.frame.height(), "Static source acquired");
        Ok(())
    }

    fn latest_frame(&mut self) -> Option<RawFrame> {
        if !self.is_acquired() {
            return None;
        }
        self.probe.frames_served.fetch_add(1, Ordering::AcqRel);
        Some(self.frame.clone())
    }

    async fn release(&mut self) {
        self.probe.acquired.store(false, Ordering::Release);
    }

    fn is_acquired(&self) -> bool {
        self.probe.is_acquired()
    }

    fn name(&self) -> &str {
        "static"
    }
}

// ============================================================================
// Tests
// ============================================================================
