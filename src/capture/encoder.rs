//! JPEG encoding of raw frames.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, RgbImage, RgbaImage};

use crate::error::{Error, Result};

use super::source::{PixelFormat, RawFrame};

/// Default output width in pixels.
pub const DEFAULT_FRAME_WIDTH: u32 = 480;

/// Default output height in pixels.
pub const DEFAULT_FRAME_HEIGHT: u32 = 360;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 50;

/// Upper bound on the output buffer reserved before encoding.
const MAX_RESERVE: usize = 1 << 20;

/// Output geometry and quality of outbound frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSettings {
    pub width: u32,
    pub height: u32,
    pub quality: u8,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            width: DEFAULT_FRAME_WIDTH,
            height: DEFAULT_FRAME_HEIGHT,
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl EncoderSettings {
    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for zero dimensions or a quality outside 1-100.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::config(format!(
                "frame size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if !(1..=100).contains(&self.quality) {
            return Err(Error::config(format!(
                "JPEG quality must be 1-100, got {}",
                self.quality
            )));
        }
        Ok(())
    }

    /// Scales `frame` to the configured size and encodes it as JPEG.
    ///
    /// CPU-bound; run it on a blocking thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Image`] if encoding fails.
    pub fn encode(&self, frame: &RawFrame) -> Result<Vec<u8>> {
        let rgb = to_rgb(frame)?;

        let scaled = if rgb.dimensions() == (self.width, self.height) {
            rgb
        } else {
            imageops::resize(&rgb, self.width, self.height, FilterType::Triangle)
        };

        let mut out = Vec::with_capacity(self.reserve_hint());
        JpegEncoder::new_with_quality(&mut out, self.quality).encode(
            scaled.as_raw(),
            self.width,
            self.height,
            ExtendedColorType::Rgb8,
        )?;
        Ok(out)
    }

    /// Initial output buffer size: about one byte per eight pixels, capped.
    fn reserve_hint(&self) -> usize {
        (self.width as usize * self.height as usize / 8).min(MAX_RESERVE)
    }
}

fn to_rgb(frame: &RawFrame) -> Result<RgbImage> {
    let pixels = frame.pixels().to_vec();
    let invalid = || Error::device("frame buffer does not match its dimensions");

    match frame.format() {
        PixelFormat::Rgb8 => RgbImage::from_raw(frame.width(), frame.height(), pixels).ok_or_else(invalid),
        PixelFormat::Rgba8 => RgbaImage::from_raw(frame.width(), frame.height(), pixels)
            .map(|rgba| DynamicImage::ImageRgba8(rgba).to_rgb8())
            .ok_or_else(invalid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(jpeg: &[u8]) -> DynamicImage {
        image::load_from_memory_with_format(jpeg, image::ImageFormat::Jpeg).expect("valid jpeg")
    }

    #[test]
    fn test_encodes_at_target_size() {
        let frame = RawFrame::solid(640, 480, [200, 10, 10]).expect("frame");
        let jpeg = EncoderSettings::default().encode(&frame).expect("encode");

        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let decoded = decode(&jpeg);
        assert_eq!((decoded.width(), decoded.height()), (480, 360));
    }

    #[test]
    fn test_rgba_input() {
        let frame = RawFrame::new(8, 8, PixelFormat::Rgba8, vec![128; 8 * 8 * 4]).expect("frame");
        let settings = EncoderSettings {
            width: 8,
            height: 8,
            quality: 90,
        };
        let decoded = decode(&settings.encode(&frame).expect("encode")).to_rgb8();
        let pixel = decoded.get_pixel(4, 4);
        assert!(pixel.0.iter().all(|c| c.abs_diff(128) < 8));
    }

    #[test]
    fn test_lower_quality_is_smaller() {
        let pixels: Vec<u8> = (0..64 * 64 * 3).map(|i| (i * 31 % 251) as u8).collect();
        let frame = RawFrame::new(64, 64, PixelFormat::Rgb8, pixels).expect("frame");

        let low = EncoderSettings { width: 64, height: 64, quality: 10 };
        let high = EncoderSettings { width: 64, height: 64, quality: 95 };

        assert!(low.encode(&frame).expect("low").len() < high.encode(&frame).expect("high").len());
    }

    #[test]
    fn test_validate() {
        assert!(EncoderSettings::default().validate().is_ok());
        assert!(EncoderSettings { quality: 0, ..Default::default() }.validate().is_err());
        assert!(EncoderSettings { quality: 101, ..Default::default() }.validate().is_err());
        assert!(EncoderSettings { width: 0, ..Default::default() }.validate().is_err());
    }

    #[test]
    fn test_reserve_hint_for_large_frames() {
        assert_eq!(EncoderSettings::default().reserve_hint(), 480 * 360 / 8);

        let huge = EncoderSettings { width: 70_000, height: 70_000, quality: 50 };
        assert!(huge.validate().is_ok());
        assert_eq!(huge.reserve_hint(), MAX_RESERVE);
    }
}
