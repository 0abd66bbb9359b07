//! Image-sequence frame source.
//!
//! Replays the images of a directory in file-name order, looping. Useful
//! for headless runs and recorded test sessions.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::source::{FrameSource, PixelFormat, RawFrame};

/// File extensions picked up from the directory.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Loops over the images in a directory.
#[derive(Debug)]
pub struct ImageSequenceSource {
    dir: PathBuf,
    frames: Vec<RawFrame>,
    cursor: usize,
}

impl ImageSequenceSource {
    /// Creates a source for `dir`. Nothing is read until `acquire`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            frames: Vec::new(),
            cursor: 0,
        }
    }

    /// Returns the directory.
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the number of loaded frames.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn load(dir: &Path) -> Result<Vec<RawFrame>> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| Error::device(format!("cannot read {}: {e}", dir.display())))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            })
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(Error::device(format!("no images in {}", dir.display())));
        }

        paths
            .iter()
            .map(|path| {
                let image = image::open(path)?.to_rgb8();
                let (width, height) = image.dimensions();
                RawFrame::new(width, height, PixelFormat::Rgb8, image.into_raw())
            })
            .collect()
    }
}

#[async_trait]
impl FrameSource for ImageSequenceSource {
    async fn acquire(&mut self) -> Result<()> {
        let dir = self.dir.clone();
        let frames = tokio::task::spawn_blocking(move || Self::load(&dir))
            .await
            .map_err(|e| Error::device(format!("image loader panicked: {e}")))??;

        info!(dir = %self.dir.display(), frames = frames.len(), "Image sequence loaded");
        self.frames = frames;
        self.cursor = 0;
        Ok(())
    }

    fn latest_frame(&mut self) -> Option<RawFrame> {
        let frame = self.frames.get(self.cursor)?.clone();
        self.cursor = (self.cursor + 1) % self.frames.len();
        Some(frame)
    }

    async fn release(&mut self) {
        if !self.frames.is_empty() {
            debug!(dir = %self.dir.display(), "Image sequence released");
        }
        self.frames.clear();
        self.cursor = 0;
    }

    fn is_acquired(&self) -> bool {
        !self.frames.is_empty()
    }

    fn name(&self) -> &str {
        "image-sequence"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn write_png(dir: &Path, name: &str, color: [u8; 3]) {
        RgbImage::from_pixel(4, 3, Rgb(color))
            .save(dir.join(name))
            .expect("write png");
    }

    #[tokio::test]
    async fn test_replays_in_name_order_and_loops() {
        let dir = TempDir::new().expect("tempdir");
        write_png(dir.path(), "b.png", [0, 255, 0]);
        write_png(dir.path(), "a.png", [255, 0, 0]);
        std::fs::write(dir.path().join("notes.txt"), "skip me").expect("write txt");

        let mut source = ImageSequenceSource::new(dir.path());
        assert!(source.latest_frame().is_none());

        source.acquire().await.expect("acquire");
        assert_eq!(source.len(), 2);

        let first = source.latest_frame().expect("frame");
        let second = source.latest_frame().expect("frame");
        let third = source.latest_frame().expect("frame");

        assert_eq!(&first.pixels()[..3], &[255, 0, 0]);
        assert_eq!(&second.pixels()[..3], &[0, 255, 0]);
        assert_eq!(first, third);
        assert_eq!((first.width(), first.height()), (4, 3));

        source.release().await;
        assert!(!source.is_acquired());
    }

    #[tokio::test]
    async fn test_empty_directory_is_device_error() {
        let dir = TempDir::new().expect("tempdir");
        let mut source = ImageSequenceSource::new(dir.path());

        let err = source.acquire().await.expect_err("no images");
        assert!(err.is_device_error());
    }

    #[tokio::test]
    async fn test_missing_directory_is_device_error() {
        let mut source = ImageSequenceSource::new("/nonexistent/frames");
        let err = source.acquire().await.expect_err("missing");
        assert!(err.is_device_error());
    }
}
