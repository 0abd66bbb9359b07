//! Native camera source.
//!
//! Captures on a background thread and keeps only the latest decoded frame;
//! older frames are overwritten, never queued.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use async_trait::async_trait;
use nokhwa::Camera;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::source::{FrameSource, PixelFormat, RawFrame};

/// Requested capture width.
const IDEAL_WIDTH: u32 = 480;
/// Requested capture height.
const IDEAL_HEIGHT: u32 = 360;
/// Requested capture rate.
const IDEAL_FPS: u32 = 30;

/// Frame source backed by a local camera.
pub struct CameraSource {
    index: u32,
    latest: Arc<Mutex<Option<RawFrame>>>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for CameraSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSource")
            .field("index", &self.index)
            .field("acquired", &self.is_acquired())
            .finish_non_exhaustive()
    }
}

impl CameraSource {
    /// Creates a source for the camera at `index` (0 for the default camera).
    #[must_use]
    pub fn new(index: u32) -> Self {
        Self {
            index,
            latest: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    fn open(index: u32) -> std::result::Result<Camera, nokhwa::NokhwaError> {
        let ideal = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new_from(IDEAL_WIDTH, IDEAL_HEIGHT, FrameFormat::MJPEG, IDEAL_FPS),
        ));

        let mut camera = match Camera::new(CameraIndex::Index(index), ideal) {
            Ok(camera) => camera,
            Err(e) => {
                warn!(error = %e, "Preferred camera format unavailable, using camera default");
                let any = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);
                Camera::new(CameraIndex::Index(index), any)?
            }
        };

        camera.open_stream()?;
        Ok(camera)
    }

    fn capture_thread(
        index: u32,
        latest: Arc<Mutex<Option<RawFrame>>>,
        running: Arc<AtomicBool>,
        opened: oneshot::Sender<std::result::Result<(), String>>,
    ) {
        let mut camera = match Self::open(index) {
            Ok(camera) => camera,
            Err(e) => {
                let _ = opened.send(Err(e.to_string()));
                return;
            }
        };

        info!(
            camera = %camera.info().human_name(),
            width = camera.resolution().width(),
            height = camera.resolution().height(),
            "Camera opened"
        );
        let _ = opened.send(Ok(()));

        while running.load(Ordering::Acquire) {
            let buffer = match camera.frame() {
                Ok(buffer) => buffer,
                Err(e) => {
                    warn!(error = %e, "Failed to capture frame");
                    std::thread::sleep(Duration::from_millis(10));
                    continue;
                }
            };

            let width = buffer.resolution().width();
            let height = buffer.resolution().height();

            match buffer.decode_image::<RgbFormat>() {
                Ok(image) => match RawFrame::new(width, height, PixelFormat::Rgb8, image.into_raw()) {
                    Ok(frame) => *latest.lock() = Some(frame),
                    Err(e) => warn!(error = %e, "Discarding malformed camera frame"),
                },
                Err(e) => warn!(error = %e, "Failed to decode frame"),
            }
        }

        if let Err(e) = camera.stop_stream() {
            debug!(error = %e, "Camera stream did not stop cleanly");
        }
        info!("Camera capture thread stopped");
    }
}

#[async_trait]
impl FrameSource for CameraSource {
    async fn acquire(&mut self) -> Result<()> {
        if self.thread.is_some() {
            return Ok(());
        }

        let (opened_tx, opened_rx) = oneshot::channel();
        let latest = Arc::clone(&self.latest);
        let running = Arc::clone(&self.running);
        let index = self.index;

        self.running.store(true, Ordering::Release);
        let thread = std::thread::Builder::new()
            .name("camera-capture".to_string())
            .spawn(move || Self::capture_thread(index, latest, running, opened_tx))?;

        match opened_rx.await {
            Ok(Ok(())) => {
                self.thread = Some(thread);
                Ok(())
            }
            Ok(Err(reason)) => {
                self.running.store(false, Ordering::Release);
                let _ = thread.join();
                Err(Error::device(reason))
            }
            Err(_) => {
                self.running.store(false, Ordering::Release);
                Err(Error::device("camera thread exited before opening"))
            }
        }
    }

    fn latest_frame(&mut self) -> Option<RawFrame> {
        self.latest.lock().clone()
    }

    async fn release(&mut self) {
        self.running.store(false, Ordering::Release);

        if let Some(thread) = self.thread.take() {
            let _ = tokio::task::spawn_blocking(move || thread.join()).await;
        }
        *self.latest.lock() = None;
    }

    fn is_acquired(&self) -> bool {
        self.thread.is_some()
    }

    fn name(&self) -> &str {
        "camera"
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}
