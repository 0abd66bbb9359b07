//! Capture pipeline.
//!
//! Drives a [`FrameSource`] on a repeating tick while the connection is
//! open, offering throttled samples to the [`Transmitter`].
//!
//! # Lifecycle
//!
//! 1. `CapturePipeline::start` - Lock and acquire the source, spawn the tick task
//! 2. Tick task - Sample at most once per frame interval
//! 3. Connection leaves `Open`, `CaptureHandle::stop`, or handle dropped - Release the source

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval, timeout};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::transmitter::Transmitter;
use crate::transport::ConnectionState;

use super::source::FrameSource;
use super::throttle::{DEFAULT_FRAME_INTERVAL, FrameThrottle};

// ============================================================================
// Constants
// ============================================================================

/// Default tick cadence, one display refresh at 60 Hz.
pub const DEFAULT_TICK: Duration = Duration::from_millis(16);

/// Upper bound on how long `stop` waits for the source to be released.
const RELEASE_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Types
// ============================================================================

/// Frame source shared between the controller and the pipeline.
pub type SharedSource = Arc<AsyncMutex<Box<dyn FrameSource>>>;

/// Pipeline timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    /// How often the task wakes up.
    pub tick: Duration,
    /// Minimum spacing between accepted samples.
    pub frame_interval: Duration,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            frame_interval: DEFAULT_FRAME_INTERVAL,
        }
    }
}

// ============================================================================
// CapturePipeline
// ============================================================================

/// Starts capture tasks.
pub struct CapturePipeline;

impl CapturePipeline {
    /// Acquires the source and starts sampling.
    ///
    /// Holds the source lock until the pipeline stops.
    ///
    /// # Errors
    ///
    /// - [`Error::Device`] if the source cannot be acquired
    /// - [`Error::NotConnected`] if the connection is not open
    pub async fn start(
        source: SharedSource,
        transmitter: Arc<Transmitter>,
        state_rx: watch::Receiver<ConnectionState>,
        settings: CaptureSettings,
    ) -> Result<CaptureHandle> {
        let mut source = source.lock_owned().await;

        if !state_rx.borrow().is_open() {
            return Err(Error::NotConnected);
        }

        source.acquire().await?;

        // Connection may have dropped while the device was opening
        if !state_rx.borrow().is_open() {
            source.release().await;
            return Err(Error::NotConnected);
        }

        info!(source = source.name(), "Capture started");

        let running = Arc::new(AtomicBool::new(true));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(Self::run(
            source,
            transmitter,
            state_rx,
            settings,
            shutdown_rx,
            Arc::clone(&running),
        ));

        Ok(CaptureHandle {
            shutdown: Some(shutdown_tx),
            task: Some(task),
            running,
        })
    }

    async fn run(
        mut source: OwnedMutexGuard<Box<dyn FrameSource>>,
        transmitter: Arc<Transmitter>,
        mut state_rx: watch::Receiver<ConnectionState>,
        settings: CaptureSettings,
        mut shutdown_rx: oneshot::Receiver<()>,
        running: Arc<AtomicBool>,
    ) {
        let mut ticker = interval(settings.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut throttle = FrameThrottle::new(settings.frame_interval);
        let mut samples: u64 = 0;

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    debug!("Capture stop requested");
                    break;
                }

                changed = state_rx.changed() => {
                    if changed.is_err() || !state_rx.borrow_and_update().is_open() {
                        debug!("Connection left open state, stopping capture");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    let now = Instant::now();
                    if !throttle.accept(now) {
                        continue;
                    }
                    // No data yet; the slot is still consumed
                    let Some(frame) = source.latest_frame() else {
                        continue;
                    };
                    samples += 1;
                    transmitter.offer(frame, now);
                }
            }
        }

        source.release().await;
        drop(source);
        running.store(false, Ordering::Release);
        info!(samples, "Capture stopped, source released");
    }
}

// ============================================================================
// CaptureHandle
// ============================================================================

/// Running capture task. Dropping it stops capture.
#[derive(Debug)]
pub struct CaptureHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl CaptureHandle {
    /// Returns `true` until the task has released the source.
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stops sampling and waits until the source is released.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        if let Some(mut task) = self.task.take()
            && timeout(RELEASE_TIMEOUT, &mut task).await.is_err()
        {
            warn!("Capture task did not stop in time, aborting");
            task.abort();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use tokio_test::{assert_err, assert_ok};

    use crate::capture::{EncoderSettings, RawFrame, SourceProbe, StaticSource};
    use crate::protocol::OutboundFrame;
    use crate::transmitter::FrameSink;

    struct CountingSink {
        state_rx: watch::Receiver<ConnectionState>,
        sent: tokio::sync::mpsc::UnboundedSender<Instant>,
    }

    #[async_trait]
    impl FrameSink for CountingSink {
        fn is_open(&self) -> bool {
            self.state_rx.borrow().is_open()
        }

        async fn send_frame(&self, frame: OutboundFrame) -> Result<()> {
            let _ = self.sent.send(frame.captured_at);
            Ok(())
        }
    }

    struct Fixture {
        source: SharedSource,
        probe: SourceProbe,
        transmitter: Arc<Transmitter>,
        state_tx: watch::Sender<ConnectionState>,
        sent_rx: tokio::sync::mpsc::UnboundedReceiver<Instant>,
    }

    fn fixture(source: StaticSource, state: ConnectionState) -> Fixture {
        let probe = source.probe();
        let (state_tx, state_rx) = watch::channel(state);
        let (sent_tx, sent_rx) = tokio::sync::mpsc::unbounded_channel();
        let sink = Arc::new(CountingSink {
            state_rx,
            sent: sent_tx,
        });
        let encoder = EncoderSettings {
            width: 8,
            height: 6,
            quality: 50,
        };
        Fixture {
            source: Arc::new(AsyncMutex::new(Box::new(source))),
            probe,
            transmitter: Arc::new(Transmitter::new(sink, encoder, DEFAULT_FRAME_INTERVAL)),
            state_tx,
            sent_rx,
        }
    }

    fn static_source() -> StaticSource {
        StaticSource::new(RawFrame::solid(8, 6, [1, 2, 3]).expect("frame"))
    }

    #[tokio::test]
    async fn test_samples_at_frame_interval() {
        let mut fx = fixture(static_source(), ConnectionState::Open);

        let handle = CapturePipeline::start(
            Arc::clone(&fx.source),
            Arc::clone(&fx.transmitter),
            fx.state_tx.subscribe(),
            CaptureSettings::default(),
        )
        .await
        .expect("start");
        assert!(fx.probe.is_acquired());

        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.stop().await;
        fx.transmitter.flush().await;
        assert!(!fx.probe.is_acquired());

        let mut captured = Vec::new();
        while let Ok(at) = fx.sent_rx.try_recv() {
            captured.push(at);
        }
        // About 12 expected; leave room for a loaded test machine
        assert!(captured.len() >= 5, "got {} samples", captured.len());
        assert!(captured.len() <= 16, "got {} samples", captured.len());
        assert!(
            captured
                .windows(2)
                .all(|w| w[1].duration_since(w[0]) >= DEFAULT_FRAME_INTERVAL)
        );
    }

    #[tokio::test]
    async fn test_stops_when_connection_leaves_open() {
        let fx = fixture(static_source(), ConnectionState::Open);

        let handle = CapturePipeline::start(
            Arc::clone(&fx.source),
            Arc::clone(&fx.transmitter),
            fx.state_tx.subscribe(),
            CaptureSettings::default(),
        )
        .await
        .expect("start");

        tokio::time::sleep(Duration::from_millis(200)).await;
        fx.state_tx.send_replace(ConnectionState::Failed);

        tokio::time::timeout(Duration::from_secs(1), async {
            while handle.is_running() {
                tokio::time::sleep(DEFAULT_TICK).await;
            }
        })
        .await
        .expect("capture stopped");
        assert!(!fx.probe.is_acquired());

        // Source lock is free again
        let _guard = assert_ok!(fx.source.try_lock());
    }

    #[tokio::test]
    async fn test_not_open_does_not_acquire() {
        let fx = fixture(static_source(), ConnectionState::Connecting);

        let err = assert_err!(
            CapturePipeline::start(
                Arc::clone(&fx.source),
                Arc::clone(&fx.transmitter),
                fx.state_tx.subscribe(),
                CaptureSettings::default(),
            )
            .await
        );

        assert!(matches!(err, Error::NotConnected));
        assert_eq!(fx.probe.acquisitions(), 0);
    }

    #[tokio::test]
    async fn test_device_failure_is_reported() {
        let denied = StaticSource::denied(RawFrame::solid(2, 2, [0, 0, 0]).expect("frame"), "Permission denied");
        let fx = fixture(denied, ConnectionState::Open);

        let err = assert_err!(
            CapturePipeline::start(
                Arc::clone(&fx.source),
                Arc::clone(&fx.transmitter),
                fx.state_tx.subscribe(),
                CaptureSettings::default(),
            )
            .await
        );

        assert!(err.is_device_error());
        let _guard = assert_ok!(fx.source.try_lock());
    }

    #[tokio::test]
    async fn test_dropping_handle_releases_source() {
        let fx = fixture(static_source(), ConnectionState::Open);

        let handle = CapturePipeline::start(
            Arc::clone(&fx.source),
            Arc::clone(&fx.transmitter),
            fx.state_tx.subscribe(),
            CaptureSettings::default(),
        )
        .await
        .expect("start");
        drop(handle);

        let _guard = tokio::time::timeout(Duration::from_secs(1), fx.source.lock())
            .await
            .expect("source released");
        assert!(!fx.probe.is_acquired());
    }
}
