//! Received-messages-per-second window.

use std::time::Duration;

use tokio::time::Instant;

/// Length of one rate window.
pub const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Counts data messages and publishes the count once per window.
///
/// The window restarts at the message that closes it, so the published
/// value is the number of data messages seen since the previous publish,
/// including the closing one.
#[derive(Debug, Clone)]
pub struct FpsWindow {
    count: u32,
    started: Instant,
}

impl FpsWindow {
    /// Creates a window starting at `now`.
    #[must_use]
    pub fn new(now: Instant) -> Self {
        Self {
            count: 0,
            started: now,
        }
    }

    /// Records one data message; returns the new rate when a window closes.
    pub fn record(&mut self, now: Instant) -> Option<u32> {
        self.count = self.count.saturating_add(1);

        if now.saturating_duration_since(self.started) >= FPS_WINDOW {
            let fps = self.count;
            self.count = 0;
            self.started = now;
            return Some(fps);
        }

        None
    }

    /// Messages counted in the open window.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> u32 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publishes_after_one_second() {
        let start = Instant::now();
        let mut window = FpsWindow::new(start);

        for i in 1..15 {
            assert_eq!(window.record(start + Duration::from_millis(i * 66)), None);
        }
        assert_eq!(window.pending(), 14);

        assert_eq!(window.record(start + Duration::from_millis(1000)), Some(15));
        assert_eq!(window.pending(), 0);
    }

    #[test]
    fn test_window_restarts_at_publish() {
        let start = Instant::now();
        let mut window = FpsWindow::new(start);

        assert_eq!(window.record(start + Duration::from_millis(1200)), Some(1));
        assert_eq!(window.record(start + Duration::from_millis(1500)), None);
        assert_eq!(window.record(start + Duration::from_millis(2199)), None);
        assert_eq!(window.record(start + Duration::from_millis(2200)), Some(3));
    }
}
