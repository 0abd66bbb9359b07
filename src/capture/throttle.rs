//! Sample-rate throttle.

use std::time::Duration;

use tokio::time::Instant;

/// Default spacing between accepted samples (about 15 per second).
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(66);

/// Accepts a sample only when `interval` has passed since the last accepted one.
///
/// The first sample is always accepted.
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    interval: Duration,
    last_accepted: Option<Instant>,
}

impl FrameThrottle {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_accepted: None,
        }
    }

    /// Returns `true` and records `now` if a sample is due.
    pub fn accept(&mut self, now: Instant) -> bool {
        let due = self
            .last_accepted
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval);

        if due {
            self.last_accepted = Some(now);
        }
        due
    }

    #[inline]
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Forgets the last accepted sample.
    pub fn reset(&mut self) {
        self.last_accepted = None;
    }
}

impl Default for FrameThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sixty_hz_ticks_yield_fifteen_samples() {
        let start = Instant::now();
        let mut throttle = FrameThrottle::default();

        let accepted: Vec<u64> = (0..60u64)
            .map(|i| i * 16)
            .filter(|ms| throttle.accept(start + Duration::from_millis(*ms)))
            .collect();

        // 16 ms ticks land on 0, 80, 160, ... since 64 < 66 <= 80
        assert_eq!(accepted.first(), Some(&0));
        assert!(accepted.windows(2).all(|w| w[1] - w[0] >= 66));
        assert_eq!(accepted.len(), 12);
    }

    #[test]
    fn test_exact_interval_is_accepted() {
        let start = Instant::now();
        let mut throttle = FrameThrottle::new(Duration::from_millis(66));

        assert!(throttle.accept(start));
        assert!(!throttle.accept(start + Duration::from_millis(65)));
        assert!(throttle.accept(start + Duration::from_millis(66)));
    }

    #[test]
    fn test_reset() {
        let start = Instant::now();
        let mut throttle = FrameThrottle::default();
        assert!(throttle.accept(start));
        throttle.reset();
        assert!(throttle.accept(start));
    }
}
