//! Time-windowed byte counting.

use std::time::{Duration, Instant};

/// Length of one bitrate sampling window.
pub const SAMPLE_WINDOW: Duration = Duration::from_secs(1);

/// Accumulates delivered bytes and converts them to kbit/s once per window.
#[derive(Debug, Clone)]
pub struct BitrateSampler {
    bytes: u64,
    window_start: Instant,
}

impl BitrateSampler {
    /// Create a sampler whose first window starts at `now`.
    pub fn new(now: Instant) -> Self {
        Self {
            bytes: 0,
            window_start: now,
        }
    }

    /// Count a delivery of `len` bytes at `now`.
    ///
    /// Returns the bitrate of the window once at least [`SAMPLE_WINDOW`]
    /// has elapsed since it started; the counter and window then restart.
    pub fn record(&mut self, len: usize, now: Instant) -> Option<f32> {
        self.bytes += len as u64;

        if now.duration_since(self.window_start) < SAMPLE_WINDOW {
            return None;
        }

        let kbps = (self.bytes * 8) as f32 / 1000.0;
        self.bytes = 0;
        self.window_start = now;
        Some(kbps)
    }

    /// Discard the current window and start a new one at `now`.
    pub fn reset(&mut self, now: Instant) {
        self.bytes = 0;
        self.window_start = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_second_window() {
        let start = Instant::now();
        let mut sampler = BitrateSampler::new(start);

        for ms in [200, 400, 600, 800] {
            assert_eq!(sampler.record(2500, start + Duration::from_millis(ms)), None);
        }

        assert_eq!(sampler.record(2500, start + Duration::from_secs(1)), Some(100.0));
    }

    #[test]
    fn test_window_restarts_after_emit() {
        let start = Instant::now();
        let mut sampler = BitrateSampler::new(start);
        sampler.record(1000, start + Duration::from_millis(1100));

        assert_eq!(sampler.record(500, start + Duration::from_millis(1500)), None);
        assert_eq!(
            sampler.record(500, start + Duration::from_millis(2100)),
            Some(8.0)
        );
    }

    #[test]
    fn test_reset_discards_bytes() {
        let start = Instant::now();
        let mut sampler = BitrateSampler::new(start);
        sampler.record(10_000, start + Duration::from_millis(500));

        sampler.reset(start + Duration::from_millis(600));

        assert_eq!(sampler.record(125, start + Duration::from_millis(1700)), Some(1.0));
    }
}
