//! Frame timing.
//!
//! The capture pipeline only suspends at two kinds of waits: the display
//! refresh signal and a fixed delay. Both go through [`FrameClock`] so the
//! retry policy can be driven by a real timer or by a test double.

use snapkit_common::CaptureConfig;
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::trace;

/// Source of display refresh signals and delays.
#[allow(async_fn_in_trait)]
pub trait FrameClock {
    /// Resolve at the next display refresh.
    async fn next_frame(&self);

    /// Resolve after a fixed delay.
    async fn sleep(&self, duration: Duration);
}

/// Refresh signal paced on a fixed interval, aligned to its own epoch.
#[derive(Debug, Clone)]
pub struct IntervalClock {
    epoch: Instant,
    interval: Duration,
}

impl IntervalClock {
    /// Create a clock ticking every `interval` (16ms is roughly 60Hz).
    pub fn new(interval: Duration) -> Self {
        Self {
            epoch: Instant::now(),
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(config.frame_interval())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Instant of the first frame boundary strictly after `now`.
    fn next_boundary(&self, now: Instant) -> Instant {
        let elapsed = now.saturating_duration_since(self.epoch).as_nanos();
        let interval = self.interval.as_nanos();
        let frames = elapsed / interval + 1;
        let offset = u64::try_from(frames * interval).unwrap_or(u64::MAX);
        self.epoch + Duration::from_nanos(offset)
    }
}

impl Default for IntervalClock {
    fn default() -> Self {
        Self::from_config(&CaptureConfig::default())
    }
}

impl FrameClock for IntervalClock {
    async fn next_frame(&self) {
        let deadline = self.next_boundary(Instant::now());
        trace!(?deadline, "Waiting for frame boundary");
        sleep_until(deadline).await;
    }

    async fn sleep(&self, duration: Duration) {
        sleep(duration).await;
    }
}
