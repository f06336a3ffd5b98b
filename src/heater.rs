//! Time-proportioning heater drive.
//!
//! The control output is a number of milliseconds per window the relay stays
//! closed. The window start moves forward in whole windows so the phase never
//! drifts with loop jitter.

use embassy_time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct TimeProportioningOutput {
    window: Duration,
    window_start: Instant,
}

impl TimeProportioningOutput {
    pub fn new(window: Duration, now: Instant) -> Self {
        Self {
            window,
            window_start: now,
        }
    }

    /// Start a fresh window at `now`, used when a run begins.
    pub fn restart(&mut self, now: Instant) {
        self.window_start = now;
    }

    pub fn window_start(&self) -> Instant {
        self.window_start
    }

    /// Relay state for `output` (0..=window ms) at `now`.
    pub fn drive(&mut self, now: Instant, output: f32) -> bool {
        if self.window.as_ticks() == 0 {
            return false;
        }
        while now.saturating_duration_since(self.window_start) >= self.window {
            self.window_start += self.window;
        }
        let elapsed = now.saturating_duration_since(self.window_start).as_millis() as f32;
        output > elapsed
    }
}
