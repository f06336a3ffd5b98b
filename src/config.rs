//! Oven constants and the tunable timing configuration.
//!
//! Temperatures are in °C, periods are `embassy_time::Duration`s measured on
//! the same monotonic clock the controller is ticked with.

use embassy_time::Duration;

/// At or above this the oven is too hot to start a run.
pub const TEMPERATURE_ROOM: f32 = 50.0;
pub const TEMPERATURE_SOAK_MIN: f32 = 150.0;
pub const TEMPERATURE_COOL_MIN: f32 = 100.0;
pub const TEMPERATURE_BAKE: f32 = 120.0;
pub const SOAK_TEMPERATURE_STEP: f32 = 5.0;
/// Reflow ends this far below the profile peak to avoid dwelling at it.
pub const REFLOW_DWELL_MARGIN: f32 = 5.0;

/// Proportional, integral and derivative gains for one stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl Gains {
    pub const fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self { kp, ki, kd }
    }
}

pub const GAINS_PREHEAT: Gains = Gains::new(100.0, 0.025, 20.0);
pub const GAINS_SOAK: Gains = Gains::new(300.0, 0.05, 250.0);
pub const GAINS_REFLOW: Gains = Gains::new(300.0, 0.05, 350.0);
pub const GAINS_BAKE: Gains = Gains::new(100.0, 0.07, 20.0);

pub const PID_SAMPLE_MILLIS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Time-proportioning window; also the upper control output limit.
    pub window: Duration,
    pub debounce: Duration,
    pub sensor_period: Duration,
    pub data_log_period: Duration,
    pub status_refresh: Duration,
    /// How long the buzzer sounds in COMPLETE before returning to IDLE.
    pub completion_hold: Duration,
    pub pid_sample: Duration,
    pub cycle: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(2000),
            debounce: Duration::from_millis(100),
            sensor_period: Duration::from_millis(1000),
            data_log_period: Duration::from_millis(1000),
            status_refresh: Duration::from_millis(100),
            completion_hold: Duration::from_millis(1000),
            pid_sample: Duration::from_millis(PID_SAMPLE_MILLIS),
            cycle: Duration::from_millis(10),
        }
    }
}

impl ControllerConfig {
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Control output ceiling, in the same millisecond units as the window.
    pub fn output_max(&self) -> f32 {
        self.window.as_millis() as f32
    }
}
