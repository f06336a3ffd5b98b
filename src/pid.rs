//! Control algorithm seam and the PID used by the simulator board.
//!
//! The sequencer only talks to [`ControlAlgorithm`]; it picks gain sets and
//! limits and asks for an output once per cycle while a run is on.
//!
//! [`PidController`]:
//! - Uses `f32` math
//! - Computes at most once per sample period, returning the held output otherwise
//! - Output clamped to configured limits
//! - Integral anti-windup via integral clamping
//! - Derivative-on-measurement
//! - Bumpless manual -> automatic switch

use embassy_time::{Duration, Instant};

use crate::config::Gains;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Manual,
    Automatic,
}

pub trait ControlAlgorithm {
    fn set_tunings(&mut self, gains: Gains);
    fn set_output_limits(&mut self, min: f32, max: f32);
    fn set_sample_time(&mut self, period: Duration);
    fn set_mode(&mut self, mode: Mode);
    /// Control output for `input` against `setpoint`, within the output limits.
    fn compute(&mut self, now: Instant, setpoint: f32, input: f32) -> f32;
}

#[derive(Debug, Clone)]
pub struct PidController {
    gains: Gains,

    // Output limits
    out_min: f32,
    out_max: f32,

    sample_time: Duration,

    // State
    mode: Mode,
    integrator: f32,
    last_input: f32,
    last_output: f32,
    last_compute: Option<Instant>,
}

impl PidController {
    /// Defaults: output limits [0,100], manual mode, 1 s sample time.
    pub fn new(gains: Gains) -> Self {
        Self {
            gains,
            out_min: 0.0,
            out_max: 100.0,
            sample_time: Duration::from_secs(1),
            mode: Mode::Manual,
            integrator: 0.0,
            last_input: 0.0,
            last_output: 0.0,
            last_compute: None,
        }
    }

    pub fn output(&self) -> f32 {
        self.last_output
    }

    pub fn gains(&self) -> Gains {
        self.gains
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    fn sample_secs(&self) -> f32 {
        self.sample_time.as_micros() as f32 / 1_000_000.0
    }
}

impl ControlAlgorithm for PidController {
    fn set_tunings(&mut self, gains: Gains) {
        if gains.kp < 0.0 || gains.ki < 0.0 || gains.kd < 0.0 {
            return;
        }
        self.gains = gains;
    }

    fn set_output_limits(&mut self, min: f32, max: f32) {
        if min >= max {
            return;
        }
        self.out_min = min;
        self.out_max = max;
        // Keep current output and integrator within bounds
        self.integrator = self.integrator.clamp(min, max);
        self.last_output = self.last_output.clamp(min, max);
    }

    fn set_sample_time(&mut self, period: Duration) {
        if period.as_ticks() > 0 {
            self.sample_time = period;
        }
    }

    fn set_mode(&mut self, mode: Mode) {
        if mode == Mode::Automatic && self.mode == Mode::Manual {
            // Pick up from the held output so the switch does not kick
            self.integrator = self.last_output.clamp(self.out_min, self.out_max);
            self.last_compute = None;
        }
        self.mode = mode;
    }

    fn compute(&mut self, now: Instant, setpoint: f32, input: f32) -> f32 {
        if self.mode == Mode::Manual {
            return self.last_output;
        }

        match self.last_compute {
            Some(last) if now.saturating_duration_since(last) < self.sample_time => {
                return self.last_output;
            }
            Some(_) => {}
            None => self.last_input = input,
        }

        let dt = self.sample_secs();
        let error = setpoint - input;

        self.integrator += self.gains.ki * error * dt;
        self.integrator = self.integrator.clamp(self.out_min, self.out_max);

        // Derivative on measurement avoids a kick on setpoint steps
        let d_input = (input - self.last_input) / dt;

        let output = (self.gains.kp * error + self.integrator - self.gains.kd * d_input)
            .clamp(self.out_min, self.out_max);

        self.last_output = output;
        self.last_input = input;
        self.last_compute = Some(now);
        output
    }
}
