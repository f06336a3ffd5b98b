//! Switch debounce state machine.
//!
//! A raw reading must stay on the same switch for the debounce period before
//! it becomes a press, and the switch has to be released before another press
//! can be reported.

use embassy_time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchReading {
    None,
    /// Start / cancel switch.
    Start,
    /// Profile select switch.
    Select,
}

impl SwitchReading {
    /// Combine active-high switch levels. Both at once is not a valid press.
    pub fn from_levels(start: bool, select: bool) -> Self {
        match (start, select) {
            (true, false) => SwitchReading::Start,
            (false, true) => SwitchReading::Select,
            _ => SwitchReading::None,
        }
    }

    pub fn is_pressed(self) -> bool {
        self != SwitchReading::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Checking { switch: SwitchReading, since: Instant },
    AwaitingRelease,
}

/// One step of the debounce machine: next state and the validated press, if any.
pub fn next(
    state: DebounceState,
    reading: SwitchReading,
    now: Instant,
    period: Duration,
) -> (DebounceState, SwitchReading) {
    match state {
        DebounceState::Idle => {
            if reading.is_pressed() {
                (
                    DebounceState::Checking {
                        switch: reading,
                        since: now,
                    },
                    SwitchReading::None,
                )
            } else {
                (DebounceState::Idle, SwitchReading::None)
            }
        }
        DebounceState::Checking { switch, since } => {
            if reading != switch {
                // Transient, start over
                (DebounceState::Idle, SwitchReading::None)
            } else if now.saturating_duration_since(since) >= period {
                (DebounceState::AwaitingRelease, switch)
            } else {
                (state, SwitchReading::None)
            }
        }
        DebounceState::AwaitingRelease => {
            if reading.is_pressed() {
                (state, SwitchReading::None)
            } else {
                (DebounceState::Idle, SwitchReading::None)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Debouncer {
    state: DebounceState,
    period: Duration,
}

impl Debouncer {
    pub fn new(period: Duration) -> Self {
        Self {
            state: DebounceState::Idle,
            period,
        }
    }

    /// Feed one raw reading, returning a press at most once per physical press.
    pub fn update(&mut self, reading: SwitchReading, now: Instant) -> SwitchReading {
        let (state, press) = next(self.state, reading, now, self.period);
        self.state = state;
        press
    }
}
