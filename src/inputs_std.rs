//! Switch presses scripted from the command line.

use core::fmt;
use core::str::FromStr;
use std::vec::Vec;

use embassy_time::{Duration, Instant};

use crate::board::SwitchInput;
use crate::debounce::SwitchReading;

/// How long a scripted switch is held down, comfortably past the debounce period.
pub const PRESS_HOLD: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScriptedPress {
    /// Offset from power-on.
    pub at: Duration,
    pub switch: SwitchReading,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsePressError {
    MissingSeparator,
    BadOffset,
    UnknownSwitch,
}

impl fmt::Display for ParsePressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParsePressError::MissingSeparator => write!(f, "expected <ms>:<start|select>"),
            ParsePressError::BadOffset => write!(f, "press offset must be whole milliseconds"),
            ParsePressError::UnknownSwitch => write!(f, "switch must be start or select"),
        }
    }
}

impl std::error::Error for ParsePressError {}

impl FromStr for ScriptedPress {
    type Err = ParsePressError;

    /// Parses `<ms>:<start|select>`, e.g. `2000:start`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (offset, switch) = s.split_once(':').ok_or(ParsePressError::MissingSeparator)?;
        let millis: u64 = offset
            .trim()
            .parse()
            .map_err(|_| ParsePressError::BadOffset)?;
        let switch = match switch.trim().to_ascii_lowercase().as_str() {
            "start" => SwitchReading::Start,
            "select" => SwitchReading::Select,
            _ => return Err(ParsePressError::UnknownSwitch),
        };
        Ok(Self {
            at: Duration::from_millis(millis),
            switch,
        })
    }
}

pub struct ScriptedSwitches {
    presses: Vec<ScriptedPress>,
    power_on: Instant,
}

impl ScriptedSwitches {
    pub fn new(presses: Vec<ScriptedPress>, power_on: Instant) -> Self {
        Self { presses, power_on }
    }

    fn reading_at(&self, now: Instant) -> SwitchReading {
        let elapsed = now.saturating_duration_since(self.power_on);
        self.presses
            .iter()
            .find(|press| elapsed >= press.at && elapsed < press.at + PRESS_HOLD)
            .map(|press| press.switch)
            .unwrap_or(SwitchReading::None)
    }
}

impl SwitchInput for ScriptedSwitches {
    fn read(&mut self) -> SwitchReading {
        self.reading_at(Instant::now())
    }
}
