use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};
use log::info;

/// Stand-in for a buzzer or LED, logging each change of level.
pub struct LogPin {
    name: &'static str,
    level: bool,
}

impl LogPin {
    pub fn new(name: &'static str) -> Self {
        Self { name, level: false }
    }

    pub fn is_set_high(&self) -> bool {
        self.level
    }

    fn set(&mut self, level: bool) {
        if level != self.level {
            info!("{} {}", self.name, if level { "on" } else { "off" });
            self.level = level;
        }
    }
}

impl ErrorType for LogPin {
    type Error = Infallible;
}

impl OutputPin for LogPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true);
        Ok(())
    }
}
