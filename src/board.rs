//! Capability interfaces a target board provides to the controller.
//!
//! The control logic is the same on every board; a board only decides how a
//! temperature is read, how the switches are wired and where the selected
//! profile is kept. Relay, buzzer and LED are plain `embedded-hal` output pins.

use core::convert::Infallible;
use core::fmt::Debug;

use embedded_hal::digital::{InputPin, OutputPin};

use crate::debounce::SwitchReading;
use crate::fault::SensorFault;

pub trait TemperatureSensor {
    type Error: Debug;

    /// Thermocouple temperature in °C.
    fn read_temperature(&mut self) -> Result<f32, Self::Error>;

    /// Current fault register.
    fn read_fault(&mut self) -> Result<SensorFault, Self::Error>;
}

pub trait SwitchInput {
    fn read(&mut self) -> SwitchReading;
}

/// Non-volatile home of the selected profile.
pub trait ProfileStore {
    type Error: Debug;

    fn load(&mut self) -> Result<u8, Self::Error>;
    fn save(&mut self, value: u8) -> Result<(), Self::Error>;
}

/// Everything the controller loop drives, for one board.
pub struct OvenIo<T, W, P, H, B, L> {
    pub sensor: T,
    pub switches: W,
    pub store: P,
    pub heater: H,
    pub buzzer: B,
    pub led: L,
}

impl<T, W, P, H, B, L> OvenIo<T, W, P, H, B, L>
where
    T: TemperatureSensor,
    W: SwitchInput,
    P: ProfileStore,
    H: OutputPin,
    B: OutputPin,
    L: OutputPin,
{
    /// Force every output off, the power-on state.
    pub fn all_off(&mut self) {
        set_pin(&mut self.heater, false);
        set_pin(&mut self.buzzer, false);
        set_pin(&mut self.led, false);
    }
}

/// Drive `pin`, logging rather than failing on a pin error.
pub fn set_pin<P: OutputPin>(pin: &mut P, on: bool) {
    let result = if on { pin.set_high() } else { pin.set_low() };
    if let Err(err) = result {
        log::warn!("Output pin error: {:?}", err);
    }
}

/// Two switches wired to their own pins, active low with pull-ups.
pub struct PinSwitches<S, P> {
    start: S,
    select: P,
}

impl<S: InputPin, P: InputPin> PinSwitches<S, P> {
    pub fn new(start: S, select: P) -> Self {
        Self { start, select }
    }
}

impl<S: InputPin, P: InputPin> SwitchInput for PinSwitches<S, P> {
    fn read(&mut self) -> SwitchReading {
        // An unreadable pin counts as released
        let start = self.start.is_low().unwrap_or(false);
        let select = self.select.is_low().unwrap_or(false);
        SwitchReading::from_levels(start, select)
    }
}

/// Profile store held in RAM, lost on power cycle.
#[derive(Debug, Clone)]
pub struct MemoryProfileStore {
    value: u8,
    writes: u32,
}

impl MemoryProfileStore {
    pub fn new(value: u8) -> Self {
        Self { value, writes: 0 }
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn writes(&self) -> u32 {
        self.writes
    }
}

impl ProfileStore for MemoryProfileStore {
    type Error = Infallible;

    fn load(&mut self) -> Result<u8, Self::Error> {
        Ok(self.value)
    }

    fn save(&mut self, value: u8) -> Result<(), Self::Error> {
        self.value = value;
        self.writes += 1;
        Ok(())
    }
}
