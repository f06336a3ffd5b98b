//! Simulated oven: a lumped thermal model heated by the SSR and read back
//! through a mock thermocouple.

use core::cell::RefCell;
use core::convert::Infallible;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Instant;
use embedded_hal::digital::{ErrorType, OutputPin};

use crate::board::TemperatureSensor;
use crate::fault::SensorFault;

// Thermal simulation parameters
const AMBIENT_TEMPERATURE: f32 = 25.0;
/// Degrees C per second with the heater fully on.
const MAX_HEATING_RATE: f32 = 3.0;
/// Heat loss to ambient per second per degree of difference.
const HEAT_LOSS_COEFFICIENT: f32 = 0.005;
const OPEN_CIRCUIT_BIT: u8 = 0x01;

pub static OVEN: Mutex<CriticalSectionRawMutex, RefCell<ThermalModel>> =
    Mutex::new(RefCell::new(ThermalModel::new(AMBIENT_TEMPERATURE)));

#[derive(Debug, Clone)]
pub struct ThermalModel {
    temperature: f32,
    heater_on: bool,
    last_update: Option<Instant>,
}

impl ThermalModel {
    pub const fn new(temperature: f32) -> Self {
        Self {
            temperature,
            heater_on: false,
            last_update: None,
        }
    }

    pub fn reset(&mut self, temperature: f32) {
        *self = Self::new(temperature);
    }

    /// Integrate up to `now` with the heater in its current state.
    pub fn advance(&mut self, now: Instant) {
        let dt = match self.last_update {
            Some(last) => now.saturating_duration_since(last).as_micros() as f32 / 1_000_000.0,
            None => 0.0,
        };
        self.last_update = Some(now);

        let heat_input = if self.heater_on { MAX_HEATING_RATE } else { 0.0 };
        // Newton's law of cooling
        let heat_loss = HEAT_LOSS_COEFFICIENT * (self.temperature - AMBIENT_TEMPERATURE);
        self.temperature += (heat_input - heat_loss) * dt;

        if self.temperature < AMBIENT_TEMPERATURE {
            self.temperature = AMBIENT_TEMPERATURE;
        }
    }

    pub fn set_heater(&mut self, now: Instant, on: bool) {
        self.advance(now);
        self.heater_on = on;
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }
}

/// Solid state relay feeding the simulated oven.
pub struct SimHeater;

impl ErrorType for SimHeater {
    type Error = Infallible;
}

impl OutputPin for SimHeater {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        OVEN.lock(|oven| oven.borrow_mut().set_heater(Instant::now(), false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        OVEN.lock(|oven| oven.borrow_mut().set_heater(Instant::now(), true));
        Ok(())
    }
}

/// Thermocouple on the simulated oven, optionally reporting an open circuit
/// for a window of time.
pub struct MockThermocouple {
    fault_window: Option<(Instant, Instant)>,
}

impl MockThermocouple {
    pub fn new(fault_window: Option<(Instant, Instant)>) -> Self {
        Self { fault_window }
    }

    fn open_circuit(&self, now: Instant) -> bool {
        matches!(self.fault_window, Some((from, until)) if now >= from && now < until)
    }

    /// Raw fault register as the converter would report it.
    fn fault_register(&self, now: Instant) -> u8 {
        if self.open_circuit(now) {
            OPEN_CIRCUIT_BIT
        } else {
            0
        }
    }
}

impl TemperatureSensor for MockThermocouple {
    type Error = Infallible;

    fn read_temperature(&mut self) -> Result<f32, Self::Error> {
        let now = Instant::now();
        let temperature = OVEN.lock(|oven| {
            let mut oven = oven.borrow_mut();
            oven.advance(now);
            oven.temperature()
        });
        // Small amount of realistic noise (±0.1°C)
        let noise = (now.as_millis() % 200) as f32 / 1000.0 - 0.1;
        Ok(temperature + noise)
    }

    fn read_fault(&mut self) -> Result<SensorFault, Self::Error> {
        Ok(SensorFault::from_register(self.fault_register(Instant::now())))
    }
}
