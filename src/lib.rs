#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod board;
pub mod config;
pub mod debounce;
pub mod fault;
pub mod heater;
pub mod pid;
pub mod profile;
pub mod reflow_controller;
pub mod status;

#[cfg(feature = "std")]
pub mod inputs_std;
#[cfg(feature = "std")]
pub use inputs_std as inputs;

#[cfg(feature = "std")]
pub mod outputs_std;
#[cfg(feature = "std")]
pub use outputs_std as outputs;

#[cfg(feature = "std")]
pub mod profile_store_std;
#[cfg(feature = "std")]
pub use profile_store_std as profile_store;

#[cfg(feature = "std")]
pub mod temperature_sensor_mock;
#[cfg(feature = "std")]
pub use temperature_sensor_mock as temperature_sensor;

#[cfg(feature = "std")]
pub mod usb_interface_std;
#[cfg(feature = "std")]
pub use usb_interface_std as usb_interface;

pub static VERSION: &str = "v0.1";

/// The simulated oven as the controller task sees it.
#[cfg(feature = "std")]
pub type SimOvenIo = board::OvenIo<
    temperature_sensor::MockThermocouple,
    inputs::ScriptedSwitches,
    profile_store::FileProfileStore,
    temperature_sensor::SimHeater,
    outputs::LogPin,
    outputs::LogPin,
>;
