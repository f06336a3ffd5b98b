use std::path::PathBuf;

use clap::Parser;
use embassy_executor::Spawner;
use embassy_time::{Duration, Instant};
use log::*;
use tiny_reflow_controller::board::OvenIo;
use tiny_reflow_controller::config::{ControllerConfig, GAINS_PREHEAT};
use tiny_reflow_controller::inputs::{ScriptedPress, ScriptedSwitches};
use tiny_reflow_controller::outputs::LogPin;
use tiny_reflow_controller::pid::PidController;
use tiny_reflow_controller::profile_store::FileProfileStore;
use tiny_reflow_controller::reflow_controller::controller_task;
use tiny_reflow_controller::temperature_sensor::{MockThermocouple, SimHeater, OVEN};
use tiny_reflow_controller::usb_interface::{data_log_task, status_task};
use tiny_reflow_controller::VERSION;

/// Reflow controller driving a simulated oven.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Oven temperature at power-on, °C
    #[arg(long, default_value_t = 25.0)]
    initial_temperature: f32,

    /// File holding the selected profile
    #[arg(long, default_value = "reflow-profile.bin")]
    profile_file: PathBuf,

    /// Switch press as <ms>:<start|select>, may be repeated
    #[arg(long = "press", value_name = "MS:SWITCH")]
    presses: Vec<ScriptedPress>,

    /// Report an open thermocouple from this many ms after power-on
    #[arg(long, requires = "fault_until_ms")]
    fault_from_ms: Option<u64>,

    /// End of the thermocouple fault, ms after power-on
    #[arg(long, requires = "fault_from_ms")]
    fault_until_ms: Option<u64>,

    /// Heater time-proportioning window, ms
    #[arg(long, default_value_t = 2000)]
    window_ms: u64,
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    info!("Tiny reflow controller {} (simulated oven)", VERSION);

    let power_on = Instant::now();
    OVEN.lock(|oven| oven.borrow_mut().reset(args.initial_temperature));

    let fault_window = match (args.fault_from_ms, args.fault_until_ms) {
        (Some(from), Some(until)) => Some((
            power_on + Duration::from_millis(from),
            power_on + Duration::from_millis(until),
        )),
        _ => None,
    };

    let io = OvenIo {
        sensor: MockThermocouple::new(fault_window),
        switches: ScriptedSwitches::new(args.presses, power_on),
        store: FileProfileStore::new(args.profile_file),
        heater: SimHeater,
        buzzer: LogPin::new("buzzer"),
        led: LogPin::new("led"),
    };
    let config = ControllerConfig::default().with_window(Duration::from_millis(args.window_ms));

    spawner.spawn(data_log_task().unwrap());
    spawner.spawn(status_task().unwrap());
    spawner.spawn(controller_task(io, PidController::new(GAINS_PREHEAT), config).unwrap());
}
