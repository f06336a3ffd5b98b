use embassy_time::{Duration, Instant, Ticker};
use embedded_hal::digital::OutputPin;

use crate::board::{set_pin, OvenIo, ProfileStore, SwitchInput, TemperatureSensor};
use crate::config::{
    ControllerConfig, GAINS_BAKE, GAINS_PREHEAT, GAINS_REFLOW, GAINS_SOAK, REFLOW_DWELL_MARGIN,
    TEMPERATURE_BAKE, TEMPERATURE_COOL_MIN, TEMPERATURE_ROOM,
};
use crate::debounce::{Debouncer, SwitchReading};
use crate::fault::{FaultMonitor, FaultStatus, SensorFault};
use crate::heater::TimeProportioningOutput;
use crate::pid::{ControlAlgorithm, Mode};
use crate::profile::{restore_profile, Profile, StageParameters, LEAD_FREE_STAGE};
use crate::status::{append_log, publish_status, DataRecord, LogLine, StatusSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflowState {
    Idle,
    Preheat,
    Soak,
    Reflow,
    Cool,
    Complete,
    TooHot,
    Error,
    Bake,
}

impl ReflowState {
    pub fn label(self) -> &'static str {
        match self {
            ReflowState::Idle => "Ready",
            ReflowState::Preheat => "Pre",
            ReflowState::Soak => "Soak",
            ReflowState::Reflow => "Reflow",
            ReflowState::Cool => "Cool",
            ReflowState::Complete => "Done!",
            ReflowState::TooHot => "Hot!",
            ReflowState::Error => "Error",
            ReflowState::Bake => "Bake",
        }
    }
}

/// Whether the heater may be energized at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflowStatus {
    Off,
    On,
}

/// A deadline that repeats by adding its period to the previous deadline.
#[derive(Debug, Clone, Copy)]
struct Periodic {
    next: Instant,
    period: Duration,
}

impl Periodic {
    fn starting_at(next: Instant, period: Duration) -> Self {
        Self { next, period }
    }

    fn due(&mut self, now: Instant) -> bool {
        if now >= self.next {
            self.next += self.period;
            true
        } else {
            false
        }
    }
}

/// What one cycle asks of the outside world.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub heater: bool,
    pub buzzer: bool,
    pub led: bool,
    /// Profile selection to persist.
    pub save_profile: Option<Profile>,
    pub log: Option<LogLine>,
    /// Present on status refresh cycles.
    pub status: Option<StatusSnapshot>,
}

/// The whole process state bundle; only [`ReflowController::tick`] mutates it.
pub struct ReflowController {
    config: ControllerConfig,
    state: ReflowState,
    status: ReflowStatus,
    profile: Profile,
    stage: StageParameters,
    setpoint: f32,
    input: f32,
    /// Whether the latest temperature read succeeded.
    sensor_ok: bool,
    output: f32,
    debouncer: Debouncer,
    heater: TimeProportioningOutput,
    sensor_schedule: Periodic,
    log_schedule: Periodic,
    status_schedule: Periodic,
    soak_deadline: Instant,
    complete_deadline: Instant,
    led: bool,
    run_seconds: u32,
}

impl ReflowController {
    pub fn new(config: ControllerConfig, profile: Profile, now: Instant) -> Self {
        Self {
            config,
            state: ReflowState::Idle,
            status: ReflowStatus::Off,
            profile,
            stage: LEAD_FREE_STAGE,
            setpoint: 0.0,
            input: 0.0,
            sensor_ok: true,
            output: 0.0,
            debouncer: Debouncer::new(config.debounce),
            heater: TimeProportioningOutput::new(config.window, now),
            // First sample is taken on the first tick
            sensor_schedule: Periodic::starting_at(now, config.sensor_period),
            log_schedule: Periodic::starting_at(now + config.data_log_period, config.data_log_period),
            status_schedule: Periodic::starting_at(now, config.status_refresh),
            soak_deadline: now,
            complete_deadline: now,
            led: false,
            run_seconds: 0,
        }
    }

    pub fn state(&self) -> ReflowState {
        self.state
    }

    pub fn status(&self) -> ReflowStatus {
        self.status
    }

    pub fn is_on(&self) -> bool {
        self.status == ReflowStatus::On
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// Current target, only meaningful while a run is on.
    pub fn setpoint(&self) -> Option<f32> {
        self.is_on().then_some(self.setpoint)
    }

    pub fn temperature(&self) -> f32 {
        self.input
    }

    pub fn output(&self) -> f32 {
        self.output
    }

    /// Run one control cycle at `now` with the raw switch `reading`.
    pub fn tick<S, C>(
        &mut self,
        now: Instant,
        sensor: &mut S,
        reading: SwitchReading,
        pid: &mut C,
    ) -> CycleReport
    where
        S: TemperatureSensor,
        C: ControlAlgorithm,
    {
        let mut report = CycleReport::default();
        let was_on = self.is_on();
        let previous = self.state;

        let press = self.debouncer.update(reading, now);

        if self.sensor_schedule.due(now) {
            self.sample(sensor);
        }

        self.evaluate(now, sensor, press, pid, &mut report);
        self.apply_switch(press, &mut report);

        if self.log_schedule.due(now) {
            if self.is_on() {
                self.led = !self.led;
                self.run_seconds += 1;
                report.log = Some(LogLine::Record(DataRecord {
                    seconds: self.run_seconds,
                    setpoint: self.setpoint,
                    input: self.input,
                    output: self.output,
                }));
            } else {
                self.led = false;
            }
        }

        if self.is_on() {
            self.output = pid.compute(now, self.setpoint, self.input);
            report.heater = self.heater.drive(now, self.output);
        } else {
            self.output = 0.0;
            report.heater = false;
            if was_on {
                pid.set_mode(Mode::Manual);
            }
        }

        report.buzzer = self.state == ReflowState::Complete;
        report.led = self.led;

        if self.state != previous {
            log::info!("{} -> {}", previous.label(), self.state.label());
        }

        if self.status_schedule.due(now) {
            report.status = Some(self.snapshot(report.heater));
        }

        report
    }

    pub fn snapshot(&self, heater: bool) -> StatusSnapshot {
        StatusSnapshot {
            state: self.state.label(),
            profile: self.profile.label(),
            temperature: self.input,
            setpoint: self.setpoint(),
            output: self.output,
            heater,
            error: self.state == ReflowState::Error,
        }
    }

    fn sample<S: TemperatureSensor>(&mut self, sensor: &mut S) {
        let fault = match sensor.read_temperature() {
            Ok(temperature) => {
                self.input = temperature;
                self.sensor_ok = true;
                FaultMonitor::check_reading(sensor.read_fault())
            }
            Err(err) => {
                log::warn!("Temperature read failed: {:?}", err);
                self.sensor_ok = false;
                FaultStatus::Fault(SensorFault::all())
            }
        };

        if let FaultStatus::Fault(mask) = fault {
            if self.state != ReflowState::Error {
                log::warn!("Thermocouple fault {:#04x}", mask.bits());
            }
            self.state = ReflowState::Error;
            self.status = ReflowStatus::Off;
        }
    }

    fn evaluate<S, C>(
        &mut self,
        now: Instant,
        sensor: &mut S,
        press: SwitchReading,
        pid: &mut C,
        report: &mut CycleReport,
    ) where
        S: TemperatureSensor,
        C: ControlAlgorithm,
    {
        match self.state {
            ReflowState::Idle => {
                if self.input >= TEMPERATURE_ROOM {
                    self.state = ReflowState::TooHot;
                } else if press == SwitchReading::Start {
                    self.start_run(now, pid);
                    report.log = Some(LogLine::Header);
                }
            }
            ReflowState::Preheat => {
                self.status = ReflowStatus::On;
                if self.input >= self.stage.soak_temperature_min {
                    self.soak_deadline = now + self.stage.soak_micro_period;
                    pid.set_tunings(GAINS_SOAK);
                    self.setpoint = self.stage.soak_temperature_min + self.stage.soak_step;
                    self.state = ReflowState::Soak;
                }
            }
            ReflowState::Soak => {
                if now >= self.soak_deadline {
                    self.soak_deadline += self.stage.soak_micro_period;
                    self.setpoint += self.stage.soak_step;
                    if self.setpoint > self.stage.soak_temperature_max {
                        pid.set_tunings(GAINS_REFLOW);
                        self.setpoint = self.stage.reflow_temperature_max;
                        self.state = ReflowState::Reflow;
                    }
                }
            }
            ReflowState::Reflow => {
                if self.input >= self.stage.reflow_temperature_max - REFLOW_DWELL_MARGIN {
                    self.setpoint = TEMPERATURE_COOL_MIN;
                    self.state = ReflowState::Cool;
                }
            }
            ReflowState::Cool => {
                if self.input <= TEMPERATURE_COOL_MIN {
                    self.complete_deadline = now + self.config.completion_hold;
                    self.status = ReflowStatus::Off;
                    self.state = ReflowState::Complete;
                }
            }
            ReflowState::Complete => {
                if now >= self.complete_deadline {
                    self.state = ReflowState::Idle;
                }
            }
            ReflowState::TooHot => {
                if self.input < TEMPERATURE_ROOM {
                    self.state = ReflowState::Idle;
                }
            }
            ReflowState::Error => {
                // Wait for a good temperature read and a clean fault register
                if self.sensor_ok && !FaultMonitor::check_reading(sensor.read_fault()).is_fault()
                {
                    self.state = ReflowState::Idle;
                }
            }
            ReflowState::Bake => {
                self.status = ReflowStatus::On;
                // Re-applied every cycle, unlike the reflow stages
                pid.set_tunings(GAINS_BAKE);
            }
        }
    }

    fn start_run<C: ControlAlgorithm>(&mut self, now: Instant, pid: &mut C) {
        log::info!("Starting {} run", self.profile.label());
        self.run_seconds = 0;
        self.heater.restart(now);
        pid.set_output_limits(0.0, self.config.output_max());
        pid.set_sample_time(self.config.pid_sample);

        match self.profile.stage_parameters() {
            Some(stage) => {
                self.stage = stage;
                self.setpoint = stage.soak_temperature_min;
                pid.set_tunings(GAINS_PREHEAT);
                self.state = ReflowState::Preheat;
            }
            None => {
                self.setpoint = TEMPERATURE_BAKE;
                pid.set_tunings(GAINS_BAKE);
                self.state = ReflowState::Bake;
            }
        }
        pid.set_mode(Mode::Automatic);
    }

    /// Cancel and profile selection, applied after the state logic.
    fn apply_switch(&mut self, press: SwitchReading, report: &mut CycleReport) {
        match press {
            SwitchReading::Start if self.is_on() => {
                log::info!("Run cancelled in {}", self.state.label());
                self.status = ReflowStatus::Off;
                self.state = ReflowState::Idle;
            }
            SwitchReading::Select if self.state == ReflowState::Idle => {
                self.profile = self.profile.next();
                log::info!("Profile {}", self.profile.label());
                report.save_profile = Some(self.profile);
            }
            _ => {}
        }
    }
}

/// Controller loop for one board. Never returns.
pub async fn run<T, W, P, H, B, L, C>(
    mut io: OvenIo<T, W, P, H, B, L>,
    mut pid: C,
    config: ControllerConfig,
) -> !
where
    T: TemperatureSensor,
    W: SwitchInput,
    P: ProfileStore,
    H: OutputPin,
    B: OutputPin,
    L: OutputPin,
    C: ControlAlgorithm,
{
    io.all_off();
    let profile = restore_profile(&mut io.store);
    let mut controller = ReflowController::new(config, profile, Instant::now());
    let mut ticker = Ticker::every(config.cycle);

    loop {
        let reading = io.switches.read();
        let report = controller.tick(Instant::now(), &mut io.sensor, reading, &mut pid);

        set_pin(&mut io.heater, report.heater);
        set_pin(&mut io.buzzer, report.buzzer);
        set_pin(&mut io.led, report.led);

        if let Some(profile) = report.save_profile {
            if let Err(err) = io.store.save(profile.stored()) {
                log::warn!("Profile store write failed: {:?}", err);
            }
        }
        if let Some(line) = report.log {
            append_log(line);
        }
        if let Some(snapshot) = report.status {
            publish_status(snapshot);
        }

        ticker.next().await;
    }
}

#[cfg(feature = "std")]
#[embassy_executor::task]
pub async fn controller_task(
    io: crate::SimOvenIo,
    pid: crate::pid::PidController,
    config: ControllerConfig,
) {
    log::info!("Starting controller task");
    run(io, pid, config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Gains;

    struct FakeSensor {
        temperature: f32,
        fault: SensorFault,
        fail: bool,
        temperature_fails: bool,
    }

    impl FakeSensor {
        fn at(temperature: f32) -> Self {
            Self {
                temperature,
                fault: SensorFault::empty(),
                fail: false,
                temperature_fails: false,
            }
        }
    }

    impl TemperatureSensor for FakeSensor {
        type Error = ();

        fn read_temperature(&mut self) -> Result<f32, Self::Error> {
            if self.fail || self.temperature_fails {
                Err(())
            } else {
                Ok(self.temperature)
            }
        }

        fn read_fault(&mut self) -> Result<SensorFault, Self::Error> {
            if self.fail {
                Err(())
            } else {
                Ok(self.fault)
            }
        }
    }

    struct RecordingPid {
        output: f32,
        tunings: Vec<Gains>,
        limits: Option<(f32, f32)>,
        mode: Mode,
    }

    impl RecordingPid {
        fn new(output: f32) -> Self {
            Self {
                output,
                tunings: Vec::new(),
                limits: None,
                mode: Mode::Manual,
            }
        }
    }

    impl ControlAlgorithm for RecordingPid {
        fn set_tunings(&mut self, gains: Gains) {
            self.tunings.push(gains);
        }

        fn set_output_limits(&mut self, min: f32, max: f32) {
            self.limits = Some((min, max));
        }

        fn set_sample_time(&mut self, _period: Duration) {}

        fn set_mode(&mut self, mode: Mode) {
            self.mode = mode;
        }

        fn compute(&mut self, _now: Instant, _setpoint: f32, _input: f32) -> f32 {
            self.output
        }
    }

    /// Oven under test with a synthetic clock advancing 10 ms per tick.
    struct Rig {
        controller: ReflowController,
        sensor: FakeSensor,
        pid: RecordingPid,
        now: u64,
        last: CycleReport,
        saved: Vec<Profile>,
        logs: Vec<LogLine>,
    }

    impl Rig {
        fn new(profile: Profile, temperature: f32) -> Self {
            Self {
                controller: ReflowController::new(
                    ControllerConfig::default(),
                    profile,
                    Instant::from_millis(0),
                ),
                sensor: FakeSensor::at(temperature),
                pid: RecordingPid::new(500.0),
                now: 0,
                last: CycleReport::default(),
                saved: Vec::new(),
                logs: Vec::new(),
            }
        }

        fn tick(&mut self, reading: SwitchReading) -> &CycleReport {
            self.last = self.controller.tick(
                Instant::from_millis(self.now),
                &mut self.sensor,
                reading,
                &mut self.pid,
            );
            if let Some(profile) = self.last.save_profile {
                self.saved.push(profile);
            }
            if let Some(line) = self.last.log {
                self.logs.push(line);
            }
            self.now += 10;
            &self.last
        }

        /// Tick with `reading` until `ms` has passed.
        fn run_for(&mut self, ms: u64, reading: SwitchReading) {
            let end = self.now + ms;
            while self.now < end {
                self.tick(reading);
            }
        }

        /// Hold a switch long enough for one press, then release it.
        fn press(&mut self, switch: SwitchReading) {
            self.run_for(110, switch);
            self.run_for(20, SwitchReading::None);
        }

        fn state(&self) -> ReflowState {
            self.controller.state()
        }

        /// Tick until the state changes, giving up after `limit_ms`.
        fn run_until_state(&mut self, state: ReflowState, limit_ms: u64) {
            let end = self.now + limit_ms;
            while self.state() != state {
                assert!(self.now < end, "stuck in {:?}", self.state());
                self.tick(SwitchReading::None);
            }
        }

        /// Lead-free run driven up to the start of SOAK.
        fn lead_free_to_soak() -> Self {
            let mut rig = Rig::new(Profile::LeadFree, 25.0);
            rig.tick(SwitchReading::None);
            rig.press(SwitchReading::Start);
            rig.sensor.temperature = 150.0;
            rig.run_until_state(ReflowState::Soak, 2000);
            rig
        }

        /// Lead-free run driven up to the start of REFLOW.
        fn lead_free_to_reflow() -> Self {
            let mut rig = Rig::lead_free_to_soak();
            rig.run_until_state(ReflowState::Reflow, 100_000);
            rig
        }

        /// A rig that has just entered `state` through a normal run.
        fn entered(state: ReflowState) -> Self {
            match state {
                ReflowState::Bake => {
                    let mut rig = Rig::new(Profile::Bake, 25.0);
                    rig.tick(SwitchReading::None);
                    rig.press(SwitchReading::Start);
                    rig.run_for(20, SwitchReading::None);
                    rig
                }
                ReflowState::Soak => Rig::lead_free_to_soak(),
                ReflowState::Reflow => Rig::lead_free_to_reflow(),
                ReflowState::Cool | ReflowState::Complete => {
                    let mut rig = Rig::lead_free_to_reflow();
                    rig.sensor.temperature = 245.0;
                    rig.run_until_state(ReflowState::Cool, 2000);
                    if state == ReflowState::Complete {
                        rig.sensor.temperature = 100.0;
                        rig.run_until_state(ReflowState::Complete, 2000);
                    }
                    rig
                }
                other => panic!("no run path into {:?}", other),
            }
        }
    }

    #[test]
    fn boots_idle_with_heater_off() {
        let mut rig = Rig::new(Profile::LeadFree, 25.0);
        let report = rig.tick(SwitchReading::None).clone();
        assert_eq!(rig.state(), ReflowState::Idle);
        assert_eq!(rig.controller.status(), ReflowStatus::Off);
        assert!(!report.heater);
        assert!(report.status.is_some());
        assert_eq!(rig.controller.setpoint(), None);
    }

    #[test]
    fn lead_free_run() {
        let mut rig = Rig::new(Profile::LeadFree, 25.0);
        rig.tick(SwitchReading::None);

        rig.run_for(110, SwitchReading::Start);
        assert_eq!(rig.state(), ReflowState::Preheat);
        assert_eq!(rig.logs, vec![LogLine::Header]);
        rig.run_for(20, SwitchReading::None);
        assert!(rig.controller.is_on());
        assert_eq!(rig.controller.setpoint(), Some(150.0));
        assert_eq!(rig.pid.limits, Some((0.0, 2000.0)));
        assert_eq!(rig.pid.mode, Mode::Automatic);

        rig.sensor.temperature = 150.0;
        rig.run_until_state(ReflowState::Soak, 2000);
        assert_eq!(rig.controller.setpoint(), Some(155.0));

        let mut setpoints = vec![155.0];
        while rig.state() == ReflowState::Soak {
            rig.tick(SwitchReading::None);
            let setpoint = rig.controller.setpoint().unwrap();
            if setpoints.last() != Some(&setpoint) {
                setpoints.push(setpoint);
            }
        }
        assert_eq!(
            setpoints,
            vec![155.0, 160.0, 165.0, 170.0, 175.0, 180.0, 185.0, 190.0, 195.0, 200.0, 250.0]
        );
        assert_eq!(rig.state(), ReflowState::Reflow);

        rig.sensor.temperature = 245.0;
        rig.run_until_state(ReflowState::Cool, 2000);
        assert_eq!(rig.controller.setpoint(), Some(100.0));

        rig.sensor.temperature = 100.0;
        rig.run_until_state(ReflowState::Complete, 2000);
        let entered = rig.now - 10;
        assert_eq!(rig.controller.status(), ReflowStatus::Off);
        assert!(rig.last.buzzer);
        assert!(!rig.last.heater);
        assert_eq!(rig.pid.mode, Mode::Manual);

        rig.run_until_state(ReflowState::Idle, 2000);
        assert_eq!(rig.now - 10, entered + 1000);
        assert!(!rig.last.buzzer);
    }

    #[test]
    fn gains_change_only_at_stage_transitions() {
        let mut rig = Rig::lead_free_to_reflow();
        assert_eq!(rig.pid.tunings, vec![GAINS_PREHEAT, GAINS_SOAK, GAINS_REFLOW]);
        rig.run_for(5000, SwitchReading::None);
        assert_eq!(rig.pid.tunings.len(), 3);
    }

    #[test]
    fn soak_steps_are_paced_by_micro_period() {
        let mut rig = Rig::new(Profile::Leaded, 25.0);
        rig.tick(SwitchReading::None);
        rig.press(SwitchReading::Start);
        rig.sensor.temperature = 150.0;
        // Start was validated at t=110, soak entered at the t=1000 sample
        rig.run_until_state(ReflowState::Soak, 2000);
        let soak_start = rig.now - 10;
        assert_eq!(soak_start, 1000);
        rig.run_for(10_000 - 10, SwitchReading::None);
        assert_eq!(rig.controller.setpoint(), Some(155.0));
        rig.tick(SwitchReading::None);
        assert_eq!(rig.controller.setpoint(), Some(160.0));
        rig.run_until_state(ReflowState::Reflow, 100_000);
        assert_eq!(rig.controller.setpoint(), Some(224.0));
    }

    #[test]
    fn cancel_overrides_transition_in_same_cycle() {
        let mut rig = Rig::lead_free_to_reflow();
        assert!(rig.controller.is_on());
        // Next sample lands on a whole second; have the press validate on it
        let next_sample = (rig.now / 1000 + 1) * 1000;
        rig.run_for(next_sample - 100 - rig.now, SwitchReading::None);
        rig.sensor.temperature = 246.0;
        rig.run_for(100, SwitchReading::Start);
        assert_eq!(rig.state(), ReflowState::Reflow);
        rig.tick(SwitchReading::Start);
        assert_eq!(rig.state(), ReflowState::Idle);
        assert_eq!(rig.controller.status(), ReflowStatus::Off);
        assert!(!rig.last.heater);
        assert_eq!(rig.pid.mode, Mode::Manual);
    }

    #[test]
    fn start_press_does_not_cancel_the_run_it_starts() {
        let mut rig = Rig::new(Profile::LeadFree, 25.0);
        rig.tick(SwitchReading::None);
        // Switch held well past the debounce period
        rig.run_for(2000, SwitchReading::Start);
        assert_eq!(rig.state(), ReflowState::Preheat);
        assert!(rig.controller.is_on());
    }

    #[test]
    fn profile_cycles_and_persists_in_idle() {
        let mut rig = Rig::new(Profile::LeadFree, 25.0);
        rig.tick(SwitchReading::None);
        rig.press(SwitchReading::Select);
        assert_eq!(rig.controller.profile(), Profile::Leaded);
        rig.press(SwitchReading::Select);
        assert_eq!(rig.controller.profile(), Profile::Bake);
        rig.press(SwitchReading::Select);
        assert_eq!(rig.controller.profile(), Profile::LeadFree);
        assert_eq!(
            rig.saved,
            vec![Profile::Leaded, Profile::Bake, Profile::LeadFree]
        );
    }

    #[test]
    fn profile_select_ignored_outside_idle() {
        let mut rig = Rig::new(Profile::LeadFree, 25.0);
        rig.tick(SwitchReading::None);
        rig.press(SwitchReading::Start);
        assert_eq!(rig.state(), ReflowState::Preheat);
        rig.press(SwitchReading::Select);
        assert_eq!(rig.controller.profile(), Profile::LeadFree);
        assert!(rig.saved.is_empty());

        let mut rig = Rig::new(Profile::LeadFree, 80.0);
        rig.tick(SwitchReading::None);
        assert_eq!(rig.state(), ReflowState::TooHot);
        rig.press(SwitchReading::Select);
        assert_eq!(rig.controller.profile(), Profile::LeadFree);
        assert!(rig.saved.is_empty());
    }

    #[test]
    fn hot_oven_at_power_on_blocks_start() {
        let mut rig = Rig::new(Profile::LeadFree, 80.0);
        rig.run_for(3000, SwitchReading::Start);
        assert_eq!(rig.state(), ReflowState::TooHot);
        assert!(!rig.controller.is_on());
        assert!(!rig.last.heater);

        rig.sensor.temperature = 49.0;
        rig.run_until_state(ReflowState::Idle, 2000);
    }

    #[test]
    fn fault_stops_run_within_one_cycle() {
        let mut rig = Rig::new(Profile::LeadFree, 25.0);
        rig.tick(SwitchReading::None);
        rig.press(SwitchReading::Start);
        rig.run_until_state(ReflowState::Preheat, 100);
        rig.run_for(50, SwitchReading::None);
        assert!(rig.controller.is_on());

        rig.sensor.fault = SensorFault::OPEN;
        rig.run_until_state(ReflowState::Error, 1000);
        assert_eq!(rig.controller.status(), ReflowStatus::Off);
        assert!(!rig.last.heater);
        assert_eq!(rig.pid.mode, Mode::Manual);
    }

    #[test]
    fn error_waits_for_a_clean_fault_register() {
        let mut rig = Rig::new(Profile::LeadFree, 25.0);
        rig.sensor.fault = SensorFault::TC_RANGE | SensorFault::OVUV;
        rig.tick(SwitchReading::None);
        assert_eq!(rig.state(), ReflowState::Error);
        assert!(rig.last.status.as_ref().unwrap().error);

        rig.run_for(10_000, SwitchReading::None);
        assert_eq!(rig.state(), ReflowState::Error);
        rig.press(SwitchReading::Start);
        assert_eq!(rig.state(), ReflowState::Error);

        rig.sensor.fault = SensorFault::empty();
        rig.tick(SwitchReading::None);
        assert_eq!(rig.state(), ReflowState::Idle);
    }

    #[test]
    fn sensor_read_failure_counts_as_fault() {
        let mut rig = Rig::new(Profile::LeadFree, 25.0);
        rig.sensor.fail = true;
        rig.tick(SwitchReading::None);
        assert_eq!(rig.state(), ReflowState::Error);
    }

    #[test]
    fn fault_in_any_running_state_stops_the_oven() {
        for state in [
            ReflowState::Soak,
            ReflowState::Reflow,
            ReflowState::Cool,
            ReflowState::Complete,
            ReflowState::Bake,
        ] {
            let mut rig = Rig::entered(state);
            assert_eq!(rig.state(), state);

            rig.sensor.fault = SensorFault::OPEN;
            // Caught on the next sample, at most one sensor period away
            rig.run_until_state(ReflowState::Error, 1010);
            assert_eq!(rig.controller.status(), ReflowStatus::Off, "from {:?}", state);
            assert!(!rig.last.heater, "heater on after fault in {:?}", state);
            assert!(!rig.last.buzzer, "buzzer on after fault in {:?}", state);
            assert_eq!(rig.pid.mode, Mode::Manual);

            rig.run_for(3000, SwitchReading::None);
            assert_eq!(rig.state(), ReflowState::Error);
        }
    }

    #[test]
    fn failed_temperature_read_holds_error_despite_clean_register() {
        let mut rig = Rig::new(Profile::LeadFree, 25.0);
        rig.sensor.temperature_fails = true;
        rig.tick(SwitchReading::None);
        assert_eq!(rig.state(), ReflowState::Error);
        assert!(rig.last.status.as_ref().unwrap().error);

        for _ in 0..50 {
            let report = rig.tick(SwitchReading::Start).clone();
            assert!(!report.heater);
        }
        assert_eq!(rig.state(), ReflowState::Error);
        assert!(!rig.controller.is_on());
        assert!(rig.controller.snapshot(false).error);

        // Recovers on the first sample that reads a temperature again
        rig.run_for(20, SwitchReading::None);
        rig.sensor.temperature_fails = false;
        rig.run_until_state(ReflowState::Idle, 1000);
        assert_eq!(rig.now - 10, 1000);
    }

    #[test]
    fn bake_runs_until_cancelled() {
        let mut rig = Rig::new(Profile::Bake, 25.0);
        rig.tick(SwitchReading::None);
        rig.press(SwitchReading::Start);
        assert_eq!(rig.state(), ReflowState::Bake);
        assert_eq!(rig.controller.setpoint(), Some(120.0));

        rig.sensor.temperature = 120.0;
        let before = rig.pid.tunings.len();
        rig.run_for(60_000, SwitchReading::None);
        assert_eq!(rig.state(), ReflowState::Bake);
        assert_eq!(rig.pid.tunings.len(), before + 6000);
        assert!(rig.pid.tunings.iter().all(|gains| *gains == GAINS_BAKE));

        // Checked on the validating tick, the hot oven reads TOO_HOT right after
        rig.run_for(110, SwitchReading::Start);
        assert_eq!(rig.state(), ReflowState::Idle);
        assert!(!rig.controller.is_on());
    }

    #[test]
    fn heater_follows_output_within_window() {
        let mut rig = Rig::new(Profile::LeadFree, 25.0);
        rig.tick(SwitchReading::None);
        rig.run_for(110, SwitchReading::Start);
        // Window restarted when the run started at t=110; skip to a boundary
        rig.run_for(4 * 2000 - 10, SwitchReading::None);
        assert_eq!(rig.now, 110 + 4 * 2000);

        let mut on = 0;
        for _ in 0..200 {
            if rig.tick(SwitchReading::None).heater {
                on += 1;
            }
        }
        assert_eq!(on, 50);
    }

    #[test]
    fn data_records_while_on() {
        let mut rig = Rig::lead_free_to_reflow();
        let records = rig
            .logs
            .iter()
            .filter(|line| matches!(line, LogLine::Record(_)))
            .count();
        assert!(records > 90);
        match rig.logs.last() {
            Some(LogLine::Record(record)) => {
                assert_eq!(record.seconds as usize, records);
                assert_eq!(record.output, 500.0);
            }
            other => panic!("unexpected {:?}", other),
        }

        rig.press(SwitchReading::Start);
        let count = rig.logs.len();
        rig.run_for(5000, SwitchReading::None);
        assert_eq!(rig.logs.len(), count);
        assert!(!rig.last.led);
    }
}
