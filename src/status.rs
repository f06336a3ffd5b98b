//! What the controller reports to the outside: a status snapshot refreshed
//! for the display, and a once-a-second CSV record while a run is on.

use core::fmt::{self, Write as _};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::watch::Watch;
use heapless::String;
use serde::Serialize;

pub const CSV_HEADER: &str = "Time,Setpoint,Input,Output";

/// Latest status for the display side.
pub static STATUS_WATCH: Watch<CriticalSectionRawMutex, StatusSnapshot, 2> = Watch::new();
/// Append-only data stream; lines are dropped when nobody drains it.
pub static DATA_LOG_CHANNEL: Channel<CriticalSectionRawMutex, LogLine, 8> = Channel::new();

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub state: &'static str,
    pub profile: &'static str,
    pub temperature: f32,
    /// Only present while a run is on.
    pub setpoint: Option<f32>,
    pub output: f32,
    pub heater: bool,
    pub error: bool,
}

impl StatusSnapshot {
    pub fn to_json(&self) -> Result<String<256>, serde_json_core::ser::Error> {
        serde_json_core::to_string(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataRecord {
    pub seconds: u32,
    pub setpoint: f32,
    pub input: f32,
    pub output: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogLine {
    /// Column names, sent when a run starts.
    Header,
    Record(DataRecord),
}

impl LogLine {
    /// CSV text of the line; fails rather than truncating when it does not fit.
    pub fn to_csv(&self) -> Result<String<64>, fmt::Error> {
        let mut line: String<64> = String::new();
        match self {
            LogLine::Header => line.push_str(CSV_HEADER).map_err(|_| fmt::Error)?,
            LogLine::Record(record) => write!(
                line,
                "{},{:.2},{:.2},{:.2}",
                record.seconds, record.setpoint, record.input, record.output
            )?,
        }
        Ok(line)
    }
}

/// Hand a line to the data stream without waiting.
pub fn append_log(line: LogLine) {
    if DATA_LOG_CHANNEL.try_send(line).is_err() {
        log::debug!("Data log full, dropping line");
    }
}

pub fn publish_status(snapshot: StatusSnapshot) {
    STATUS_WATCH.sender().send(snapshot);
}
