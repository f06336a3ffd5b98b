//! Thermocouple fault detection.

bitflags::bitflags! {
    /// Fault register of the thermocouple converter.
    ///
    /// Every bit is treated the same way: any one of them stops the oven.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SensorFault: u8 {
        const OPEN     = 0b0000_0001;
        const OVUV     = 0b0000_0010;
        const TC_LOW   = 0b0000_0100;
        const TC_HIGH  = 0b0000_1000;
        const CJ_LOW   = 0b0001_0000;
        const CJ_HIGH  = 0b0010_0000;
        const TC_RANGE = 0b0100_0000;
        const CJ_RANGE = 0b1000_0000;
    }
}

impl SensorFault {
    /// Mask from a raw register value, dropping bits the oven does not know.
    pub fn from_register(raw: u8) -> Self {
        Self::from_bits_truncate(raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultStatus {
    Ok,
    Fault(SensorFault),
}

impl FaultStatus {
    pub fn is_fault(&self) -> bool {
        matches!(self, FaultStatus::Fault(_))
    }
}

pub struct FaultMonitor;

impl FaultMonitor {
    pub fn check(mask: SensorFault) -> FaultStatus {
        if mask.intersects(SensorFault::all()) {
            FaultStatus::Fault(mask)
        } else {
            FaultStatus::Ok
        }
    }

    /// Like [`FaultMonitor::check`], but a failed read counts as every fault.
    pub fn check_reading<E>(reading: Result<SensorFault, E>) -> FaultStatus {
        match reading {
            Ok(mask) => Self::check(mask),
            Err(_) => FaultStatus::Fault(SensorFault::all()),
        }
    }
}
