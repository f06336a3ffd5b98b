use embassy_time::Duration;

use crate::board::ProfileStore;
use crate::config::{SOAK_TEMPERATURE_STEP, TEMPERATURE_SOAK_MIN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    LeadFree,
    Leaded,
    Bake,
}

impl Profile {
    /// Next profile in the selection cycle.
    pub fn next(self) -> Self {
        match self {
            Profile::LeadFree => Profile::Leaded,
            Profile::Leaded => Profile::Bake,
            Profile::Bake => Profile::LeadFree,
        }
    }

    pub fn from_stored(value: u8) -> Option<Self> {
        match value {
            0 => Some(Profile::LeadFree),
            1 => Some(Profile::Leaded),
            2 => Some(Profile::Bake),
            _ => None,
        }
    }

    pub fn stored(self) -> u8 {
        match self {
            Profile::LeadFree => 0,
            Profile::Leaded => 1,
            Profile::Bake => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Profile::LeadFree => "LF",
            Profile::Leaded => "PB",
            Profile::Bake => "BK",
        }
    }

    /// Stage parameters for a reflow run, `None` for bake.
    pub fn stage_parameters(self) -> Option<StageParameters> {
        match self {
            Profile::LeadFree => Some(LEAD_FREE_STAGE),
            Profile::Leaded => Some(LEADED_STAGE),
            Profile::Bake => None,
        }
    }
}

/// Temperature ceilings and soak pacing, fixed for the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageParameters {
    pub soak_temperature_min: f32,
    pub soak_temperature_max: f32,
    pub reflow_temperature_max: f32,
    pub soak_micro_period: Duration,
    pub soak_step: f32,
}

pub const LEAD_FREE_STAGE: StageParameters = StageParameters {
    soak_temperature_min: TEMPERATURE_SOAK_MIN,
    soak_temperature_max: 200.0,
    reflow_temperature_max: 250.0,
    soak_micro_period: Duration::from_millis(9000),
    soak_step: SOAK_TEMPERATURE_STEP,
};

pub const LEADED_STAGE: StageParameters = StageParameters {
    soak_temperature_min: TEMPERATURE_SOAK_MIN,
    soak_temperature_max: 180.0,
    reflow_temperature_max: 224.0,
    soak_micro_period: Duration::from_millis(10000),
    soak_step: SOAK_TEMPERATURE_STEP,
};

/// Load the persisted profile, falling back to lead-free.
///
/// An invalid or unreadable value is replaced in the store straight away so
/// the next boot sees a valid selection.
pub fn restore_profile<S: ProfileStore>(store: &mut S) -> Profile {
    let stored = match store.load() {
        Ok(value) => Profile::from_stored(value),
        Err(err) => {
            log::warn!("Profile store read failed: {:?}", err);
            None
        }
    };

    match stored {
        Some(profile) => {
            log::info!("Restored profile {}", profile.label());
            profile
        }
        None => {
            log::info!("No valid stored profile, defaulting to lead-free");
            if let Err(err) = store.save(Profile::LeadFree.stored()) {
                log::warn!("Profile store write failed: {:?}", err);
            }
            Profile::LeadFree
        }
    }
}
