//! Backend selection: hardware, simulated or null-safe, chosen once at
//! construction.
//!
//! [`ActuatorBackend`] and [`AcquisitionBackend`] are the only types the
//! runtime hands to the control loop.  Each variant carries exactly the
//! capability it has: real relay lines, an in-memory simulation, or
//! nothing at all (every command accepted, every read unavailable).

use log::debug;

use crate::app::ports::{AcquisitionPort, ActuatorPort};
use crate::drivers::relay::RelayLine;
use crate::error::{AcquisitionError, ActuatorFault};
use crate::scheduler::ActuatorId;
use crate::sensors::simulated::SimulatedAcquisition;
use crate::sensors::{ChannelMask, Reading};

// ── Simulated relays ──────────────────────────────────────────

/// In-memory relay pair for simulation runs.
#[derive(Debug, Default, Clone)]
pub struct SimulatedRelays {
    energized: [bool; ActuatorId::COUNT],
    writes: u32,
}

impl SimulatedRelays {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_energized(&self, id: ActuatorId) -> bool {
        self.energized[id as usize]
    }

    pub fn writes(&self) -> u32 {
        self.writes
    }
}

impl ActuatorPort for SimulatedRelays {
    fn set_state(&mut self, actuator: ActuatorId, energized: bool) -> Result<(), ActuatorFault> {
        self.energized[actuator as usize] = energized;
        self.writes += 1;
        Ok(())
    }
}

// ── Actuator backend ──────────────────────────────────────────

pub enum ActuatorBackend {
    Hardware {
        fan: Box<dyn RelayLine + Send>,
        heater: Box<dyn RelayLine + Send>,
    },
    Simulated(SimulatedRelays),
    NullSafe,
}

impl ActuatorBackend {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Hardware { .. } => "hardware",
            Self::Simulated(_) => "simulated",
            Self::NullSafe => "null-safe",
        }
    }

    /// Current output, if the backend can tell.
    pub fn is_energized(&self, id: ActuatorId) -> Option<bool> {
        match self {
            Self::Hardware { fan, heater } => Some(match id {
                ActuatorId::Fan => fan.is_energized(),
                ActuatorId::Heater => heater.is_energized(),
            }),
            Self::Simulated(relays) => Some(relays.is_energized(id)),
            Self::NullSafe => None,
        }
    }
}

impl ActuatorPort for ActuatorBackend {
    fn set_state(&mut self, actuator: ActuatorId, energized: bool) -> Result<(), ActuatorFault> {
        match self {
            Self::Hardware { fan, heater } => match actuator {
                ActuatorId::Fan => fan.set(energized),
                ActuatorId::Heater => heater.set(energized),
            },
            Self::Simulated(relays) => relays.set_state(actuator, energized),
            Self::NullSafe => {
                debug!("null-safe actuator: {} -> {}", actuator, energized);
                Ok(())
            }
        }
    }
}

// ── Acquisition backend ───────────────────────────────────────

pub enum AcquisitionBackend {
    Hardware(Box<dyn AcquisitionPort + Send>),
    Simulated(SimulatedAcquisition),
    NullSafe,
}

impl AcquisitionBackend {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Hardware(_) => "hardware",
            Self::Simulated(_) => "simulated",
            Self::NullSafe => "null-safe",
        }
    }
}

impl AcquisitionPort for AcquisitionBackend {
    fn read_cycle(&mut self, mask: &ChannelMask) -> Result<Reading, AcquisitionError> {
        match self {
            Self::Hardware(source) => source.read_cycle(mask),
            Self::Simulated(sim) => sim.read_cycle(mask),
            Self::NullSafe => Err(AcquisitionError::Unavailable),
        }
    }

    fn apply_heating(&mut self, effective: bool) {
        match self {
            Self::Hardware(source) => source.apply_heating(effective),
            Self::Simulated(sim) => sim.apply_heating(effective),
            Self::NullSafe => {}
        }
    }

    fn enter_cooldown(&mut self) {
        match self {
            Self::Hardware(source) => source.enter_cooldown(),
            Self::Simulated(sim) => sim.enter_cooldown(),
            Self::NullSafe => {}
        }
    }
}
