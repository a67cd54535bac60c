//! Simulated acquisition backed by the [`ThermalModel`].
//!
//! Each cycle is observed (with output noise) before the model advances,
//! so the reading a tick sees is the kiln state at the start of that tick.

use crate::app::ports::AcquisitionPort;
use crate::error::AcquisitionError;
use crate::thermal::{Noise, ThermalModel};

use super::{ChannelMask, Reading};

pub struct SimulatedAcquisition {
    model: ThermalModel,
    cycles: u64,
}

impl SimulatedAcquisition {
    pub fn new(model: ThermalModel) -> Self {
        Self { model, cycles: 0 }
    }

    /// Simulated kiln starting at `initial_ambient` with seeded noise.
    pub fn seeded(initial_ambient: f32, seed: u64) -> Self {
        Self::new(ThermalModel::new(initial_ambient, Noise::seeded(seed)))
    }

    pub fn model(&self) -> &ThermalModel {
        &self.model
    }

    /// Cycles read so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}

impl AcquisitionPort for SimulatedAcquisition {
    fn read_cycle(&mut self, mask: &ChannelMask) -> Result<Reading, AcquisitionError> {
        self.cycles += 1;
        Ok(self.model.observe(mask))
    }

    fn apply_heating(&mut self, effective: bool) {
        self.model.step(effective);
    }

    fn enter_cooldown(&mut self) {
        self.model.enter_cooldown();
    }
}
