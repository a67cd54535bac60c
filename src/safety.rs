//! Actuator guard.
//!
//! Sits between the control loop and the [`ActuatorPort`].  Every command
//! goes through the guard, which remembers the desired state of each relay
//! and a pending-fault bitmask of writes that did not land.
//!
//! ## Fault lifecycle
//!
//! 1. A write fails; the guard logs it and sets the actuator's bit.
//! 2. Each tick the loop calls [`ActuatorGuard::retry_pending`], which
//!    re-sends the desired state for every set bit.
//! 3. A successful retry clears the bit.
//!
//! [`ActuatorGuard::force_safe`] always attempts both relays, regardless
//! of what it believes their state to be.

use log::{error, info, warn};

use crate::app::ports::ActuatorPort;
use crate::error::ActuatorFault;
use crate::scheduler::ActuatorId;

/// Desired relay states plus outstanding write failures.
#[derive(Debug, Default)]
pub struct ActuatorGuard {
    desired: [bool; ActuatorId::COUNT],
    /// Bit set = last write for that actuator failed.
    pending: u8,
    faults: u32,
}

impl ActuatorGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Command `id` to `energized`.  A failed write is remembered for retry.
    pub fn command(
        &mut self,
        hw: &mut impl ActuatorPort,
        id: ActuatorId,
        energized: bool,
    ) -> Result<(), ActuatorFault> {
        self.desired[id as usize] = energized;
        self.write(hw, id)
    }

    /// Re-send the desired state for every actuator with a pending fault.
    /// Returns how many retries failed again.
    pub fn retry_pending(&mut self, hw: &mut impl ActuatorPort) -> u32 {
        let mut failed = 0;
        for id in ActuatorId::ALL {
            if self.pending & id.mask() == 0 {
                continue;
            }
            if self.write(hw, id).is_err() {
                failed += 1;
            } else {
                info!("Actuator {}: retry succeeded", id);
            }
        }
        failed
    }

    /// Drive both relays de-energized.  Returns how many writes failed.
    pub fn force_safe(&mut self, hw: &mut impl ActuatorPort) -> u32 {
        let mut failed = 0;
        for id in ActuatorId::ALL {
            self.desired[id as usize] = false;
            if let Err(e) = hw.set_state(id, false) {
                error!("Actuator {}: safe shutdown write failed: {}", id, e);
                self.pending |= id.mask();
                self.faults += 1;
                failed += 1;
            } else {
                self.pending &= !id.mask();
            }
        }
        failed
    }

    pub fn desired(&self, id: ActuatorId) -> bool {
        self.desired[id as usize]
    }

    /// Pending-fault bitmask (see [`ActuatorId::mask`]).
    pub fn pending(&self) -> u8 {
        self.pending
    }

    pub fn has_pending(&self, id: ActuatorId) -> bool {
        self.pending & id.mask() != 0
    }

    /// Total failed writes since construction.
    pub fn fault_count(&self) -> u32 {
        self.faults
    }

    fn write(&mut self, hw: &mut impl ActuatorPort, id: ActuatorId) -> Result<(), ActuatorFault> {
        let energized = self.desired[id as usize];
        match hw.set_state(id, energized) {
            Ok(()) => {
                self.pending &= !id.mask();
                Ok(())
            }
            Err(e) => {
                if self.pending & id.mask() == 0 {
                    warn!("Actuator {}: write failed ({}), will retry", id, e);
                }
                self.pending |= id.mask();
                self.faults += 1;
                Err(e)
            }
        }
    }
}
