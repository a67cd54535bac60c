//! Relay duty-cycle scheduler.
//!
//! The fan and the heater each run an independent work/rest timer:
//!
//! ```text
//!   energized ──(elapsed ≥ work)──▶ de-energized ──(elapsed ≥ rest)──▶ energized
//! ```
//!
//! Timers run on the loop's logical time, so a pause freezes them along with
//! the sample timestamps.  They know nothing about the thermostat; the veto
//! is applied on top by the control loop.

use core::time::Duration;

use log::info;

use crate::config::KilnConfig;

// ═══════════════════════════════════════════════════════════════
//  Actuator identity
// ═══════════════════════════════════════════════════════════════

/// The two duty-cycled actuators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum ActuatorId {
    Fan = 0,
    Heater = 1,
}

impl ActuatorId {
    pub const COUNT: usize = 2;
    pub const ALL: [ActuatorId; Self::COUNT] = [Self::Fan, Self::Heater];

    /// Bit for this actuator in a fault/pending mask.
    pub const fn mask(self) -> u8 {
        1 << (self as u8)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Fan => "fan",
            Self::Heater => "heater",
        }
    }
}

impl core::fmt::Display for ActuatorId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Relay state
// ═══════════════════════════════════════════════════════════════

/// Timer state for one relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayState {
    pub energized: bool,
    /// Logical time at which the current work or rest phase began.
    pub phase_start: Duration,
    pub work: Duration,
    pub rest: Duration,
}

impl RelayState {
    fn new(work: Duration, rest: Duration, now: Duration) -> Self {
        debug_assert!(!work.is_zero() && !rest.is_zero());
        Self {
            energized: true,
            phase_start: now,
            work,
            rest,
        }
    }

    /// Work duration while energized, rest duration otherwise.
    pub fn applicable(&self) -> Duration {
        if self.energized { self.work } else { self.rest }
    }

    pub fn is_due(&self, now: Duration) -> bool {
        now.saturating_sub(self.phase_start) >= self.applicable()
    }
}

/// A relay output change produced by [`RelayScheduler::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayToggle {
    pub actuator: ActuatorId,
    pub energized: bool,
    pub at: Duration,
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

/// Work/rest timers for the fan and the heater.
#[derive(Debug, Clone)]
pub struct RelayScheduler {
    relays: [RelayState; ActuatorId::COUNT],
}

impl RelayScheduler {
    /// Both relays start energized at `now`.
    pub fn new(config: &KilnConfig, now: Duration) -> Self {
        Self {
            relays: [
                RelayState::new(config.fan_work(), config.fan_rest(), now),
                RelayState::new(config.heater_work(), config.heater_rest(), now),
            ],
        }
    }

    /// Toggle every relay whose phase has run out.  At most one toggle per
    /// relay per call, however late the call is.
    pub fn advance(&mut self, now: Duration) -> heapless::Vec<RelayToggle, { ActuatorId::COUNT }> {
        let mut toggles = heapless::Vec::new();
        for id in ActuatorId::ALL {
            let relay = &mut self.relays[id as usize];
            if !relay.is_due(now) {
                continue;
            }
            relay.energized = !relay.energized;
            relay.phase_start = now;
            info!(
                "Relay {}: {} at t={}s",
                id,
                if relay.energized { "ON" } else { "OFF" },
                now.as_secs()
            );
            // Capacity equals the number of actuators.
            let _ = toggles.push(RelayToggle {
                actuator: id,
                energized: relay.energized,
                at: now,
            });
        }
        toggles
    }

    pub fn state(&self, id: ActuatorId) -> &RelayState {
        &self.relays[id as usize]
    }

    pub fn is_energized(&self, id: ActuatorId) -> bool {
        self.relays[id as usize].energized
    }

    /// De-energize both relays; used when the run ends.
    pub fn force_off(&mut self, now: Duration) {
        for relay in &mut self.relays {
            if relay.energized {
                relay.energized = false;
                relay.phase_start = now;
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
