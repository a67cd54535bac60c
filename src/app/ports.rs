//! Port traits: the hexagonal boundary between the control loop and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ControlLoop (domain)
//! ```
//!
//! Driven adapters (probe acquisition, relays, journal, clock, event sinks)
//! implement these traits.  The [`ControlLoop`](super::service::ControlLoop)
//! consumes them via generics, so the domain core never touches hardware
//! directly.
//!
//! All port errors are typed; callers handle every variant explicitly.

use core::time::Duration;

use crate::config::KilnConfig;
use crate::error::{AcquisitionError, ActuatorFault, ConfigError, PersistenceError};
use crate::scheduler::ActuatorId;
use crate::sensors::{ChannelMask, Reading};

use super::commands::KilnCommand;
use super::events::{KilnEvent, ReportId, SampleRecord};

// ───────────────────────────────────────────────────────────────
// Acquisition port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// One probe/ambient reading per cycle.
pub trait AcquisitionPort {
    /// Read all 15 channels.  Disabled channels come back unset.
    fn read_cycle(&mut self, mask: &ChannelMask) -> Result<Reading, AcquisitionError>;

    /// Effective heating for the cycle just read.  Only simulated sources
    /// care; real hardware sees the heater through the relay.
    fn apply_heating(&mut self, _effective: bool) {}

    /// The run has ended; simulated sources switch to cooldown.
    fn enter_cooldown(&mut self) {}
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Relay outputs.  Failures are non-fatal; the guard retries them.
pub trait ActuatorPort {
    fn set_state(&mut self, actuator: ActuatorId, energized: bool) -> Result<(), ActuatorFault>;
}

// ───────────────────────────────────────────────────────────────
// Persistence port (driven adapter: domain → report storage)
// ───────────────────────────────────────────────────────────────

/// Report storage.  Steps arrive in strictly increasing timestamp order.
pub trait PersistencePort {
    fn append_step(&mut self, report: ReportId, record: &SampleRecord)
    -> Result<(), PersistenceError>;

    /// Close the report.  Called once, only for completed runs.
    fn finalize_report(
        &mut self,
        report: ReportId,
        end_timestamp_ms: u64,
    ) -> Result<(), PersistenceError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists run configuration.
///
/// Implementations MUST validate before persisting.  Invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], never silently clamped.
pub trait ConfigPort {
    /// Returns [`KilnConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<KilnConfig, ConfigError>;

    fn save(&self, config: &KilnConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Time source for the loop.  Simulated clocks advance on `sleep`.
pub trait Clock {
    /// Monotonic time since the clock was created.
    fn monotonic(&self) -> Duration;

    /// Wall-clock time at run start, milliseconds since the Unix epoch.
    fn wall_start_ms(&self) -> u64;

    fn sleep(&self, duration: Duration);

    /// One poll of the pause wait.  The time it takes is what `monotonic`
    /// reports as paused.
    fn pause_wait(&self, poll: Duration) {
        self.sleep(poll);
    }
}

// ───────────────────────────────────────────────────────────────
// Command port (driving adapter: operator → domain)
// ───────────────────────────────────────────────────────────────

/// Non-blocking source of operator commands.
pub trait CommandPort {
    fn try_next(&mut self) -> Option<KilnCommand>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → subscribers)
// ───────────────────────────────────────────────────────────────

/// The loop emits [`KilnEvent`]s through this port.  Adapters decide where
/// they go (log, bus, test recorder).
pub trait EventSink {
    fn emit(&mut self, event: &KilnEvent);
}
