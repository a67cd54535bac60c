//! Outbound events and the per-sample record.
//!
//! The [`ControlLoop`](super::service::ControlLoop) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other side
//! decide what to do with them: log them, publish them on the bus, or
//! record them in a test.

use serde::{Deserialize, Serialize};

use crate::diagnostics::RunMetrics;
use crate::error::{AcquisitionError, ActuatorFault, PersistenceError};
use crate::fsm::ProcessPhase;
use crate::scheduler::ActuatorId;
use crate::sensors::{AMBIENT_COUNT, AMBIENT_PRIMARY, PROBE_COUNT, Reading};

/// Identifier of the report a run writes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReportId(pub u32);

impl core::fmt::Display for ReportId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One committed sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    /// 1-based tick number.
    pub sequence: u32,
    /// Logical wall-clock time, milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    pub probes: [f32; PROBE_COUNT],
    pub ambient: [f32; AMBIENT_COUNT],
    pub consecutive_successes: u32,
    pub successes_remaining: u32,
}

impl SampleRecord {
    pub fn from_reading(
        sequence: u32,
        timestamp_ms: u64,
        reading: &Reading,
        consecutive_successes: u32,
        successes_remaining: u32,
    ) -> Self {
        let mut probes = [0.0; PROBE_COUNT];
        probes.copy_from_slice(&reading[..PROBE_COUNT]);
        let mut ambient = [0.0; AMBIENT_COUNT];
        ambient.copy_from_slice(&reading[AMBIENT_PRIMARY..]);
        Self {
            sequence,
            timestamp_ms,
            probes,
            ambient,
            consecutive_successes,
            successes_remaining,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed(ReportId),
    Cancelled,
    Failed(&'static str),
}

impl core::fmt::Display for Outcome {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Completed(id) => write!(f, "completed (report {})", id),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// End-of-run summary carried by [`KilnEvent::Finished`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub report: ReportId,
    pub samples: u32,
    pub start_timestamp_ms: u64,
    pub end_timestamp_ms: u64,
    pub consecutive_successes: u32,
    pub metrics: RunMetrics,
}

/// Non-fatal problems surfaced to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warning {
    /// The step for `sequence` could not be persisted after a retry.
    StepNotPersisted {
        sequence: u32,
        error: PersistenceError,
    },
    /// The report could not be finalized after a retry.
    ReportNotFinalized(PersistenceError),
    /// A relay write failed; it will be retried next tick.
    ActuatorFault {
        actuator: ActuatorId,
        fault: ActuatorFault,
    },
    /// The acquisition cycle failed; values were carried forward.
    AcquisitionFailed(AcquisitionError),
}

impl core::fmt::Display for Warning {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::StepNotPersisted { sequence, error } => {
                write!(f, "step {} not persisted: {}", sequence, error)
            }
            Self::ReportNotFinalized(e) => write!(f, "report not finalized: {}", e),
            Self::ActuatorFault { actuator, fault } => write!(f, "{}: {}", actuator, fault),
            Self::AcquisitionFailed(e) => write!(f, "acquisition failed: {}", e),
        }
    }
}

/// Structured events emitted by the control loop.
#[derive(Debug, Clone, PartialEq)]
pub enum KilnEvent {
    /// The run began.
    Started {
        report: ReportId,
        start_timestamp_ms: u64,
    },

    /// A sample was committed.
    Sample(SampleRecord),

    /// The process phase changed.
    PhaseChanged {
        from: ProcessPhase,
        to: ProcessPhase,
    },

    /// A duty-cycle relay changed output.
    RelayToggled {
        actuator: ActuatorId,
        energized: bool,
        /// Logical seconds since run start.
        at_secs: u64,
    },

    /// Something went wrong but the run continues.
    Warning(Warning),

    /// The run ended.  Always the last event of a run.
    Finished {
        outcome: Outcome,
        summary: RunSummary,
    },
}
