//! Table-driven process phase machine.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  PhaseTable                                                   │
//! │  ┌───────────┬──────────────────────────────────┬──────────┐  │
//! │  │ Phase     │ successors                       │ terminal │  │
//! │  ├───────────┼──────────────────────────────────┼──────────┤  │
//! │  │ Idle      │ Running, Cancelled, Failed       │ no       │  │
//! │  │ Running   │ Paused, Completed, Cancelled,    │ no       │  │
//! │  │           │ Failed                           │          │  │
//! │  │ Paused    │ Running, Cancelled, Failed       │ no       │  │
//! │  │ Completed │ -                                │ yes      │  │
//! │  │ Cancelled │ -                                │ yes      │  │
//! │  │ Failed    │ -                                │ yes      │  │
//! │  └───────────┴──────────────────────────────────┴──────────┘  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! The machine only validates and records transitions.  What causes them
//! (samples, commands, configuration errors) lives in
//! [`ProcessMonitor`](crate::control::monitor::ProcessMonitor).

use log::{info, warn};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Phase identity
// ---------------------------------------------------------------------------

/// Phase of a heat-treatment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ProcessPhase {
    Idle = 0,
    Running = 1,
    Paused = 2,
    Completed = 3,
    Cancelled = 4,
    Failed = 5,
}

impl ProcessPhase {
    /// Total number of phases, used to size the table.
    pub const COUNT: usize = 6;

    /// Convert a table index back to a phase.  Out-of-range indices map to
    /// `Failed` in release builds.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Paused,
            3 => Self::Completed,
            4 => Self::Cancelled,
            5 => Self::Failed,
            _ => {
                debug_assert!(false, "invalid phase index: {idx}");
                Self::Failed
            }
        }
    }

    pub fn name(self) -> &'static str {
        PHASE_TABLE[self as usize].name
    }

    pub fn is_terminal(self) -> bool {
        PHASE_TABLE[self as usize].successors.is_empty()
    }
}

impl core::fmt::Display for ProcessPhase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Descriptor table
// ---------------------------------------------------------------------------

/// Static descriptor for one phase.
pub struct PhaseDescriptor {
    pub phase: ProcessPhase,
    pub name: &'static str,
    /// Phases reachable from this one.  Empty for terminal phases.
    pub successors: &'static [ProcessPhase],
}

use ProcessPhase::{Cancelled, Completed, Failed, Idle, Paused, Running};

/// Indexed by `ProcessPhase as usize`.
pub static PHASE_TABLE: [PhaseDescriptor; ProcessPhase::COUNT] = [
    PhaseDescriptor {
        phase: Idle,
        name: "Idle",
        successors: &[Running, Cancelled, Failed],
    },
    PhaseDescriptor {
        phase: Running,
        name: "Running",
        successors: &[Paused, Completed, Cancelled, Failed],
    },
    PhaseDescriptor {
        phase: Paused,
        name: "Paused",
        successors: &[Running, Cancelled, Failed],
    },
    PhaseDescriptor {
        phase: Completed,
        name: "Completed",
        successors: &[],
    },
    PhaseDescriptor {
        phase: Cancelled,
        name: "Cancelled",
        successors: &[],
    },
    PhaseDescriptor {
        phase: Failed,
        name: "Failed",
        successors: &[],
    },
];

/// A transition the table does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: ProcessPhase,
    pub to: ProcessPhase,
}

impl core::fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "invalid phase transition {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for InvalidTransition {}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Phase machine for a single run.  Starts in `Idle`.
#[derive(Debug)]
pub struct ProcessFsm {
    current: usize,
    transitions: u32,
}

impl Default for ProcessFsm {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessFsm {
    pub fn new() -> Self {
        Self {
            current: Idle as usize,
            transitions: 0,
        }
    }

    pub fn current(&self) -> ProcessPhase {
        PHASE_TABLE[self.current].phase
    }

    pub fn can_transition(&self, next: ProcessPhase) -> bool {
        PHASE_TABLE[self.current].successors.contains(&next)
    }

    /// Move to `next`.  Returns the phase that was left.
    pub fn transition(&mut self, next: ProcessPhase) -> Result<ProcessPhase, InvalidTransition> {
        let from = self.current();
        if !self.can_transition(next) {
            warn!("Phase transition rejected: {} -> {}", from.name(), next.name());
            return Err(InvalidTransition { from, to: next });
        }
        info!("Phase transition: {} -> {}", from.name(), next.name());
        self.current = next as usize;
        self.transitions += 1;
        Ok(from)
    }

    /// Number of accepted transitions.
    pub fn transition_count(&self) -> u32 {
        self.transitions
    }
}
