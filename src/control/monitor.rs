//! Process monitor: consecutive-success counter over the phase machine.
//!
//! Each committed sample is judged by [`Criteria`].  A success adds one to
//! the counter, any rejection resets it, and reaching the configured count
//! completes the run.  An empty active probe set cannot be judged at all
//! and fails the run.

use log::{debug, error, info};

use crate::config::KilnConfig;
use crate::control::criteria::{Criteria, Rejection};
use crate::error::ConfigError;
use crate::fsm::{InvalidTransition, ProcessFsm, ProcessPhase};
use crate::sensors::{ChannelMask, Reading};

/// Outcome of judging one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// Counted; carries the new consecutive count.
    Success { consecutive: u32 },
    /// Counter reset to zero.
    Reset(Rejection),
    /// This sample reached the target count.
    Completed,
    /// The sample could not be judged; the run has failed.
    Failed(ConfigError),
    /// The run is not `Running`; nothing was counted.
    Ignored,
}

#[derive(Debug)]
pub struct ProcessMonitor {
    fsm: ProcessFsm,
    criteria: Criteria,
    target_count: u32,
    consecutive: u32,
    resets: u32,
    failure: Option<&'static str>,
}

impl ProcessMonitor {
    pub fn new(config: &KilnConfig) -> Self {
        Self {
            fsm: ProcessFsm::new(),
            criteria: Criteria::from_config(config),
            target_count: config.target_success_count,
            consecutive: 0,
            resets: 0,
            failure: None,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self) -> Result<ProcessPhase, InvalidTransition> {
        self.consecutive = 0;
        self.fsm.transition(ProcessPhase::Running)
    }

    pub fn pause(&mut self) -> Result<ProcessPhase, InvalidTransition> {
        self.fsm.transition(ProcessPhase::Paused)
    }

    pub fn resume(&mut self) -> Result<ProcessPhase, InvalidTransition> {
        self.fsm.transition(ProcessPhase::Running)
    }

    /// Allowed from any non-terminal phase.
    pub fn cancel(&mut self) -> Result<ProcessPhase, InvalidTransition> {
        self.fsm.transition(ProcessPhase::Cancelled)
    }

    pub fn fail(&mut self, reason: &'static str) -> Result<ProcessPhase, InvalidTransition> {
        let prev = self.fsm.transition(ProcessPhase::Failed)?;
        error!("Run failed: {}", reason);
        self.failure = Some(reason);
        Ok(prev)
    }

    // ── Per-sample ────────────────────────────────────────────

    /// Judge one committed sample.  `previous` is the prior committed
    /// reading (for the strict delta check).
    pub fn observe(
        &mut self,
        reading: &Reading,
        previous: Option<&Reading>,
        mask: &ChannelMask,
    ) -> Verdict {
        if self.fsm.current() != ProcessPhase::Running {
            return Verdict::Ignored;
        }
        match self.criteria.evaluate(reading, previous, mask) {
            Ok(()) => {
                self.consecutive += 1;
                debug!(
                    "Sample success {}/{}",
                    self.consecutive, self.target_count
                );
                if self.consecutive >= self.target_count {
                    info!("Target held for {} consecutive samples", self.consecutive);
                    // Running -> Completed is always in the table.
                    let _ = self.fsm.transition(ProcessPhase::Completed);
                    Verdict::Completed
                } else {
                    Verdict::Success {
                        consecutive: self.consecutive,
                    }
                }
            }
            Err(Rejection::NoActiveProbes) => {
                self.consecutive = 0;
                let _ = self.fail("active probe set is empty");
                Verdict::Failed(ConfigError::NoActiveProbes)
            }
            Err(rejection) => {
                if self.consecutive > 0 {
                    info!("Success streak of {} reset: {}", self.consecutive, rejection);
                    self.resets += 1;
                }
                self.consecutive = 0;
                Verdict::Reset(rejection)
            }
        }
    }

    /// A cycle that produced nothing to judge.  Breaks the streak without
    /// failing the run.
    pub fn miss(&mut self) -> Verdict {
        if self.fsm.current() != ProcessPhase::Running {
            return Verdict::Ignored;
        }
        if self.consecutive > 0 {
            self.resets += 1;
        }
        self.consecutive = 0;
        Verdict::Reset(Rejection::NoReading)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn phase(&self) -> ProcessPhase {
        self.fsm.current()
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    pub fn remaining(&self) -> u32 {
        self.target_count.saturating_sub(self.consecutive)
    }

    pub fn target_count(&self) -> u32 {
        self.target_count
    }

    /// Streaks broken by a failing sample.
    pub fn resets(&self) -> u32 {
        self.resets
    }

    pub fn failure_reason(&self) -> Option<&'static str> {
        self.failure
    }
}
