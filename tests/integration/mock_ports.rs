//! Mock adapters for integration tests.
//!
//! Each mock records what the control loop did to it so tests can assert
//! on the full history without real hardware, storage or time.

use std::time::Duration;

use kiln::adapters::journal::MemoryJournal;
use kiln::adapters::time::SimulatedClock;
use kiln::app::commands::KilnCommand;
use kiln::app::events::{KilnEvent, Outcome, ReportId, RunSummary, SampleRecord, Warning};
use kiln::app::ports::{AcquisitionPort, ActuatorPort, CommandPort, EventSink, PersistencePort};
use kiln::app::service::{ControlLoop, Ports};
use kiln::config::KilnConfig;
use kiln::error::{AcquisitionError, ActuatorFault, PersistenceError};
use kiln::fsm::ProcessPhase;
use kiln::scheduler::ActuatorId;
use kiln::sensors::{AMBIENT_PRIMARY, AMBIENT_SECONDARY, CHANNEL_COUNT, ChannelMask, Reading, UNSET};

pub const START_MS: u64 = 1_700_000_000_000;

// ── Readings ──────────────────────────────────────────────────

/// Reading with the given probe values (1-based ids) and both ambient
/// sensors at `ambient`.
pub fn reading(probes: &[(usize, f32)], ambient: f32) -> Reading {
    let mut r = [UNSET; CHANNEL_COUNT];
    for (id, value) in probes {
        r[id - 1] = *value;
    }
    r[AMBIENT_PRIMARY] = ambient;
    r[AMBIENT_SECONDARY] = ambient;
    r
}

/// Mask with only the given probes (1-based) and both ambient sensors.
pub fn mask_with(probes: &[usize]) -> ChannelMask {
    let mut m = [false; CHANNEL_COUNT];
    for id in probes {
        m[id - 1] = true;
    }
    m[AMBIENT_PRIMARY] = true;
    m[AMBIENT_SECONDARY] = true;
    m
}

// ── ScriptedAcquisition ───────────────────────────────────────

/// Returns scripted cycles in order, repeating the last one.
pub struct ScriptedAcquisition {
    script: Vec<Result<Reading, AcquisitionError>>,
    next: usize,
    pub heating: Vec<bool>,
    pub cooled_down: bool,
}

#[allow(dead_code)]
impl ScriptedAcquisition {
    pub fn new(script: Vec<Result<Reading, AcquisitionError>>) -> Self {
        assert!(!script.is_empty());
        Self {
            script,
            next: 0,
            heating: Vec::new(),
            cooled_down: false,
        }
    }

    pub fn constant(r: Reading) -> Self {
        Self::new(vec![Ok(r)])
    }
}

impl AcquisitionPort for ScriptedAcquisition {
    fn read_cycle(&mut self, _mask: &ChannelMask) -> Result<Reading, AcquisitionError> {
        let i = self.next.min(self.script.len() - 1);
        self.next += 1;
        self.script[i]
    }

    fn apply_heating(&mut self, effective: bool) {
        self.heating.push(effective);
    }

    fn enter_cooldown(&mut self) {
        self.cooled_down = true;
    }
}

// ── RecordingActuators ────────────────────────────────────────

/// Records every write; the first `fail[id]` writes to an actuator fail.
#[derive(Default)]
pub struct RecordingActuators {
    pub calls: Vec<(ActuatorId, bool)>,
    pub state: [bool; ActuatorId::COUNT],
    pub fail: [u32; ActuatorId::COUNT],
}

#[allow(dead_code)]
impl RecordingActuators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(id: ActuatorId, times: u32) -> Self {
        let mut a = Self::default();
        a.fail[id as usize] = times;
        a
    }

    pub fn is_energized(&self, id: ActuatorId) -> bool {
        self.state[id as usize]
    }

    pub fn calls_for(&self, id: ActuatorId) -> Vec<bool> {
        self.calls
            .iter()
            .filter(|(a, _)| *a == id)
            .map(|(_, on)| *on)
            .collect()
    }
}

impl ActuatorPort for RecordingActuators {
    fn set_state(&mut self, actuator: ActuatorId, energized: bool) -> Result<(), ActuatorFault> {
        self.calls.push((actuator, energized));
        let remaining = &mut self.fail[actuator as usize];
        if *remaining > 0 {
            *remaining -= 1;
            return Err(ActuatorFault::GpioWriteFailed);
        }
        self.state[actuator as usize] = energized;
        Ok(())
    }
}

// ── FlakyJournal ──────────────────────────────────────────────

/// In-memory journal whose next `fail_appends` writes fail.
#[derive(Default)]
pub struct FlakyJournal {
    pub inner: MemoryJournal,
    pub fail_appends: u32,
    pub fail_finalize: u32,
    pub attempts: u32,
}

#[allow(dead_code)]
impl FlakyJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(&self, report: ReportId) -> Vec<SampleRecord> {
        self.inner.steps(report).cloned().collect()
    }
}

impl PersistencePort for FlakyJournal {
    fn append_step(&mut self, report: ReportId, record: &SampleRecord) -> Result<(), PersistenceError> {
        self.attempts += 1;
        if self.fail_appends > 0 {
            self.fail_appends -= 1;
            return Err(PersistenceError::IoError);
        }
        self.inner.append_step(report, record)
    }

    fn finalize_report(&mut self, report: ReportId, end_timestamp_ms: u64) -> Result<(), PersistenceError> {
        if self.fail_finalize > 0 {
            self.fail_finalize -= 1;
            return Err(PersistenceError::IoError);
        }
        self.inner.finalize_report(report, end_timestamp_ms)
    }
}

// ── ScriptedCommands ──────────────────────────────────────────

/// Delivers each command once the shared virtual clock reaches its time.
pub struct ScriptedCommands {
    clock: SimulatedClock,
    script: Vec<(Duration, KilnCommand)>,
}

#[allow(dead_code)]
impl ScriptedCommands {
    pub fn new(clock: &SimulatedClock, script: &[(u64, KilnCommand)]) -> Self {
        Self {
            clock: clock.clone(),
            script: script
                .iter()
                .map(|(secs, cmd)| (Duration::from_secs(*secs), *cmd))
                .collect(),
        }
    }

    pub fn none(clock: &SimulatedClock) -> Self {
        Self::new(clock, &[])
    }
}

impl CommandPort for ScriptedCommands {
    fn try_next(&mut self) -> Option<KilnCommand> {
        let now = self.clock.now();
        let due = self.script.first().is_some_and(|(at, _)| *at <= now);
        due.then(|| self.script.remove(0).1)
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<KilnEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> Vec<SampleRecord> {
        self.events
            .iter()
            .filter_map(|e| match e {
                KilnEvent::Sample(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn counters(&self) -> Vec<u32> {
        self.samples().iter().map(|s| s.consecutive_successes).collect()
    }

    pub fn timestamps(&self) -> Vec<u64> {
        self.samples().iter().map(|s| s.timestamp_ms).collect()
    }

    /// `(energized, at_secs)` for every toggle of `id`.
    pub fn toggles(&self, id: ActuatorId) -> Vec<(bool, u64)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                KilnEvent::RelayToggled {
                    actuator,
                    energized,
                    at_secs,
                } if *actuator == id => Some((*energized, *at_secs)),
                _ => None,
            })
            .collect()
    }

    pub fn warnings(&self) -> Vec<Warning> {
        self.events
            .iter()
            .filter_map(|e| match e {
                KilnEvent::Warning(w) => Some(*w),
                _ => None,
            })
            .collect()
    }

    pub fn phases(&self) -> Vec<(ProcessPhase, ProcessPhase)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                KilnEvent::PhaseChanged { from, to } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }

    pub fn finished(&self) -> Option<(Outcome, RunSummary)> {
        match self.events.last() {
            Some(KilnEvent::Finished { outcome, summary }) => Some((*outcome, summary.clone())),
            _ => None,
        }
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &KilnEvent) {
        self.events.push(event.clone());
    }
}

// ── Harness ───────────────────────────────────────────────────

pub type TestLoop<A> = ControlLoop<A, RecordingActuators, FlakyJournal, SimulatedClock>;

/// Build a loop over `acquisition` with recording mocks and a fresh
/// virtual clock anchored at [`START_MS`].
pub fn make_loop<A: AcquisitionPort>(config: KilnConfig, acquisition: A) -> (TestLoop<A>, SimulatedClock) {
    make_loop_with(config, acquisition, RecordingActuators::new(), FlakyJournal::new())
}

pub fn make_loop_with<A: AcquisitionPort>(
    config: KilnConfig,
    acquisition: A,
    actuators: RecordingActuators,
    persistence: FlakyJournal,
) -> (TestLoop<A>, SimulatedClock) {
    let clock = SimulatedClock::new(START_MS);
    let control = make_loop_on(config, acquisition, actuators, persistence, &clock);
    (control, clock)
}

/// Build a loop on a caller-supplied clock.
pub fn make_loop_on<A: AcquisitionPort>(
    config: KilnConfig,
    acquisition: A,
    actuators: RecordingActuators,
    persistence: FlakyJournal,
    clock: &SimulatedClock,
) -> TestLoop<A> {
    let ports = Ports {
        acquisition,
        actuators,
        persistence,
        clock: clock.clone(),
    };
    ControlLoop::new(config, ReportId(1), ports).expect("valid config")
}
