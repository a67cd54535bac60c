//! Control loop: the hexagonal core.
//!
//! [`ControlLoop`] owns the process monitor, relay scheduler, thermostat
//! and actuator guard for one run.  All I/O flows through port traits
//! injected at construction, making the whole loop testable with mock
//! adapters and a simulated clock.
//!
//! ```text
//!  AcquisitionPort ──▶ ┌─────────────────────────────┐ ──▶ EventSink
//!  CommandPort ──────▶ │         ControlLoop         │ ──▶ PersistencePort
//!  ActuatorPort ◀───── │ Monitor · Relays · Thermo   │ ◀── Clock
//!                      └─────────────────────────────┘
//! ```
//!
//! ## Tick
//!
//! 1. drain commands; while paused, wait without advancing logical time
//! 2. on cancellation, drive actuators safe and finish
//! 3. acquire one reading and repair it (carry-forward)
//! 4. advance relays, thermostat and the heating feed
//! 5. judge the sample, persist it, publish it
//! 6. sleep until the next deadline
//!
//! Logical time for tick `k` (1-based) is `(k - 1) × period`; the record
//! timestamp adds the run's wall-clock start and every paused interval.

use core::time::Duration;

use log::{debug, info, warn};

use crate::config::KilnConfig;
use crate::control::monitor::{ProcessMonitor, Verdict};
use crate::control::thermostat::Thermostat;
use crate::diagnostics::RunMetrics;
use crate::error::{ConfigError, PersistenceError};
use crate::fsm::ProcessPhase;
use crate::safety::ActuatorGuard;
use crate::scheduler::{ActuatorId, RelayScheduler};
use crate::sensors::{CarryForward, ChannelMask, Reading, empty_reading, mean_ambient};

use super::commands::KilnCommand;
use super::events::{KilnEvent, Outcome, ReportId, RunSummary, SampleRecord, Warning};
use super::ports::{AcquisitionPort, ActuatorPort, Clock, CommandPort, EventSink, PersistencePort};

/// Poll interval while paused.
pub const PAUSE_POLL: Duration = Duration::from_millis(500);

// ───────────────────────────────────────────────────────────────
// Ports bundle
// ───────────────────────────────────────────────────────────────

/// The driven adapters one run needs.
pub struct Ports<A, R, P, C> {
    pub acquisition: A,
    pub actuators: R,
    pub persistence: P,
    pub clock: C,
}

// ───────────────────────────────────────────────────────────────
// ControlLoop
// ───────────────────────────────────────────────────────────────

pub struct ControlLoop<A, R, P, C> {
    config: KilnConfig,
    mask: ChannelMask,
    report: ReportId,

    acquisition: A,
    actuators: R,
    persistence: P,
    clock: C,

    monitor: ProcessMonitor,
    relays: RelayScheduler,
    thermostat: Thermostat,
    guard: ActuatorGuard,
    carry: CarryForward,
    metrics: RunMetrics,

    /// Committed ticks so far.
    sequence: u32,
    start_ms: u64,
    /// Monotonic time at `begin`.
    origin: Duration,
    paused_total: Duration,
    paused_since: Option<Duration>,
    cancel_requested: bool,
    last_timestamp_ms: Option<u64>,
}

impl<A, R, P, C> ControlLoop<A, R, P, C>
where
    A: AcquisitionPort,
    R: ActuatorPort,
    P: PersistencePort,
    C: Clock,
{
    /// Validate `config` and build a loop for `report`.  An invalid
    /// configuration never reaches the hardware.
    pub fn new(config: KilnConfig, report: ReportId, ports: Ports<A, R, P, C>) -> Result<Self, ConfigError> {
        config.validate()?;
        let Ports {
            acquisition,
            actuators,
            persistence,
            clock,
        } = ports;
        let origin = clock.monotonic();
        Ok(Self {
            mask: config.channel_enabled,
            report,
            monitor: ProcessMonitor::new(&config),
            relays: RelayScheduler::new(&config, Duration::ZERO),
            thermostat: Thermostat::new(config.ambient_high_c, config.ambient_low_c),
            guard: ActuatorGuard::new(),
            carry: CarryForward::new(),
            metrics: RunMetrics::new(),
            sequence: 0,
            start_ms: clock.wall_start_ms(),
            origin,
            paused_total: Duration::ZERO,
            paused_since: None,
            cancel_requested: false,
            last_timestamp_ms: None,
            config,
            acquisition,
            actuators,
            persistence,
            clock,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Run until the process completes, is cancelled or fails.
    pub fn run(&mut self, commands: &mut impl CommandPort, sink: &mut impl EventSink) -> Outcome {
        self.begin(sink);
        loop {
            if let Some(outcome) = self.tick(commands, sink) {
                return outcome;
            }
        }
    }

    /// Start the run: energize both relays and move to `Running`.
    pub fn begin(&mut self, sink: &mut impl EventSink) {
        self.origin = self.clock.monotonic();
        info!(
            "Run {} starting: target {:.1}°C x{} samples, period {}s, {:?} mode",
            self.report,
            self.config.target_temp_c,
            self.config.target_success_count,
            self.config.sampling_period_secs,
            self.config.strictness,
        );
        sink.emit(&KilnEvent::Started {
            report: self.report,
            start_timestamp_ms: self.start_ms,
        });

        for id in ActuatorId::ALL {
            self.drive(id, self.relays.is_energized(id), sink);
        }
        if let Ok(from) = self.monitor.start() {
            sink.emit(&KilnEvent::PhaseChanged {
                from,
                to: ProcessPhase::Running,
            });
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// One control cycle.  Returns the outcome once the run has ended.
    pub fn tick(
        &mut self,
        commands: &mut impl CommandPort,
        sink: &mut impl EventSink,
    ) -> Option<Outcome> {
        if self.monitor.phase().is_terminal() {
            return None;
        }

        // 1. Commands, then pause-wait.
        self.drain_commands(commands, sink);
        while self.paused_since.is_some() && !self.cancel_requested {
            self.clock.pause_wait(PAUSE_POLL);
            self.drain_commands(commands, sink);
        }

        // 2. Cancellation.
        if self.cancel_requested {
            return Some(self.finish(Outcome::Cancelled, sink));
        }

        // 3. Acquire and repair.
        self.sequence += 1;
        let elapsed = self.config.sampling_period() * (self.sequence - 1);
        let timestamp_ms = self.start_ms + duration_ms(elapsed + self.paused_total);

        let (mut reading, acquired) = match self.acquisition.read_cycle(&self.mask) {
            Ok(r) => (r, true),
            Err(e) => {
                warn!("Tick {}: acquisition failed: {}", self.sequence, e);
                self.metrics.acquisition_errors += 1;
                sink.emit(&KilnEvent::Warning(Warning::AcquisitionFailed(e)));
                (empty_reading(), false)
            }
        };
        let previous = self.carry.previous().copied();
        let carried = self.carry.apply(&mut reading, &self.mask);
        self.metrics.carried_channels += carried;

        // 4. Relays, thermostat, heating feed.
        self.advance_actuators(elapsed, &reading, sink);

        // 5. Judge, persist, publish.
        let phase_before = self.monitor.phase();
        let verdict = if !acquired && previous.is_none() {
            self.monitor.miss()
        } else {
            self.monitor.observe(&reading, previous.as_ref(), &self.mask)
        };
        self.count_verdict(verdict);

        let record = SampleRecord::from_reading(
            self.sequence,
            timestamp_ms,
            &reading,
            self.monitor.consecutive(),
            self.monitor.remaining(),
        );
        debug_assert!(self.last_timestamp_ms.is_none_or(|t| t < timestamp_ms));
        self.last_timestamp_ms = Some(timestamp_ms);
        self.metrics.ticks += 1;
        debug!(
            "Tick {} t={}ms streak={} remaining={}",
            record.sequence, record.timestamp_ms, record.consecutive_successes, record.successes_remaining
        );

        self.persist_step(&record, sink);
        sink.emit(&KilnEvent::Sample(record));

        let phase_after = self.monitor.phase();
        if phase_after != phase_before {
            sink.emit(&KilnEvent::PhaseChanged {
                from: phase_before,
                to: phase_after,
            });
        }

        match verdict {
            Verdict::Completed => return Some(self.finish(Outcome::Completed(self.report), sink)),
            Verdict::Failed(_) => {
                let reason = self.monitor.failure_reason().unwrap_or("configuration error");
                return Some(self.finish(Outcome::Failed(reason), sink));
            }
            _ => {}
        }

        // 6. Sleep to the next deadline.
        self.sleep_until_next_tick();
        None
    }

    /// End the run as failed from outside the tick, e.g. after a panic in
    /// an adapter.  Actuators are driven safe before `Finished` is emitted.
    pub fn abort(&mut self, reason: &'static str, sink: &mut impl EventSink) -> Outcome {
        if let Ok(from) = self.monitor.fail(reason) {
            sink.emit(&KilnEvent::PhaseChanged {
                from,
                to: ProcessPhase::Failed,
            });
        }
        self.finish(Outcome::Failed(reason), sink)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn phase(&self) -> ProcessPhase {
        self.monitor.phase()
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    pub fn report(&self) -> ReportId {
        self.report
    }

    pub fn config(&self) -> &KilnConfig {
        &self.config
    }

    pub fn actuators(&self) -> &R {
        &self.actuators
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub fn acquisition(&self) -> &A {
        &self.acquisition
    }

    /// Pending actuator write failures (see [`ActuatorId::mask`]).
    pub fn pending_actuator_faults(&self) -> u8 {
        self.guard.pending()
    }

    // ── Internal ──────────────────────────────────────────────

    fn drain_commands(&mut self, commands: &mut impl CommandPort, sink: &mut impl EventSink) {
        while let Some(cmd) = commands.try_next() {
            self.handle_command(cmd, sink);
        }
    }

    fn handle_command(&mut self, cmd: KilnCommand, sink: &mut impl EventSink) {
        match cmd {
            KilnCommand::Pause => {
                if let Ok(from) = self.monitor.pause() {
                    info!("Run paused after tick {}", self.sequence);
                    self.paused_since = Some(self.clock.monotonic());
                    sink.emit(&KilnEvent::PhaseChanged {
                        from,
                        to: ProcessPhase::Paused,
                    });
                }
            }
            KilnCommand::Resume => {
                let Some(since) = self.paused_since else {
                    debug!("Resume ignored: not paused");
                    return;
                };
                if let Ok(from) = self.monitor.resume() {
                    let paused = self.clock.monotonic().saturating_sub(since);
                    self.paused_total += paused;
                    self.metrics.add_paused(paused);
                    self.paused_since = None;
                    info!("Run resumed after {}s paused", paused.as_secs());
                    sink.emit(&KilnEvent::PhaseChanged {
                        from,
                        to: ProcessPhase::Running,
                    });
                }
            }
            KilnCommand::Cancel => {
                info!("Cancellation requested");
                self.cancel_requested = true;
            }
        }
    }

    fn advance_actuators(&mut self, elapsed: Duration, reading: &Reading, sink: &mut impl EventSink) {
        let failed = self.guard.retry_pending(&mut self.actuators);
        if failed > 0 {
            debug!("{} actuator retries failed", failed);
        }

        for toggle in self.relays.advance(elapsed) {
            self.metrics.relay_toggles += 1;
            sink.emit(&KilnEvent::RelayToggled {
                actuator: toggle.actuator,
                energized: toggle.energized,
                at_secs: toggle.at.as_secs(),
            });
        }

        let allowed = self.thermostat.update(mean_ambient(reading));
        let heating = self.relays.is_energized(ActuatorId::Heater) && allowed;
        self.drive(ActuatorId::Fan, self.relays.is_energized(ActuatorId::Fan), sink);
        self.drive(ActuatorId::Heater, heating, sink);
        self.acquisition.apply_heating(heating);
    }

    /// Command a relay when its desired state changes.
    fn drive(&mut self, id: ActuatorId, energized: bool, sink: &mut impl EventSink) {
        let first = self.sequence == 0;
        if !first && self.guard.desired(id) == energized {
            return;
        }
        if let Err(fault) = self.guard.command(&mut self.actuators, id, energized) {
            sink.emit(&KilnEvent::Warning(Warning::ActuatorFault {
                actuator: id,
                fault,
            }));
        }
    }

    fn count_verdict(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Success { .. } | Verdict::Completed => self.metrics.successes += 1,
            Verdict::Reset(rejection) => {
                debug!("Tick {} rejected: {}", self.sequence, rejection);
            }
            Verdict::Failed(_) | Verdict::Ignored => {}
        }
        self.metrics.counter_resets = self.monitor.resets();
    }

    fn persist_step(&mut self, record: &SampleRecord, sink: &mut impl EventSink) {
        let report = self.report;
        if let Err(error) = retry_once(|| self.persistence.append_step(report, record)) {
            warn!("Step {} not persisted: {}", record.sequence, error);
            self.metrics.persistence_warnings += 1;
            sink.emit(&KilnEvent::Warning(Warning::StepNotPersisted {
                sequence: record.sequence,
                error,
            }));
        }
    }

    fn finish(&mut self, outcome: Outcome, sink: &mut impl EventSink) -> Outcome {
        let elapsed = self.config.sampling_period() * self.sequence.saturating_sub(1);

        // Actuators safe before anything is reported.
        self.guard.force_safe(&mut self.actuators);
        self.relays.force_off(elapsed);
        self.acquisition.enter_cooldown();

        if outcome == Outcome::Cancelled {
            if let Ok(from) = self.monitor.cancel() {
                sink.emit(&KilnEvent::PhaseChanged {
                    from,
                    to: ProcessPhase::Cancelled,
                });
            }
        }

        let end_timestamp_ms = self.last_timestamp_ms.unwrap_or(self.start_ms);
        if let Outcome::Completed(report) = outcome {
            if let Err(e) = retry_once(|| self.persistence.finalize_report(report, end_timestamp_ms)) {
                warn!("Report {} not finalized: {}", report, e);
                self.metrics.persistence_warnings += 1;
                sink.emit(&KilnEvent::Warning(Warning::ReportNotFinalized(e)));
            }
        }

        self.metrics.actuator_faults = self.guard.fault_count();
        info!("Run {} finished: {} ({})", self.report, outcome, self.metrics);
        let summary = RunSummary {
            report: self.report,
            samples: self.sequence,
            start_timestamp_ms: self.start_ms,
            end_timestamp_ms,
            consecutive_successes: self.monitor.consecutive(),
            metrics: self.metrics.clone(),
        };
        sink.emit(&KilnEvent::Finished { outcome, summary });
        outcome
    }

    fn sleep_until_next_tick(&mut self) {
        let deadline =
            self.origin + self.config.sampling_period() * self.sequence + self.paused_total;
        let now = self.clock.monotonic();
        if deadline > now {
            self.clock.sleep(deadline - now);
        } else {
            warn!(
                "Tick {} overran its period by {}ms",
                self.sequence,
                duration_ms(now - deadline)
            );
        }
    }
}

fn retry_once<F>(mut op: F) -> Result<(), PersistenceError>
where
    F: FnMut() -> Result<(), PersistenceError>,
{
    op().or_else(|e| {
        debug!("Persistence error ({}), retrying once", e);
        op()
    })
}

fn duration_ms(d: Duration) -> u64 {
    d.as_millis() as u64
}
