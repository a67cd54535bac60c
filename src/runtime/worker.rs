//! Control worker: runs one [`ControlLoop`] on a dedicated thread.
//!
//! `start` validates the configuration and builds the loop on the caller's
//! thread, so an invalid configuration is reported before any thread or
//! actuator is touched.  The worker then owns every adapter for the life of
//! the run; the caller keeps a [`KilnHandle`] for commands and the join.
//!
//! A panic inside the loop still ends the event stream: the worker aborts
//! the run (actuators safe, `Finished(Failed)`) before re-raising it.

use std::panic::{self, AssertUnwindSafe};
use std::thread::JoinHandle;

use log::{error, info};

use crate::app::events::{KilnEvent, Outcome, ReportId, RunSummary};
use crate::app::ports::{AcquisitionPort, ActuatorPort, Clock, EventSink, PersistencePort};
use crate::app::service::{ControlLoop, Ports};
use crate::config::KilnConfig;
use crate::diagnostics::RunMetrics;
use crate::error::{Error, Result};

use super::channels::{Commander, KilnBus};

/// Thread name of the control worker.
pub const CONTROL_THREAD: &str = "kiln-control";
const CONTROL_STACK_KB: usize = 64;
/// Failure reason reported when the control loop panics.
pub const WORKER_PANICKED: &str = "control worker panicked";

pub struct KilnHandle {
    report: ReportId,
    commander: Commander,
    thread: JoinHandle<Outcome>,
}

impl KilnHandle {
    pub fn report(&self) -> ReportId {
        self.report
    }

    /// A cloneable sender for other threads (stdin reader, UI).
    pub fn commander(&self) -> Commander {
        self.commander.clone()
    }

    pub fn pause(&self) -> bool {
        self.commander.pause()
    }

    pub fn resume(&self) -> bool {
        self.commander.resume()
    }

    pub fn cancel(&self) -> bool {
        self.commander.cancel()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the run to end.
    pub fn join(self) -> Result<Outcome> {
        self.thread.join().map_err(|_| {
            error!("Control worker for run {} panicked", self.report);
            Error::WorkerPanicked
        })
    }
}

/// Start a run of `config` as `report` on its own thread.
pub fn start<A, R, P, C>(
    config: KilnConfig,
    report: ReportId,
    ports: Ports<A, R, P, C>,
    bus: &KilnBus,
) -> Result<KilnHandle>
where
    A: AcquisitionPort + Send + 'static,
    R: ActuatorPort + Send + 'static,
    P: PersistencePort + Send + 'static,
    C: Clock + Send + 'static,
{
    let mut control = ControlLoop::new(config, report, ports)?;
    let mut commands = bus.command_receiver();
    let mut sink = bus.event_sink();

    let thread = std::thread::Builder::new()
        .name(CONTROL_THREAD.into())
        .stack_size(CONTROL_STACK_KB * 1024)
        .spawn(move || {
            let run = panic::catch_unwind(AssertUnwindSafe(|| control.run(&mut commands, &mut sink)));
            match run {
                Ok(outcome) => outcome,
                Err(payload) => {
                    error!("Run {} aborted by a panic in the control loop", report);
                    let aborted =
                        panic::catch_unwind(AssertUnwindSafe(|| control.abort(WORKER_PANICKED, &mut sink)));
                    if aborted.is_err() {
                        sink.emit(&KilnEvent::Finished {
                            outcome: Outcome::Failed(WORKER_PANICKED),
                            summary: RunSummary {
                                report,
                                samples: 0,
                                start_timestamp_ms: 0,
                                end_timestamp_ms: 0,
                                consecutive_successes: 0,
                                metrics: RunMetrics::default(),
                            },
                        });
                    }
                    panic::resume_unwind(payload)
                }
            }
        })
        .map_err(|e| {
            error!("Failed to spawn {}: {}", CONTROL_THREAD, e);
            Error::Spawn
        })?;
    info!("Run {} started on '{}'", report, CONTROL_THREAD);

    Ok(KilnHandle {
        report,
        commander: bus.commander(),
        thread,
    })
}
