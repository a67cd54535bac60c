//! Kiln controller: host entry point.
//!
//! Hexagonal architecture with one control worker and async event
//! subscribers.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  AcquisitionBackend  ActuatorBackend  JournalBackend  Clock    │
//! │  (ADC / simulator)   (relays / sim)   (file / memory)          │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │      ControlLoop (worker thread "kiln-control")        │    │
//! │  │  Monitor · Relays · Thermostat · Guard                 │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │          │ KilnEvent (PubSub)           ▲ KilnCommand          │
//! │          ▼                              │                      │
//! │  LocalExecutor: log task, summary task  stdin reader thread    │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use embassy_sync::pubsub::WaitResult;
use log::{info, warn};

use kiln::adapters::config_file::JsonConfigFile;
use kiln::adapters::hardware::{AcquisitionBackend, ActuatorBackend, SimulatedRelays};
use kiln::adapters::journal::{FileJournal, JournalBackend, MemoryJournal};
use kiln::adapters::log_sink::LogEventSink;
use kiln::adapters::time::{ClockBackend, SimulatedClock, SystemClock};
use kiln::app::commands::KilnCommand;
use kiln::app::events::{KilnEvent, Outcome, RunSummary};
use kiln::app::ports::{ConfigPort, EventSink};
use kiln::app::service::Ports;
use kiln::config::KilnConfig;
use kiln::diagnostics;
use kiln::runtime::{self, Commander, EventSubscriber, KilnBus};
use kiln::sensors::simulated::SimulatedAcquisition;
use kiln::thermal::{Noise, ThermalModel};

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Heat-treatment kiln controller (simulated backends)")]
#[command(version)]
struct Cli {
    /// JSON configuration file (defaults when absent)
    config: Option<PathBuf>,

    /// Run on virtual time; samples are taken back to back
    #[arg(long)]
    accelerated: bool,

    /// With --accelerated, also pace in real time N times faster
    #[arg(long, value_name = "N")]
    speedup: Option<u32>,

    /// Seed for the thermal simulator noise
    #[arg(long)]
    seed: Option<u64>,

    /// Initial ambient temperature of the simulated kiln (°C)
    #[arg(long, default_value_t = 20.0)]
    ambient: f32,

    /// Step journal file (in-memory when absent)
    #[arg(long, value_name = "PATH")]
    journal: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_logging()?;
    diagnostics::install_panic_handler();
    let cli = Cli::parse();

    info!("Kiln controller v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Configuration ──────────────────────────────────────
    let config = match &cli.config {
        Some(path) => JsonConfigFile::new(path)
            .load()
            .with_context(|| format!("loading {}", path.display()))?,
        None => KilnConfig::default(),
    };

    // ── 2. Adapters ───────────────────────────────────────────
    let journal = match &cli.journal {
        Some(path) => JournalBackend::File(
            FileJournal::open(path).with_context(|| format!("opening {}", path.display()))?,
        ),
        None => JournalBackend::Memory(MemoryJournal::new()),
    };
    let report = journal.next_report_id();

    let noise = match cli.seed {
        Some(seed) => Noise::seeded(seed),
        None => Noise::from_entropy(),
    };
    let acquisition =
        AcquisitionBackend::Simulated(SimulatedAcquisition::new(ThermalModel::new(cli.ambient, noise)));
    let actuators = ActuatorBackend::Simulated(SimulatedRelays::new());

    let clock = if cli.accelerated {
        let sim = SimulatedClock::from_now().with_real_pauses();
        ClockBackend::Simulated(match cli.speedup {
            Some(n) => sim.paced(n),
            None => sim,
        })
    } else {
        ClockBackend::System(SystemClock::new())
    };
    info!(
        "Backends: acquisition={}, actuators={}, clock={}",
        acquisition.kind(),
        actuators.kind(),
        if cli.accelerated { "virtual" } else { "system" }
    );

    // ── 3. Subscribers, then the worker ───────────────────────
    let bus = KilnBus::new();
    let log_sub = bus.subscribe().ok_or_else(|| anyhow!("event bus full"))?;
    let summary_sub = bus.subscribe().ok_or_else(|| anyhow!("event bus full"))?;

    let handle = runtime::start(
        config,
        report,
        Ports {
            acquisition,
            actuators,
            persistence: journal,
            clock,
        },
        &bus,
    )?;
    spawn_stdin_reader(handle.commander())?;

    let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();
    let log_task = executor.spawn(log_events(log_sub));
    let finished = futures_lite::future::block_on(executor.run(async {
        let finished = await_finished(summary_sub).await;
        log_task.await;
        finished
    }));

    let outcome = handle.join()?;
    if let Some((_, summary)) = finished {
        print_summary(outcome, &summary);
    }
    match outcome {
        Outcome::Failed(reason) => Err(anyhow!("run failed: {}", reason)),
        Outcome::Completed(_) | Outcome::Cancelled => Ok(()),
    }
}

// ── Logging ───────────────────────────────────────────────────

/// Level filter variable, e.g. `KILN_LOG=debug` or `KILN_LOG=kiln::app=trace`.
const LOG_ENV: &str = "KILN_LOG";

/// Route `log` records through a `tracing` fmt subscriber on stderr.
fn init_logging() -> Result<()> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| anyhow!(e).context("installing logger"))
}

// ── Subscriber tasks ──────────────────────────────────────────

async fn log_events(mut sub: EventSubscriber<'_>) {
    let mut sink = LogEventSink::new();
    loop {
        match sub.next_message().await {
            WaitResult::Lagged(n) => warn!("Event log lagged; {} events skipped", n),
            WaitResult::Message(event) => {
                sink.emit(&event);
                if matches!(event, KilnEvent::Finished { .. }) {
                    return;
                }
            }
        }
    }
}

async fn await_finished(mut sub: EventSubscriber<'_>) -> Option<(Outcome, RunSummary)> {
    loop {
        if let KilnEvent::Finished { outcome, summary } = sub.next_message_pure().await {
            return Some((outcome, summary));
        }
    }
}

// ── Operator input ────────────────────────────────────────────

fn spawn_stdin_reader(commander: Commander) -> Result<()> {
    std::thread::Builder::new()
        .name("kiln-stdin".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match KilnCommand::parse(&line) {
                    Some(cmd) => {
                        info!("Operator: {:?}", cmd);
                        commander.send(cmd);
                    }
                    None => warn!("Unknown command '{}' (p = pause, r = resume, c = cancel)", line.trim()),
                }
            }
        })
        .context("spawning stdin reader")?;
    Ok(())
}

fn print_summary(outcome: Outcome, summary: &RunSummary) {
    println!("Run {}: {}", summary.report, outcome);
    println!("  samples:      {}", summary.samples);
    println!("  start:        {} ms", summary.start_timestamp_ms);
    println!("  end:          {} ms", summary.end_timestamp_ms);
    println!("  final streak: {}", summary.consecutive_successes);
    println!("  metrics:      {}", summary.metrics.to_json());
}
