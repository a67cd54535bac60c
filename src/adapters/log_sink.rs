//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing every kiln event as one log line.
//! The runtime bus and test recorders implement the same trait.

use log::{info, warn};

use crate::app::events::KilnEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`KilnEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &KilnEvent) {
        match event {
            KilnEvent::Started {
                report,
                start_timestamp_ms,
            } => {
                info!("START | report={} t0={}ms", report, start_timestamp_ms);
            }
            KilnEvent::Sample(s) => {
                info!(
                    "SAMPLE | #{} t={}ms | P1={:.2} P9={:.2} P11={:.2} P13={:.2} | \
                     AT1={:.2} AT2={:.2} | streak={} remaining={}",
                    s.sequence,
                    s.timestamp_ms,
                    s.probes[0],
                    s.probes[8],
                    s.probes[10],
                    s.probes[12],
                    s.ambient[0],
                    s.ambient[1],
                    s.consecutive_successes,
                    s.successes_remaining,
                );
            }
            KilnEvent::PhaseChanged { from, to } => {
                info!("PHASE | {} -> {}", from, to);
            }
            KilnEvent::RelayToggled {
                actuator,
                energized,
                at_secs,
            } => {
                info!(
                    "RELAY | {} {} at {}s",
                    actuator,
                    if *energized { "ON" } else { "OFF" },
                    at_secs
                );
            }
            KilnEvent::Warning(w) => {
                warn!("WARN | {}", w);
            }
            KilnEvent::Finished { outcome, summary } => {
                info!(
                    "FINISH | {} | samples={} | {}",
                    outcome, summary.samples, summary.metrics
                );
            }
        }
    }
}
