//! Run diagnostics.
//!
//! [`RunMetrics`] counts what happened during one run: ticks, successes,
//! broken streaks, relay activity and every kind of recovered fault.  The
//! control loop owns one instance and hands a copy out in the `Finished`
//! event summary.

use core::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Committed ticks (one per sample record).
    pub ticks: u32,
    /// Samples that passed the success criteria.
    pub successes: u32,
    /// Success streaks broken by a failing sample.
    pub counter_resets: u32,
    pub relay_toggles: u32,
    /// Failed relay writes, including failed retries.
    pub actuator_faults: u32,
    pub acquisition_errors: u32,
    /// Channels repaired from the previous sample.
    pub carried_channels: u32,
    pub persistence_warnings: u32,
    /// Total time spent paused, in milliseconds.
    pub paused_ms: u64,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_paused(&mut self, d: Duration) {
        self.paused_ms = self.paused_ms.saturating_add(d.as_millis() as u64);
    }

    /// Fraction of committed samples that counted as successes.
    pub fn success_ratio(&self) -> f32 {
        if self.ticks == 0 {
            0.0
        } else {
            self.successes as f32 / self.ticks as f32
        }
    }

    /// Compact JSON for the end-of-run console summary.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

impl core::fmt::Display for RunMetrics {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "ticks={} successes={} resets={} toggles={} actuator_faults={} \
             acq_errors={} carried={} persist_warnings={} paused={}s",
            self.ticks,
            self.successes,
            self.counter_resets,
            self.relay_toggles,
            self.actuator_faults,
            self.acquisition_errors,
            self.carried_channels,
            self.persistence_warnings,
            self.paused_ms / 1000,
        )
    }
}

// ───────────────────────────────────────────────────────────────
// Panic hook
// ───────────────────────────────────────────────────────────────

/// Install a panic hook that routes the panic message through `log`
/// before the default handler runs.
pub fn install_panic_handler() {
    let default = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let reason = if let Some(msg) = info.payload().downcast_ref::<&str>() {
            *msg
        } else if let Some(msg) = info.payload().downcast_ref::<String>() {
            msg.as_str()
        } else {
            "unknown panic"
        };
        let thread = std::thread::current();
        log::error!(
            "PANIC in thread '{}': {}",
            thread.name().unwrap_or("<unnamed>"),
            reason
        );
        default(info);
    }));
}
