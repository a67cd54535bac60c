//! Run configuration.
//!
//! All tunable parameters for a heat-treatment run. A `KilnConfig` is an
//! immutable value handed to the control loop at start; editing settings
//! produces a new value for the next run and never touches a running one.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sensors::{AMBIENT_PRIMARY, AMBIENT_SECONDARY, CHANNEL_COUNT, ChannelMask, PROBE_COUNT};

/// Success criterion applied to each sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// The slowest probe subset alone must reach the target.
    #[default]
    Simple,
    /// Validation mode: every probe, ordering and inter-batch delta checks.
    Strict,
}

/// Core run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KilnConfig {
    // --- Certification target ---
    /// Core temperature every judged probe must reach (°C)
    pub target_temp_c: f32,
    /// Consecutive successful samples needed to certify the batch
    pub target_success_count: u32,
    /// Seconds between samples
    pub sampling_period_secs: u32,

    // --- Duty cycles ---
    pub fan_work_minutes: u32,
    pub fan_rest_minutes: u32,
    pub heater_work_minutes: u32,
    pub heater_rest_minutes: u32,

    // --- Thermostat ---
    /// Mean ambient at or above which heating is vetoed (°C)
    pub ambient_high_c: f32,
    /// Mean ambient at or below which heating is allowed again (°C)
    pub ambient_low_c: f32,

    // --- Channels ---
    /// Enable flags for probes 1..=13 followed by ambient 1 and 2
    pub channel_enabled: ChannelMask,
    /// 1-based probe ids that heat slowest (Simple mode judges these)
    pub slowest_probes: heapless::Vec<u8, PROBE_COUNT>,

    // --- Validation mode ---
    pub strictness: Strictness,
    /// Largest per-channel change between consecutive samples (°C)
    pub max_inter_batch_delta_c: f32,
}

impl Default for KilnConfig {
    fn default() -> Self {
        let mut slowest = heapless::Vec::new();
        for id in [1u8, 9, 11, 13] {
            let _ = slowest.push(id);
        }
        Self {
            target_temp_c: 56.0,
            target_success_count: 35,
            sampling_period_secs: 60,

            fan_work_minutes: 1,
            fan_rest_minutes: 1,
            heater_work_minutes: 1,
            heater_rest_minutes: 1,

            ambient_high_c: 90.0,
            ambient_low_c: 80.0,

            channel_enabled: [true; CHANNEL_COUNT],
            slowest_probes: slowest,

            strictness: Strictness::Simple,
            max_inter_batch_delta_c: 1.0,
        }
    }
}

impl KilnConfig {
    /// Reject values that would make a run meaningless or unsafe.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.target_temp_c.is_finite() || self.target_temp_c <= 0.0 {
            return Err(ConfigError::ValidationFailed(
                "target_temp_c must be a positive temperature",
            ));
        }
        if self.target_success_count == 0 {
            return Err(ConfigError::ValidationFailed(
                "target_success_count must be at least 1",
            ));
        }
        if self.sampling_period_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "sampling_period_secs must be positive",
            ));
        }
        if self.fan_work_minutes == 0
            || self.fan_rest_minutes == 0
            || self.heater_work_minutes == 0
            || self.heater_rest_minutes == 0
        {
            return Err(ConfigError::ValidationFailed(
                "relay work/rest durations must be positive",
            ));
        }
        if !(self.ambient_high_c.is_finite() && self.ambient_low_c.is_finite()) {
            return Err(ConfigError::ValidationFailed(
                "ambient setpoints must be finite",
            ));
        }
        if self.ambient_high_c <= self.ambient_low_c {
            return Err(ConfigError::ValidationFailed(
                "ambient_high_c must be above ambient_low_c",
            ));
        }
        if !self.channel_enabled[..PROBE_COUNT].iter().any(|on| *on) {
            return Err(ConfigError::ValidationFailed(
                "at least one core probe must be enabled",
            ));
        }
        if self.slowest_probes.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "slowest_probes must name at least one probe",
            ));
        }
        if self
            .slowest_probes
            .iter()
            .any(|id| *id == 0 || *id as usize > PROBE_COUNT)
        {
            return Err(ConfigError::ValidationFailed(
                "slowest_probes ids must be within 1..=13",
            ));
        }
        if self.strictness == Strictness::Strict
            && !(self.max_inter_batch_delta_c.is_finite() && self.max_inter_batch_delta_c > 0.0)
        {
            return Err(ConfigError::ValidationFailed(
                "max_inter_batch_delta_c must be positive in strict mode",
            ));
        }
        if self.strictness == Strictness::Strict
            && !(self.channel_enabled[AMBIENT_PRIMARY] || self.channel_enabled[AMBIENT_SECONDARY])
        {
            return Err(ConfigError::ValidationFailed(
                "strict mode needs an enabled ambient sensor",
            ));
        }
        Ok(())
    }

    pub fn sampling_period(&self) -> Duration {
        Duration::from_secs(u64::from(self.sampling_period_secs))
    }

    pub fn fan_work(&self) -> Duration {
        minutes(self.fan_work_minutes)
    }

    pub fn fan_rest(&self) -> Duration {
        minutes(self.fan_rest_minutes)
    }

    pub fn heater_work(&self) -> Duration {
        minutes(self.heater_work_minutes)
    }

    pub fn heater_rest(&self) -> Duration {
        minutes(self.heater_rest_minutes)
    }
}

fn minutes(m: u32) -> Duration {
    Duration::from_secs(u64::from(m) * 60)
}
