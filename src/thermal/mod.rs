//! Kiln thermal model.
//!
//! Simulates how kiln air and the wood core respond to the heater.  Used by
//! the simulated acquisition source and by tests; the control loop sees it
//! only through [`AcquisitionPort`](crate::app::ports::AcquisitionPort).
//!
//! ```text
//!   heating ──▶ ambient (air) ──gap──▶ probes (wood core)
//! ```
//!
//! Probes follow the mean ambient through a per-probe conduction
//! coefficient.  Below a 9 °C gap the core stops gaining heat, which keeps
//! the wood lagging the air the way a real stack does.

pub mod noise;

use crate::sensors::{
    AMBIENT_PRIMARY, AMBIENT_SECONDARY, ChannelMask, PROBE_COUNT, Reading, UNSET,
};

pub use noise::Noise;

/// Zero-based indices of the slow-heating probes (ids 1, 9, 11, 13).
pub const SLOW_PROBE_INDICES: [usize; 4] = [0, 8, 10, 12];

/// Gap below which the probe is above the air and drifts down.
const OVERSHOOT_GAP: f32 = -0.5;
/// Gap below which conduction stops.
const HOLD_GAP: f32 = 9.0;
/// Gap below which conduction is reduced.
const REDUCED_GAP: f32 = 12.0;

const OVERSHOOT_STEP: f32 = 0.05;
const HOLD_JITTER: f32 = 0.05;
const CONDUCTION_JITTER: f32 = 0.02;
const REDUCED_FACTOR: f32 = 0.25;
const REDUCED_FLOOR: f32 = 0.002;
const FULL_FLOOR: f32 = 0.008;
const COOLDOWN_FACTOR: f32 = 0.5;

const AMBIENT_BASE_RATE: f32 = 1.8;
const AMBIENT_JITTER: f32 = 1.2;
const AMBIENT_SECONDARY_JITTER: f32 = 0.5;
const AMBIENT_MIN_RISE: f32 = 0.2;
const AMBIENT_DROP: f32 = 0.8;
const AMBIENT_COOLDOWN_DROP: f32 = 2.2;

const PROBE_OUTPUT_NOISE: f32 = 0.03;
const AMBIENT_OUTPUT_NOISE: f32 = 0.05;

/// Heating or post-run cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermalMode {
    Heating,
    Cooldown,
}

/// One core probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeState {
    /// 1-based probe id.
    pub id: u8,
    pub value: f32,
    coefficient: f32,
}

impl ProbeState {
    pub fn coefficient(&self) -> f32 {
        self.coefficient
    }
}

/// The two ambient sensors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientState {
    pub primary: f32,
    pub secondary: f32,
}

impl AmbientState {
    pub fn mean(&self) -> f32 {
        (self.primary + self.secondary) * 0.5
    }
}

/// Conduction coefficient for the probe at zero-based `index`.
pub fn coefficient_for(index: usize) -> f32 {
    let i = index as f32;
    if SLOW_PROBE_INDICES.contains(&index) {
        0.0065 + i * 0.0005
    } else {
        0.0100 + i * 0.0020
    }
}

/// Heating rate of the air, scaled by the starting ambient temperature.
pub fn ambient_base_rate(initial_ambient: f32) -> f32 {
    let factor = (1.0 + (initial_ambient - 20.0) * 0.01).clamp(0.5, 1.5);
    AMBIENT_BASE_RATE * factor
}

/// Change of one probe over a cycle, given `gap = mean ambient - probe`.
pub fn probe_delta(gap: f32, coefficient: f32, mode: ThermalMode, noise: &mut Noise) -> f32 {
    if mode == ThermalMode::Cooldown {
        return gap * coefficient * COOLDOWN_FACTOR;
    }
    if gap < OVERSHOOT_GAP {
        return -OVERSHOOT_STEP;
    }
    if gap < HOLD_GAP {
        return noise.uniform(-HOLD_JITTER, HOLD_JITTER);
    }

    let conduction = coefficient * (1.0 + gap / 100.0);
    let jitter = noise.uniform(-CONDUCTION_JITTER, CONDUCTION_JITTER);
    if gap < REDUCED_GAP {
        (gap * conduction * REDUCED_FACTOR + jitter).max(REDUCED_FLOOR)
    } else {
        (gap * conduction + jitter).max(FULL_FLOOR)
    }
}

/// Simulated kiln: 13 probes and two ambient sensors.
#[derive(Debug)]
pub struct ThermalModel {
    probes: [ProbeState; PROBE_COUNT],
    ambient: AmbientState,
    base_rate: f32,
    mode: ThermalMode,
    noise: Noise,
}

impl ThermalModel {
    /// Build a kiln at `initial_ambient` with the usual start scatter
    /// (±0.2 °C on the air sensors, ±0.5 °C on the probes).
    pub fn new(initial_ambient: f32, mut noise: Noise) -> Self {
        let ambient = AmbientState {
            primary: initial_ambient + noise.uniform(-0.2, 0.2),
            secondary: initial_ambient + noise.uniform(-0.2, 0.2),
        };
        let probes = core::array::from_fn(|i| ProbeState {
            id: (i + 1) as u8,
            value: initial_ambient + noise.uniform(-0.5, 0.5),
            coefficient: coefficient_for(i),
        });
        Self {
            probes,
            ambient,
            base_rate: ambient_base_rate(initial_ambient),
            mode: ThermalMode::Heating,
            noise,
        }
    }

    /// Build from explicit state (tests, replays).
    pub fn from_state(
        probe_values: [f32; PROBE_COUNT],
        ambient: AmbientState,
        initial_ambient: f32,
        noise: Noise,
    ) -> Self {
        let probes = core::array::from_fn(|i| ProbeState {
            id: (i + 1) as u8,
            value: probe_values[i],
            coefficient: coefficient_for(i),
        });
        Self {
            probes,
            ambient,
            base_rate: ambient_base_rate(initial_ambient),
            mode: ThermalMode::Heating,
            noise,
        }
    }

    /// Advance one cycle.  `heating` is the effective heater state
    /// (relay energized and thermostat allowing).
    pub fn step(&mut self, heating: bool) {
        self.step_ambient(heating);
        let mean = self.ambient.mean();
        for probe in &mut self.probes {
            let gap = mean - probe.value;
            probe.value += probe_delta(gap, probe.coefficient, self.mode, &mut self.noise);
        }
    }

    /// Switch to cooldown; the air decays regardless of the heater.
    pub fn enter_cooldown(&mut self) {
        self.mode = ThermalMode::Cooldown;
    }

    pub fn mode(&self) -> ThermalMode {
        self.mode
    }

    /// Sample the kiln as the acquisition hardware would see it.
    pub fn observe(&mut self, mask: &ChannelMask) -> Reading {
        let mut reading = [UNSET; crate::sensors::CHANNEL_COUNT];
        for (i, probe) in self.probes.iter().enumerate() {
            if mask[i] {
                reading[i] =
                    probe.value + self.noise.uniform(-PROBE_OUTPUT_NOISE, PROBE_OUTPUT_NOISE);
            }
        }
        if mask[AMBIENT_PRIMARY] {
            reading[AMBIENT_PRIMARY] = self.ambient.primary
                + self.noise.uniform(-AMBIENT_OUTPUT_NOISE, AMBIENT_OUTPUT_NOISE);
        }
        if mask[AMBIENT_SECONDARY] {
            reading[AMBIENT_SECONDARY] = self.ambient.secondary
                + self.noise.uniform(-AMBIENT_OUTPUT_NOISE, AMBIENT_OUTPUT_NOISE);
        }
        reading
    }

    pub fn probes(&self) -> &[ProbeState; PROBE_COUNT] {
        &self.probes
    }

    pub fn ambient(&self) -> AmbientState {
        self.ambient
    }

    fn step_ambient(&mut self, heating: bool) {
        let jitter = self.noise.uniform(-AMBIENT_JITTER, AMBIENT_JITTER);
        match (self.mode, heating) {
            (ThermalMode::Cooldown, _) => {
                self.ambient.primary -= AMBIENT_COOLDOWN_DROP + jitter;
                self.ambient.secondary -= AMBIENT_COOLDOWN_DROP + jitter;
            }
            (ThermalMode::Heating, true) => {
                let rise = self.base_rate + jitter;
                let extra = self
                    .noise
                    .uniform(-AMBIENT_SECONDARY_JITTER, AMBIENT_SECONDARY_JITTER);
                self.ambient.primary += rise.max(AMBIENT_MIN_RISE);
                self.ambient.secondary += (rise + extra).max(AMBIENT_MIN_RISE);
            }
            (ThermalMode::Heating, false) => {
                let drop = AMBIENT_DROP + (jitter * 0.2).abs();
                self.ambient.primary -= drop;
                self.ambient.secondary -= drop;
            }
        }
    }
}
