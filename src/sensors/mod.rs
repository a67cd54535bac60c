//! Probe acquisition: the 15-channel reading and its sources.
//!
//! Channel layout (zero-based index into a [`Reading`]):
//!
//! ```text
//!   0 ..= 12   core probes 1..=13 (inserted into the wood)
//!   13         ambient 1 (kiln air, primary)
//!   14         ambient 2 (kiln air, secondary)
//! ```
//!
//! A channel that produced nothing reads as [`UNSET`].  The control loop
//! repairs unset and duplicate values with [`CarryForward`] before the
//! sample is judged.

pub mod adc;
pub mod simulated;

use log::debug;

/// Number of core-temperature probes.
pub const PROBE_COUNT: usize = 13;
/// Number of ambient (air) sensors.
pub const AMBIENT_COUNT: usize = 2;
/// Total logical channels in one reading.
pub const CHANNEL_COUNT: usize = PROBE_COUNT + AMBIENT_COUNT;

/// Index of the primary ambient sensor.
pub const AMBIENT_PRIMARY: usize = PROBE_COUNT;
/// Index of the secondary ambient sensor.
pub const AMBIENT_SECONDARY: usize = PROBE_COUNT + 1;

/// Sentinel for "no value on this channel".
pub const UNSET: f32 = 0.0;

/// Nudge applied to repaired channels (°C).
pub const CARRY_EPSILON: f32 = 0.01;

/// One acquisition cycle: 13 probes then 2 ambient sensors.
pub type Reading = [f32; CHANNEL_COUNT];

/// Per-channel enable flags, same layout as [`Reading`].
pub type ChannelMask = [bool; CHANNEL_COUNT];

/// True when `v` carries a real measurement.
#[inline]
pub fn is_set(v: f32) -> bool {
    v.is_finite() && v != UNSET
}

/// Mean of the set ambient channels, or `None` when neither is set.
pub fn mean_ambient(reading: &Reading) -> Option<f32> {
    let (sum, n) = reading[AMBIENT_PRIMARY..]
        .iter()
        .filter(|v| is_set(**v))
        .fold((0.0_f32, 0u8), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / f32::from(n))
}

/// Reading with every channel unset.
pub const fn empty_reading() -> Reading {
    [UNSET; CHANNEL_COUNT]
}

// ---------------------------------------------------------------------------
// Carry-forward repair
// ---------------------------------------------------------------------------

/// Repairs gaps in a reading using the previous committed one.
///
/// - enabled channel, unset value: previous value + ε
/// - enabled channel, exact repeat of the previous value: nudged by ε
/// - disabled channel: forced to [`UNSET`]
///
/// The nudge keeps every committed sample distinct from its predecessor,
/// which the strict delta and ordering checks rely on.
#[derive(Debug, Default)]
pub struct CarryForward {
    previous: Option<Reading>,
}

impl CarryForward {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repair `reading` in place and remember it for the next cycle.
    /// Returns how many channels were carried forward from a gap.
    pub fn apply(&mut self, reading: &mut Reading, mask: &ChannelMask) -> u32 {
        let mut carried = 0;
        for (ch, value) in reading.iter_mut().enumerate() {
            if !mask[ch] {
                *value = UNSET;
                continue;
            }
            let Some(prev) = self.previous.map(|p| p[ch]).filter(|p| is_set(*p)) else {
                if !is_set(*value) {
                    *value = UNSET;
                }
                continue;
            };
            if !is_set(*value) {
                *value = prev + CARRY_EPSILON;
                carried += 1;
                debug!("channel {} carried forward to {:.2}", ch, *value);
            } else if *value == prev {
                *value += CARRY_EPSILON;
            }
        }
        self.previous = Some(*reading);
        carried
    }

    /// The last committed reading, if any.
    pub fn previous(&self) -> Option<&Reading> {
        self.previous.as_ref()
    }
}
