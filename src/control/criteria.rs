//! Sample success criteria.
//!
//! Each predicate is a free function returning `Ok(())` or the
//! [`Rejection`] that failed it.  [`Criteria::evaluate`] composes them:
//!
//! | Mode   | Predicates (AND)                                            |
//! |--------|-------------------------------------------------------------|
//! | Simple | [`slowest_subset_at_target`]                                |
//! | Strict | [`all_active_at_target`], [`ambient_leads_probes`],         |
//! |        | [`within_delta`]                                            |
//!
//! Only probe channels are judged against the target.  A probe is *active*
//! when it is enabled and carries a set value.  The ambient sensors are
//! only the reference for the ordering check.

use crate::config::{KilnConfig, Strictness};
use crate::sensors::{AMBIENT_PRIMARY, AMBIENT_SECONDARY, ChannelMask, PROBE_COUNT, Reading, is_set};

/// Why a sample did not count as a success.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// No enabled probe produced a value.
    NoActiveProbes,
    /// The acquisition cycle failed and there was nothing to carry forward.
    NoReading,
    /// A judged probe (1-based id) is below target.
    BelowTarget { probe: u8, value: f32 },
    /// No enabled ambient sensor carries a value to order the probes against.
    NoAmbientReference,
    /// An active probe is at or above the coolest ambient sensor.
    OrderingViolated { probe: u8 },
    /// A probe moved more than the allowed delta since the previous batch.
    DeltaExceeded { probe: u8, delta: f32 },
}

impl core::fmt::Display for Rejection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoActiveProbes => write!(f, "no active probes"),
            Self::NoReading => write!(f, "no usable reading"),
            Self::BelowTarget { probe, value } => {
                write!(f, "probe {} below target ({:.2}°C)", probe, value)
            }
            Self::NoAmbientReference => write!(f, "no ambient reading to order against"),
            Self::OrderingViolated { probe } => {
                write!(f, "probe {} is not below the air temperature", probe)
            }
            Self::DeltaExceeded { probe, delta } => {
                write!(f, "probe {} moved {:.2}°C since last batch", probe, delta)
            }
        }
    }
}

/// Active probes as `(zero-based index, value)`, in index order.
pub fn active_probes<'a>(
    reading: &'a Reading,
    mask: &'a ChannelMask,
) -> impl Iterator<Item = (usize, f32)> + 'a {
    reading[..PROBE_COUNT]
        .iter()
        .enumerate()
        .filter(move |(i, v)| mask[*i] && is_set(**v))
        .map(|(i, v)| (i, *v))
}

fn lowest(probes: impl Iterator<Item = (usize, f32)>) -> Option<(usize, f32)> {
    probes.fold(None, |acc, (i, v)| match acc {
        Some((_, m)) if m <= v => acc,
        _ => Some((i, v)),
    })
}

fn probe_id(index: usize) -> u8 {
    (index + 1) as u8
}

/// Simple mode: the coldest active probe of the slowest subset reaches
/// `target`.  Falls back to every active probe when none of the subset is
/// active.
pub fn slowest_subset_at_target(
    reading: &Reading,
    mask: &ChannelMask,
    slowest: &[u8],
    target: f32,
) -> Result<(), Rejection> {
    let in_subset = |(i, _): &(usize, f32)| slowest.contains(&probe_id(*i));
    let min = lowest(active_probes(reading, mask).filter(in_subset))
        .or_else(|| lowest(active_probes(reading, mask)))
        .ok_or(Rejection::NoActiveProbes)?;
    check_target(min, target)
}

/// Every active probe reaches `target`.
pub fn all_active_at_target(
    reading: &Reading,
    mask: &ChannelMask,
    target: f32,
) -> Result<(), Rejection> {
    let min = lowest(active_probes(reading, mask)).ok_or(Rejection::NoActiveProbes)?;
    check_target(min, target)
}

fn check_target((index, value): (usize, f32), target: f32) -> Result<(), Rejection> {
    if value >= target {
        Ok(())
    } else {
        Err(Rejection::BelowTarget {
            probe: probe_id(index),
            value,
        })
    }
}

/// Every active probe is strictly below the coolest enabled ambient
/// sensor, so no probe leads the air that heats it.
pub fn ambient_leads_probes(reading: &Reading, mask: &ChannelMask) -> Result<(), Rejection> {
    let air = [AMBIENT_PRIMARY, AMBIENT_SECONDARY]
        .into_iter()
        .filter(|ch| mask[*ch] && is_set(reading[*ch]))
        .map(|ch| reading[ch])
        .reduce(f32::min)
        .ok_or(Rejection::NoAmbientReference)?;
    match active_probes(reading, mask).find(|(_, v)| *v >= air) {
        Some((index, _)) => Err(Rejection::OrderingViolated {
            probe: probe_id(index),
        }),
        None => Ok(()),
    }
}

/// No active probe changed by more than `max_delta` since `previous`.
/// Passes when there is no previous batch or a probe was unset in it.
pub fn within_delta(
    reading: &Reading,
    previous: Option<&Reading>,
    mask: &ChannelMask,
    max_delta: f32,
) -> Result<(), Rejection> {
    let Some(prev) = previous else {
        return Ok(());
    };
    for (index, value) in active_probes(reading, mask) {
        if !is_set(prev[index]) {
            continue;
        }
        let delta = (value - prev[index]).abs();
        if delta > max_delta {
            return Err(Rejection::DeltaExceeded {
                probe: probe_id(index),
                delta,
            });
        }
    }
    Ok(())
}

/// The configured success test.
#[derive(Debug, Clone)]
pub struct Criteria {
    pub strictness: Strictness,
    pub target_c: f32,
    pub slowest: heapless::Vec<u8, PROBE_COUNT>,
    pub max_delta_c: f32,
}

impl Criteria {
    pub fn from_config(config: &KilnConfig) -> Self {
        Self {
            strictness: config.strictness,
            target_c: config.target_temp_c,
            slowest: config.slowest_probes.clone(),
            max_delta_c: config.max_inter_batch_delta_c,
        }
    }

    pub fn evaluate(
        &self,
        reading: &Reading,
        previous: Option<&Reading>,
        mask: &ChannelMask,
    ) -> Result<(), Rejection> {
        match self.strictness {
            Strictness::Simple => {
                slowest_subset_at_target(reading, mask, &self.slowest, self.target_c)
            }
            Strictness::Strict => {
                all_active_at_target(reading, mask, self.target_c)?;
                ambient_leads_probes(reading, mask)?;
                within_delta(reading, previous, mask, self.max_delta_c)
            }
        }
    }
}
