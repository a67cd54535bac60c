//! Noise source for the thermal model.
//!
//! Every random draw in the simulator goes through [`Noise::uniform`], so a
//! seeded source makes a whole run reproducible and a disabled source turns
//! every jitter term into the midpoint of its range (zero for the symmetric
//! ranges the model uses).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub enum Noise {
    Seeded(StdRng),
    Disabled,
}

impl Noise {
    /// Deterministic source; same seed, same run.
    pub fn seeded(seed: u64) -> Self {
        Self::Seeded(StdRng::seed_from_u64(seed))
    }

    /// Source seeded from the OS.
    pub fn from_entropy() -> Self {
        Self::Seeded(StdRng::from_entropy())
    }

    pub fn disabled() -> Self {
        Self::Disabled
    }

    /// Draw from `U(lo, hi)` (inclusive).
    pub fn uniform(&mut self, lo: f32, hi: f32) -> f32 {
        match self {
            Self::Seeded(rng) if lo < hi => rng.gen_range(lo..=hi),
            Self::Seeded(_) => lo,
            Self::Disabled => (lo + hi) * 0.5,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Seeded(_))
    }
}

impl core::fmt::Debug for Noise {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Seeded(_) => write!(f, "Noise::Seeded"),
            Self::Disabled => write!(f, "Noise::Disabled"),
        }
    }
}
