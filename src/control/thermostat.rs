//! Bang-bang thermostat over the kiln air temperature.
//!
//! Vetoes heating once the mean ambient reaches HIGH and lifts the veto
//! when it falls back to LOW.  Between the two setpoints the previous
//! decision holds.

use log::info;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thermostat {
    high_c: f32,
    low_c: f32,
    enabled: bool,
}

impl Thermostat {
    /// Starts with heating allowed.
    pub fn new(high_c: f32, low_c: f32) -> Self {
        debug_assert!(high_c > low_c);
        Self {
            high_c,
            low_c,
            enabled: true,
        }
    }

    /// Feed the latest mean ambient.  `None` (no ambient sensor reporting)
    /// keeps the current decision.  Returns whether heating is allowed.
    pub fn update(&mut self, mean_ambient: Option<f32>) -> bool {
        let Some(t) = mean_ambient else {
            return self.enabled;
        };
        if self.enabled && t >= self.high_c {
            info!("Thermostat: ambient {:.1}°C >= {:.1}, heating vetoed", t, self.high_c);
            self.enabled = false;
        } else if !self.enabled && t <= self.low_c {
            info!("Thermostat: ambient {:.1}°C <= {:.1}, heating allowed", t, self.low_c);
            self.enabled = true;
        }
        self.enabled
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}
