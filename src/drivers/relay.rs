//! Relay line driver.
//!
//! The kiln fan and heater contactors hang off opto-isolated relay boards
//! that energize when the control pin is pulled **low**.  The driver hides
//! the inversion: callers speak in terms of energized / de-energized.
//!
//! ## Safety contract
//!
//! A newly constructed relay is driven de-energized before anything else
//! happens.  A failed pin write leaves the driver in `Faulted`; the next
//! successful write clears it.

use embedded_hal::digital::OutputPin;
use log::warn;

use crate::error::ActuatorFault;

/// Anything that can switch one relay.
pub trait RelayLine {
    fn set(&mut self, energized: bool) -> Result<(), ActuatorFault>;
    fn is_energized(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    Off,
    On,
    Faulted,
}

/// Active-low relay on a GPIO output pin.
pub struct ActiveLowRelay<P> {
    pin: P,
    state: LineState,
    label: &'static str,
}

impl<P: OutputPin> ActiveLowRelay<P> {
    /// Take ownership of `pin` and drive it high (de-energized).
    pub fn new(pin: P, label: &'static str) -> Result<Self, ActuatorFault> {
        let mut relay = Self {
            pin,
            state: LineState::Faulted,
            label,
        };
        relay.set(false)?;
        Ok(relay)
    }

    pub fn state(&self) -> LineState {
        self.state
    }

    pub fn release(self) -> P {
        self.pin
    }
}

impl<P: OutputPin> RelayLine for ActiveLowRelay<P> {
    fn set(&mut self, energized: bool) -> Result<(), ActuatorFault> {
        let result = if energized {
            self.pin.set_low()
        } else {
            self.pin.set_high()
        };
        match result {
            Ok(()) => {
                self.state = if energized { LineState::On } else { LineState::Off };
                Ok(())
            }
            Err(e) => {
                warn!("Relay {}: pin write failed: {:?}", self.label, e);
                self.state = LineState::Faulted;
                Err(ActuatorFault::GpioWriteFailed)
            }
        }
    }

    fn is_energized(&self) -> bool {
        self.state == LineState::On
    }
}
