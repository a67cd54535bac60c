//! Control decisions: heater veto, sample criteria and run completion.

pub mod criteria;
pub mod monitor;
pub mod thermostat;
