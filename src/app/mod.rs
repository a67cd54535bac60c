//! Application core: pure domain logic, zero I/O.
//!
//! The kiln's business rules: the control loop tick, pause/resume/cancel
//! handling and the event stream.  All interaction with hardware, storage
//! and time happens through **port traits** defined in [`ports`], keeping
//! this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
