//! Heat-treatment kiln controller library.
//!
//! Exposes the control core, adapters and runtime for the host binary and
//! the integration tests.  Hardware access goes through `embedded-hal`
//! traits and the port traits in [`app::ports`], so everything here runs
//! on the host against simulated or mock backends.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod control;
pub mod diagnostics;
pub mod error;
pub mod fsm;
pub mod runtime;
pub mod safety;
pub mod scheduler;
pub mod sensors;
pub mod thermal;

pub mod adapters;
pub mod drivers;
