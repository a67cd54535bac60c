//! Runtime: threads and message passing around the control loop.
//!
//! The loop itself is synchronous ([`ControlLoop`](crate::app::service::ControlLoop));
//! this module puts it on a dedicated worker and connects it to operators
//! (commands) and subscribers (events) through a [`KilnBus`].

pub mod channels;
pub mod worker;

pub use channels::{BusEventSink, CommandReceiver, Commander, EventSubscriber, KilnBus};
pub use worker::{KilnHandle, WORKER_PANICKED, start};
