//! Control-loop message channels.
//!
//! Uses `embassy-sync` primitives to bridge the synchronous control worker
//! with operator input and event subscribers:
//!
//! ```text
//! ┌──────────────┐ KilnCommand ┌──────────────┐  KilnEvent  ┌─────────────┐
//! │  Commander   │────────────▶│ Control loop │────────────▶│ Subscribers │
//! │ (any thread) │   Channel   │  (worker)    │  PubSub     │  (async)    │
//! └──────────────┘             └──────────────┘             └─────────────┘
//! ```
//!
//! Events are published with `publish_immediate`: the loop never blocks on
//! a slow subscriber.  A subscriber that falls behind sees a lag notice and
//! resumes at the oldest retained event.

use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::pubsub::{PubSubChannel, Subscriber};
use log::warn;

use crate::app::commands::KilnCommand;
use crate::app::events::KilnEvent;
use crate::app::ports::{CommandPort, EventSink};

/// Channel depth for operator commands.
pub const CMD_DEPTH: usize = 8;
/// Events retained for subscribers.
pub const EVENT_CAPACITY: usize = 128;
/// Maximum concurrent event subscribers.
pub const MAX_SUBSCRIBERS: usize = 4;
/// Publishers holding a slot (the loop uses an immediate publisher).
const MAX_PUBLISHERS: usize = 1;

pub type CommandChannel = Channel<CriticalSectionRawMutex, KilnCommand, CMD_DEPTH>;
pub type EventChannel =
    PubSubChannel<CriticalSectionRawMutex, KilnEvent, EVENT_CAPACITY, MAX_SUBSCRIBERS, MAX_PUBLISHERS>;
pub type EventSubscriber<'a> =
    Subscriber<'a, CriticalSectionRawMutex, KilnEvent, EVENT_CAPACITY, MAX_SUBSCRIBERS, MAX_PUBLISHERS>;

struct BusInner {
    commands: CommandChannel,
    events: EventChannel,
}

/// Shared command/event bus for one kiln.  Clones refer to the same bus.
#[derive(Clone)]
pub struct KilnBus {
    inner: Arc<BusInner>,
}

impl Default for KilnBus {
    fn default() -> Self {
        Self::new()
    }
}

impl KilnBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                commands: Channel::new(),
                events: PubSubChannel::new(),
            }),
        }
    }

    /// Subscribe to events published from now on.  `None` when every
    /// subscriber slot is taken.
    pub fn subscribe(&self) -> Option<EventSubscriber<'_>> {
        match self.inner.events.subscriber() {
            Ok(sub) => Some(sub),
            Err(e) => {
                warn!("Event bus: no subscriber slot ({:?})", e);
                None
            }
        }
    }

    pub fn commander(&self) -> Commander {
        Commander { bus: self.clone() }
    }

    pub fn command_receiver(&self) -> CommandReceiver {
        CommandReceiver { bus: self.clone() }
    }

    pub fn event_sink(&self) -> BusEventSink {
        BusEventSink { bus: self.clone() }
    }
}

// ── Command side ──────────────────────────────────────────────

/// Sends operator commands to the loop from any thread.
#[derive(Clone)]
pub struct Commander {
    bus: KilnBus,
}

impl Commander {
    /// Queue `cmd`.  Returns `false` if the command queue is full.
    pub fn send(&self, cmd: KilnCommand) -> bool {
        if self.bus.inner.commands.try_send(cmd).is_err() {
            warn!("Command queue full, dropping {:?}", cmd);
            return false;
        }
        true
    }

    pub fn pause(&self) -> bool {
        self.send(KilnCommand::Pause)
    }

    pub fn resume(&self) -> bool {
        self.send(KilnCommand::Resume)
    }

    pub fn cancel(&self) -> bool {
        self.send(KilnCommand::Cancel)
    }
}

/// Loop-side end of the command queue.
pub struct CommandReceiver {
    bus: KilnBus,
}

impl CommandPort for CommandReceiver {
    fn try_next(&mut self) -> Option<KilnCommand> {
        self.bus.inner.commands.try_receive().ok()
    }
}

// ── Event side ────────────────────────────────────────────────

/// Loop-side event publisher.
pub struct BusEventSink {
    bus: KilnBus,
}

impl EventSink for BusEventSink {
    fn emit(&mut self, event: &KilnEvent) {
        self.bus
            .inner
            .events
            .immediate_publisher()
            .publish_immediate(event.clone());
    }
}
