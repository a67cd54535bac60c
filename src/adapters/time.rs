//! Clock adapters.
//!
//! - [`SystemClock`]: `std::time::Instant` for pacing, `SystemTime` for the
//!   run's wall-clock anchor.
//! - [`SimulatedClock`]: virtual time that advances on `sleep`.  With a
//!   speedup factor it also sleeps for real (`duration / speedup`), so an
//!   accelerated run can still be watched.  With real pauses, an operator
//!   pause runs on wall time and adds exactly the waited time to the
//!   virtual timeline.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::app::ports::Clock;

fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

/// Real time.
pub struct SystemClock {
    start: Instant,
    wall_start_ms: u64,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            wall_start_ms: unix_now_ms(),
        }
    }
}

impl Clock for SystemClock {
    fn monotonic(&self) -> Duration {
        self.start.elapsed()
    }

    fn wall_start_ms(&self) -> u64 {
        self.wall_start_ms
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual time.  Clones share the same timeline.
#[derive(Clone)]
pub struct SimulatedClock {
    now_ms: Arc<AtomicU64>,
    wall_start_ms: u64,
    speedup: Option<u32>,
    real_pauses: bool,
}

impl SimulatedClock {
    /// Pure virtual time: `sleep` returns immediately.
    pub fn new(wall_start_ms: u64) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(0)),
            wall_start_ms,
            speedup: None,
            real_pauses: false,
        }
    }

    /// Virtual time anchored at the current wall clock.
    pub fn from_now() -> Self {
        Self::new(unix_now_ms())
    }

    /// Also sleep for real, `speedup` times faster than virtual time.
    #[must_use]
    pub fn paced(mut self, speedup: u32) -> Self {
        self.speedup = (speedup > 0).then_some(speedup);
        self
    }

    /// Pause waits sleep for real, unscaled.
    #[must_use]
    pub fn with_real_pauses(mut self) -> Self {
        self.real_pauses = true;
        self
    }

    pub fn advance(&self, duration: Duration) {
        self.now_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn now(&self) -> Duration {
        Duration::from_millis(self.now_ms.load(Ordering::SeqCst))
    }
}

impl Clock for SimulatedClock {
    fn monotonic(&self) -> Duration {
        self.now()
    }

    fn wall_start_ms(&self) -> u64 {
        self.wall_start_ms
    }

    fn sleep(&self, duration: Duration) {
        if let Some(speedup) = self.speedup {
            std::thread::sleep(duration / speedup);
        }
        self.advance(duration);
    }

    fn pause_wait(&self, poll: Duration) {
        if self.real_pauses {
            std::thread::sleep(poll);
            self.advance(poll);
        } else {
            self.sleep(poll);
        }
    }
}

/// Clock selected at start-up.
pub enum ClockBackend {
    System(SystemClock),
    Simulated(SimulatedClock),
}

impl Clock for ClockBackend {
    fn monotonic(&self) -> Duration {
        match self {
            Self::System(c) => c.monotonic(),
            Self::Simulated(c) => c.monotonic(),
        }
    }

    fn wall_start_ms(&self) -> u64 {
        match self {
            Self::System(c) => c.wall_start_ms(),
            Self::Simulated(c) => c.wall_start_ms(),
        }
    }

    fn sleep(&self, duration: Duration) {
        match self {
            Self::System(c) => c.sleep(duration),
            Self::Simulated(c) => c.sleep(duration),
        }
    }

    fn pause_wait(&self, poll: Duration) {
        match self {
            Self::System(c) => c.pause_wait(poll),
            Self::Simulated(c) => c.pause_wait(poll),
        }
    }
}
