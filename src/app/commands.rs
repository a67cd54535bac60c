//! Inbound operator commands.
//!
//! These represent actions requested by the outside world (console, GUI,
//! remote panel) that the [`ControlLoop`](super::service::ControlLoop)
//! observes at the top of each tick and while paused.

/// Commands that external adapters can send into a running loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KilnCommand {
    /// Freeze logical time; no samples are taken until resumed.
    Pause,

    /// Continue a paused run.  Later timestamps shift by the paused time.
    Resume,

    /// Stop the run.  Actuators are driven safe before the outcome is
    /// reported.
    Cancel,
}

impl KilnCommand {
    /// Parse a console shorthand (`p`, `r`, `c`, or the full word).
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "p" | "pause" => Some(Self::Pause),
            "r" | "resume" => Some(Self::Resume),
            "c" | "cancel" | "q" | "quit" => Some(Self::Cancel),
            _ => None,
        }
    }
}
