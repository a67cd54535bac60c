//! Unified error types for the kiln controller.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! control loop's error handling uniform. All variants are `Copy` so they
//! can be passed through the actuator guard and process monitor without
//! allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the controller funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A probe cycle could not be acquired.
    Acquisition(AcquisitionError),
    /// An actuator command failed.
    Actuator(ActuatorFault),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// The step journal rejected a write.
    Persistence(PersistenceError),
    /// The control worker thread could not be spawned.
    Spawn,
    /// The control worker thread panicked.
    WorkerPanicked,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Acquisition(e) => write!(f, "acquisition: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Persistence(e) => write!(f, "persistence: {e}"),
            Self::Spawn => write!(f, "control worker could not be spawned"),
            Self::WorkerPanicked => write!(f, "control worker panicked"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Acquisition errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionError {
    /// The converter did not answer within the cycle budget.
    Timeout,
    /// The converter answered but the frame was unusable.
    ReadFailed,
    /// No acquisition hardware is attached.
    Unavailable,
}

impl fmt::Display for AcquisitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "ADC read timed out"),
            Self::ReadFailed => write!(f, "ADC read failed"),
            Self::Unavailable => write!(f, "no acquisition source"),
        }
    }
}

impl std::error::Error for AcquisitionError {}

impl From<AcquisitionError> for Error {
    fn from(e: AcquisitionError) -> Self {
        Self::Acquisition(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator faults
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorFault {
    /// GPIO set failed.
    GpioWriteFailed,
    /// The relay line is not wired on this installation.
    NotConnected,
}

impl fmt::Display for ActuatorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
            Self::NotConnected => write!(f, "relay not connected"),
        }
    }
}

impl std::error::Error for ActuatorFault {}

impl From<ActuatorFault> for Error {
    fn from(e: ActuatorFault) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No configuration found in storage.
    NotFound,
    /// Stored configuration failed to parse.
    Corrupted,
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// No enabled probe produced a value; the run cannot be judged.
    NoActiveProbes,
    /// Generic I/O error from the storage backend.
    IoError,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::NoActiveProbes => write!(f, "active probe set is empty"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Persistence errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceError {
    /// The journal could not be written or flushed.
    IoError,
    /// An entry could not be encoded or decoded.
    Codec,
    /// The report was already finalized.
    ReportClosed,
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IoError => write!(f, "journal I/O error"),
            Self::Codec => write!(f, "journal codec error"),
            Self::ReportClosed => write!(f, "report already finalized"),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<PersistenceError> for Error {
    fn from(e: PersistenceError) -> Self {
        Self::Persistence(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
