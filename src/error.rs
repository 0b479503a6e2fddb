//! Error types for the ReflowWizard firmware.
//!
//! [`Error`] covers the fallible call/return paths (settings persistence).
//! Sensor and safety faults are deliberately **not** routed through it:
//! they are per-tick control inputs, carried as [`ThermocoupleFault`]
//! readings and the latched [`SafetyFault`] bitmask instead of bubbling up
//! a call stack. All types are `Copy`; nothing here allocates.

use core::fmt;

use crate::app::ports::StorageError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Fallible operations (persistence, validation) funnel into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The settings store failed.
    Storage(StorageError),
    /// Settings failed range validation.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Thermocouple faults
// ---------------------------------------------------------------------------

/// Wiring fault signalled by the MAX31855-class thermocouple frontend.
///
/// Any of these is fatal to the active run: the reading cannot be trusted,
/// so heating must stop immediately. Faults are never retried within a run —
/// the user must acknowledge and explicitly restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermocoupleFault {
    /// Thermocouple circuit is open (broken wire, unplugged probe).
    Open,
    /// Thermocouple is shorted to ground.
    ShortToGround,
    /// Thermocouple is shorted to the supply rail.
    ShortToSupply,
}

impl fmt::Display for ThermocoupleFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "thermocouple open"),
            Self::ShortToGround => write!(f, "thermocouple short to GND"),
            Self::ShortToSupply => write!(f, "thermocouple short to VCC"),
        }
    }
}

// ---------------------------------------------------------------------------
// Safety faults
// ---------------------------------------------------------------------------

/// Safety faults are a special category: they force an immediate transition
/// to the ABORT phase, switch every heating element off, and turn the cooling
/// fan on. They are accumulated in a bitfield by the safety supervisor and
/// latch for the remainder of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SafetyFault {
    /// Thermocouple circuit open.
    ThermocoupleOpen = 0b0000_0001,
    /// Thermocouple shorted to ground.
    ThermocoupleShortGnd = 0b0000_0010,
    /// Thermocouple shorted to the supply rail.
    ThermocoupleShortVcc = 0b0000_0100,
    /// Oven temperature exceeds the configured maximum plus margin.
    OverTemperature = 0b0000_1000,
}

impl SafetyFault {
    /// Return the bitmask for this fault.
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl From<ThermocoupleFault> for SafetyFault {
    fn from(f: ThermocoupleFault) -> Self {
        match f {
            ThermocoupleFault::Open => Self::ThermocoupleOpen,
            ThermocoupleFault::ShortToGround => Self::ThermocoupleShortGnd,
            ThermocoupleFault::ShortToSupply => Self::ThermocoupleShortVcc,
        }
    }
}

impl fmt::Display for SafetyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ThermocoupleOpen => write!(f, "thermocouple open"),
            Self::ThermocoupleShortGnd => write!(f, "thermocouple short to GND"),
            Self::ThermocoupleShortVcc => write!(f, "thermocouple short to VCC"),
            Self::OverTemperature => write!(f, "over temperature"),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
