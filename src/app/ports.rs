//! Port traits — the boundary between the control core and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ OvenService (domain)
//! ```
//!
//! Driven adapters (thermocouple frontend, relay bank, persistent store,
//! clock, event sinks) implement these traits. The
//! [`OvenService`](super::service::OvenService) consumes them via generics,
//! so the domain core never touches hardware directly and every test runs
//! against mocks.

use crate::channels::ChannelId;
use crate::error::ThermocoupleFault;

// ───────────────────────────────────────────────────────────────
// Thermocouple port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the domain calls this once per control tick.
///
/// A fault is fatal to the active run and is never retried within it; the
/// register/SPI decoding that produces the reading belongs to the adapter.
pub trait ThermocouplePort {
    /// Current oven temperature in °C, or the wiring fault preventing it.
    fn read(&mut self) -> Result<f32, ThermocoupleFault>;
}

// ───────────────────────────────────────────────────────────────
// Output port (driven adapter: domain → relays/SSRs)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the four switched outputs. Assumed to always
/// succeed; adapters log hardware failures rather than returning them
/// (fail-fast hardware diagnosis is out of the core's scope).
pub trait OutputPort {
    /// Switch one channel on or off.
    fn set_channel(&mut self, channel: ChannelId, on: bool);

    /// Switch every channel off — safe shutdown.
    fn all_off(&mut self) {
        for ch in ChannelId::ALL {
            self.set_channel(ch, false);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → UI / logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`OvenEvent`](super::events::OvenEvent)s
/// through this port: status reports, tune notifications, rejections.
/// One-way and non-blocking from the core's perspective; the adapter
/// decides where they go (LCD, serial log, buzzer).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::OvenEvent);
}

// ───────────────────────────────────────────────────────────────
// Storage port (domain ↔ persistent settings)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage for settings and learned parameters.
///
/// Writes MUST be atomic with respect to power loss — the backing store's
/// responsibility (EEPROM page writes, NVS commits). Keys are namespaced to
/// prevent collisions between subsystems.
pub trait StoragePort {
    /// Read a value. Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key. Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Clock port (injected wall clock)
// ───────────────────────────────────────────────────────────────

/// Wall-clock capability injected into the service so phase timing is
/// deterministic under test.
///
/// Phase elapsed time is anchored to this clock rather than counted in
/// ticks: an occasionally late tick cannot drift phase timing, because the
/// next tick re-synchronizes against the anchor. Duty-cycle slicing, by
/// contrast, advances exactly one slot per tick regardless of lateness.
pub trait ClockPort {
    /// Milliseconds since an arbitrary fixed origin (monotonic).
    fn now_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
