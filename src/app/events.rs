//! Outbound events from the control core.
//!
//! The [`OvenService`](super::service::OvenService) emits these through the
//! [`EventSink`](super::ports::EventSink) port. Adapters on the other side
//! decide what to do with them — draw on the LCD, log to serial, play the
//! buzzer tune.

use super::commands::Mode;

/// Structured events emitted by the control core.
#[derive(Debug, Clone)]
pub enum OvenEvent {
    /// The service has started.
    Started,

    /// The run advanced to another phase. Emitted exactly once per
    /// transition, carrying the status snapshot at that moment.
    PhaseChanged {
        from: &'static str,
        to: &'static str,
        elapsed_secs: u32,
        temperature_c: f32,
    },

    /// Periodic status snapshot for the UI.
    Status(StatusReport),

    /// A start request was refused. Not a fault: the run state is unchanged
    /// and the user may retry.
    StartRejected(StartRejection),

    /// One or more safety faults were raised (bitmask, see `SafetyFault`).
    FaultDetected(u8),

    /// A run finished successfully.
    RunCompleted { mode: Mode },

    /// A run was aborted (user request or fault; flags 0 = user).
    RunAborted { fault_flags: u8 },

    /// The learning engine adjusted stored duty cycles after a run.
    DutyCyclesAdjusted,

    /// Play this tune on the buzzer.
    Tune(Tune),
}

/// A point-in-time status snapshot suitable for the LCD or serial log.
#[derive(Debug, Clone, Copy)]
pub struct StatusReport {
    pub mode: Option<Mode>,
    pub phase: &'static str,
    pub elapsed_secs: u32,
    pub temperature_c: f32,
    pub fault_flags: u8,
}

/// Why a start request was refused.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StartRejection {
    /// The oven is above the safe-start threshold; let it cool first.
    OvenTooHot { temperature_c: f32 },
    /// The thermocouple is faulted; the reading cannot be trusted.
    SensorFault,
    /// A run is already active.
    AlreadyRunning,
}

/// Tune identifiers the buzzer adapter knows how to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tune {
    /// A run was accepted and is starting.
    Start,
    /// The thermal work is done (reflow peak passed / bake finished).
    Done,
    /// Boards can be taken out of the oven.
    RemoveBoards,
}
