//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured oven events to the
//! logger (serial console in production, stdout in the host simulation).
//! An LCD or buzzer adapter would implement the same trait.

use log::{info, warn};

use crate::app::events::OvenEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`OvenEvent`] to the console.
pub struct LogEventSink {
    /// Emit a STATUS line only every this many status events.
    status_every: u32,
    status_count: u32,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self {
            status_every: 10,
            status_count: 0,
        }
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &OvenEvent) {
        match event {
            OvenEvent::Status(s) => {
                // Status fires every tick; thin it out for the console.
                self.status_count += 1;
                if self.status_count % self.status_every != 0 {
                    return;
                }
                info!(
                    "STATUS | {} | {} | {}s | T={:.1}\u{00b0}C | faults=0b{:08b}",
                    s.mode.map_or("-", |m| m.name()),
                    s.phase,
                    s.elapsed_secs,
                    s.temperature_c,
                    s.fault_flags,
                );
            }
            OvenEvent::PhaseChanged {
                from,
                to,
                elapsed_secs,
                temperature_c,
            } => {
                info!("PHASE | {from} -> {to} after {elapsed_secs}s at {temperature_c:.1}\u{00b0}C");
            }
            OvenEvent::FaultDetected(flags) => {
                warn!("FAULT | detected, flags=0b{flags:08b}");
            }
            OvenEvent::StartRejected(reason) => {
                warn!("START | rejected: {reason:?}");
            }
            OvenEvent::RunCompleted { mode } => {
                info!("DONE  | {} run completed", mode.name());
            }
            OvenEvent::RunAborted { fault_flags } => {
                warn!("ABORT | run aborted, flags=0b{fault_flags:08b}");
            }
            OvenEvent::DutyCyclesAdjusted => {
                info!("LEARN | duty cycles adjusted");
            }
            OvenEvent::Tune(tune) => {
                info!("TUNE  | {tune:?}");
            }
            OvenEvent::Started => {
                info!("START | service up");
            }
        }
    }
}
