//! Shared mutable context threaded through every phase handler.
//!
//! `RunContext` is the single struct that phase handlers read from and
//! write to: the latest temperature, output commands, the active profile
//! and settings, accumulated safety faults, and the run outcome. It is the
//! blackboard of the control loop.

use heapless::Vec;
use log::info;

use crate::app::events::Tune;
use crate::channels::CHANNEL_COUNT;
use crate::profile::{PhaseKind, Profile, MAX_PHASES};
use crate::settings::OvenSettings;

// ---------------------------------------------------------------------------
// Output commands (written by phase handlers; applied by the service)
// ---------------------------------------------------------------------------

/// What the current phase wants the outputs to do. Heating channels carry a
/// duty percentage (sliced into on/off by the duty-cycle controller); fans
/// are plain booleans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputCommands {
    /// Requested duty percentage (0–100) per channel. Non-heating channels
    /// are always zero here.
    pub duty: [u8; CHANNEL_COUNT],
    /// Convection fan on/off.
    pub convection_fan: bool,
    /// Cooling fan on/off.
    pub cooling_fan: bool,
}

impl Default for OutputCommands {
    fn default() -> Self {
        Self {
            duty: [0; CHANNEL_COUNT],
            convection_fan: false,
            cooling_fan: false,
        }
    }
}

impl OutputCommands {
    /// Everything off — safe default.
    pub fn all_off() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Run outcome
// ---------------------------------------------------------------------------

/// Where the active run stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Running,
    Completed,
    Aborted,
}

// ---------------------------------------------------------------------------
// RunContext
// ---------------------------------------------------------------------------

/// The shared context passed to every phase handler function.
pub struct RunContext {
    // -- Timing --
    /// Wall-clock seconds since the current phase was entered. Maintained by
    /// the service from the injected clock; reset to 0 on every transition.
    pub elapsed_in_phase_secs: u32,

    // -- Temperature --
    /// Last valid thermocouple reading (°C).
    pub temperature_c: f32,
    /// Highest reading observed during the active run.
    pub peak_c: f32,

    // -- Safety --
    /// Latched safety fault bitmask (see `SafetyFault::mask()`). Any nonzero
    /// value demands an abort on the same tick.
    pub fault_flags: u8,
    /// User abort request; effective at the tick that observes it.
    pub abort_requested: bool,

    // -- Outputs --
    /// Commands applied to the output channels after the FSM tick.
    pub commands: OutputCommands,

    // -- Configuration --
    pub settings: OvenSettings,
    pub profile: Profile,

    // -- Run bookkeeping --
    pub outcome: RunOutcome,
    /// Which phase kind is active (set by each phase's on_enter).
    pub phase_kind: PhaseKind,
    /// Phase durations recorded for the learning engine, in exit order.
    pub records: Vec<PhaseExitRecord, MAX_PHASES>,
    /// Tune queued for the event sink, drained once per tick.
    pub pending_tune: Option<Tune>,
}

/// Snapshot taken when a phase exits, feeding the learning engine.
#[derive(Debug, Clone, Copy)]
pub struct PhaseExitRecord {
    pub kind: PhaseKind,
    pub elapsed_secs: u32,
    pub reached_target: bool,
}

impl RunContext {
    /// Create a context for a fresh run.
    pub fn new(settings: OvenSettings, profile: Profile) -> Self {
        Self {
            elapsed_in_phase_secs: 0,
            temperature_c: 0.0,
            peak_c: 0.0,
            fault_flags: 0,
            abort_requested: false,
            commands: OutputCommands::all_off(),
            settings,
            profile,
            outcome: RunOutcome::Running,
            phase_kind: PhaseKind::Init,
            records: Vec::new(),
            pending_tune: None,
        }
    }

    /// Reset the per-run bookkeeping at the moment a start is accepted.
    pub fn begin_run(&mut self, current_temperature_c: f32) {
        self.elapsed_in_phase_secs = 0;
        self.temperature_c = current_temperature_c;
        self.peak_c = current_temperature_c;
        self.fault_flags = 0;
        self.abort_requested = false;
        self.commands = OutputCommands::all_off();
        self.outcome = RunOutcome::Running;
        self.phase_kind = PhaseKind::Init;
        self.records.clear();
        self.pending_tune = None;
    }

    /// Returns `true` if a fault or a user abort demands leaving the phase.
    pub fn abort_demanded(&self) -> bool {
        self.fault_flags != 0 || self.abort_requested
    }

    /// Enter a profiled phase: look up its spec and apply duty and fan
    /// policy. Phases without a spec (Init, Abort) have their own enters.
    pub fn enter_phase(&mut self, kind: PhaseKind) {
        self.phase_kind = kind;
        let Some(spec) = self.profile.spec(kind).copied() else {
            self.commands = OutputCommands::all_off();
            return;
        };
        self.commands.duty = match spec.duty_slot {
            Some(slot) => self.settings.heating_duties(slot),
            None => [0; CHANNEL_COUNT],
        };
        self.commands.convection_fan = spec.convection_fan;
        self.commands.cooling_fan = spec.cooling_fan;
        info!(
            "{}: entered at {:.1}\u{00b0}C, duty {:?}",
            kind.name(),
            self.temperature_c,
            self.commands.duty
        );
    }

    /// Whether the current phase's exit condition holds.
    pub fn phase_exit_met(&self) -> bool {
        self.profile
            .spec(self.phase_kind)
            .is_some_and(|s| s.exit_met(self.temperature_c, self.elapsed_in_phase_secs, self.peak_c))
    }

    /// Zero every heating duty (fans keep their phase policy).
    pub fn heaters_off(&mut self) {
        self.commands.duty = [0; CHANNEL_COUNT];
    }

    /// Queue a tune notification for the event sink.
    pub fn request_tune(&mut self, tune: Tune) {
        self.pending_tune = Some(tune);
    }
}
