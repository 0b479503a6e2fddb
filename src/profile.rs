//! Thermal profiles: phase specifications and exit conditions.
//!
//! A [`Profile`] is the ordered list of phases a run walks through. Each
//! phase carries its exit condition, a nominal duration (the learning
//! engine's reference), an optional timeout, the learned-duty slot that
//! powers it, and the fan policy while it is active.
//!
//! The reflow curve is derived from the configured maximum oven temperature,
//! the bake curve from the configured bake temperature and duration.

use heapless::Vec;

/// Maximum phases in a profile (reflow uses 8 including Init/Abort).
pub const MAX_PHASES: usize = 8;

/// Oven must be below this to accept a start, and runs end here.
pub const SAFE_START_TEMP_C: f32 = 50.0;

/// Presoak ramps the oven to the soak entry temperature.
pub const PRESOAK_EXIT_C: f32 = 150.0;

/// Soak ends this far below the reflow peak.
pub const SOAK_BELOW_PEAK_C: f32 = 45.0;

/// Boards stay in the oven (door open) until this temperature.
pub const BOARDS_IN_EXIT_C: f32 = 100.0;

/// Bake heat-up hands over to the hold phase this far below target.
pub const BAKE_HEATUP_BELOW_TARGET_C: f32 = 10.0;

/// Decline from the observed peak that counts as "cooling has begun".
pub const PEAK_DECLINE_DELTA_C: f32 = 1.0;

// ---------------------------------------------------------------------------
// Phase identity
// ---------------------------------------------------------------------------

/// Every phase either state machine can be in. Reflow and bake use disjoint
/// subsets (plus the shared Init/Abort bookends).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    Init,
    // Reflow
    Presoak,
    Soak,
    Reflow,
    Waiting,
    CoolingBoardsIn,
    CoolingBoardsOut,
    // Bake
    Heatup,
    Bake,
    StartCooling,
    Cooling,
    // Shared terminal
    Abort,
}

impl PhaseKind {
    /// Display name, matching what the front panel shows.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Init => "Init",
            Self::Presoak => "Presoak",
            Self::Soak => "Soak",
            Self::Reflow => "Reflow",
            Self::Waiting => "Waiting",
            Self::CoolingBoardsIn => "Cooling",
            Self::CoolingBoardsOut => "Cool - open door",
            Self::Heatup => "Heatup",
            Self::Bake => "Baking",
            Self::StartCooling => "Start cooling",
            Self::Cooling => "Cooling",
            Self::Abort => "Abort",
        }
    }
}

/// Learned duty-cycle slot. One duty percentage is stored per
/// (slot, channel) pair; bake reuses the Soak slot under a thermostat gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DutySlot {
    Presoak = 0,
    Soak = 1,
    Reflow = 2,
}

impl DutySlot {
    pub const COUNT: usize = 3;

    pub const fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// Exit conditions
// ---------------------------------------------------------------------------

/// How a phase decides it is done. Evaluated once per control tick, after
/// the fault and abort checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhaseExit {
    /// Exit once the reading reaches this temperature.
    TempAbove(f32),
    /// Exit once the reading drops to this temperature.
    TempBelow(f32),
    /// Exit after this many seconds in the phase.
    After(u32),
    /// Exit once the peak has reached `target_c` (or the phase timed out)
    /// and the reading has begun declining from the observed peak.
    PeakDecline { target_c: f32 },
}

/// Specification of a single phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseSpec {
    pub kind: PhaseKind,
    pub exit: PhaseExit,
    /// Expected time to complete the phase; the learning engine compares
    /// actual duration against this.
    pub nominal_secs: u32,
    /// Hard timeout: the phase exits forward even if the temperature target
    /// was not met (recorded as target-not-reached for learning).
    pub max_secs: Option<u32>,
    /// Which learned duty percentages power this phase, if any.
    pub duty_slot: Option<DutySlot>,
    /// Convection fan policy while the phase is active.
    pub convection_fan: bool,
    /// Cooling fan policy while the phase is active.
    pub cooling_fan: bool,
}

impl PhaseSpec {
    /// Whether the exit condition holds for the given reading/elapsed/peak.
    pub fn exit_met(&self, temperature_c: f32, elapsed_secs: u32, peak_c: f32) -> bool {
        if let Some(max) = self.max_secs {
            if elapsed_secs >= max {
                return true;
            }
        }
        match self.exit {
            PhaseExit::TempAbove(t) => temperature_c >= t,
            PhaseExit::TempBelow(t) => temperature_c <= t,
            PhaseExit::After(secs) => elapsed_secs >= secs,
            PhaseExit::PeakDecline { target_c } => {
                peak_c >= target_c && temperature_c <= peak_c - PEAK_DECLINE_DELTA_C
            }
        }
    }

    /// Whether the phase's temperature target was actually met (as opposed
    /// to the phase exiting on timeout). Used for learning records.
    pub fn target_reached(&self, temperature_c: f32, peak_c: f32) -> bool {
        match self.exit {
            PhaseExit::TempAbove(t) => temperature_c >= t,
            PhaseExit::TempBelow(t) => temperature_c <= t,
            PhaseExit::After(_) => true,
            PhaseExit::PeakDecline { target_c } => peak_c >= target_c,
        }
    }
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// Ordered list of phase specifications for one run mode.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    phases: Vec<PhaseSpec, MAX_PHASES>,
}

impl Profile {
    /// Look up the spec for a phase kind. Init and Abort carry no spec.
    pub fn spec(&self, kind: PhaseKind) -> Option<&PhaseSpec> {
        self.phases.iter().find(|p| p.kind == kind)
    }

    /// The phases in run order.
    pub fn phases(&self) -> &[PhaseSpec] {
        &self.phases
    }
}

/// Build the reflow profile for a given peak (maximum oven) temperature.
///
/// Presoak to 150 °C, soak to `max − 45`, reflow to the peak, a short wait
/// for heat to permeate the boards, then two cooling stages (door open at
/// 100 °C, boards out once another run could start at 50 °C).
pub fn reflow_profile(max_temperature_c: f32) -> Profile {
    let mut phases: Vec<PhaseSpec, MAX_PHASES> = Vec::new();
    let _ = phases.push(PhaseSpec {
        kind: PhaseKind::Presoak,
        exit: PhaseExit::TempAbove(PRESOAK_EXIT_C),
        nominal_secs: 100,
        max_secs: Some(240),
        duty_slot: Some(DutySlot::Presoak),
        convection_fan: true,
        cooling_fan: false,
    });
    let _ = phases.push(PhaseSpec {
        kind: PhaseKind::Soak,
        exit: PhaseExit::TempAbove(max_temperature_c - SOAK_BELOW_PEAK_C),
        nominal_secs: 90,
        max_secs: Some(300),
        duty_slot: Some(DutySlot::Soak),
        convection_fan: true,
        cooling_fan: false,
    });
    let _ = phases.push(PhaseSpec {
        kind: PhaseKind::Reflow,
        exit: PhaseExit::PeakDecline {
            target_c: max_temperature_c,
        },
        nominal_secs: 60,
        max_secs: Some(180),
        duty_slot: Some(DutySlot::Reflow),
        convection_fan: true,
        cooling_fan: false,
    });
    let _ = phases.push(PhaseSpec {
        kind: PhaseKind::Waiting,
        exit: PhaseExit::After(40),
        nominal_secs: 40,
        max_secs: None,
        duty_slot: None,
        convection_fan: true,
        cooling_fan: false,
    });
    let _ = phases.push(PhaseSpec {
        kind: PhaseKind::CoolingBoardsIn,
        exit: PhaseExit::TempBelow(BOARDS_IN_EXIT_C),
        nominal_secs: 120,
        max_secs: None,
        duty_slot: None,
        convection_fan: false,
        cooling_fan: true,
    });
    let _ = phases.push(PhaseSpec {
        kind: PhaseKind::CoolingBoardsOut,
        exit: PhaseExit::TempBelow(SAFE_START_TEMP_C),
        nominal_secs: 180,
        max_secs: None,
        duty_slot: None,
        convection_fan: false,
        cooling_fan: true,
    });
    Profile { phases }
}

/// Build the bake profile for a hold temperature and duration.
///
/// Heat-up runs until `bake_temp − 10`; the hold phase keeps the oven at
/// the target for the full duration (thermostat-gated soak duties); cooling
/// runs the fan until the oven is back below the safe-start threshold.
pub fn bake_profile(bake_temperature_c: f32, bake_duration_secs: u32) -> Profile {
    let mut phases: Vec<PhaseSpec, MAX_PHASES> = Vec::new();
    let _ = phases.push(PhaseSpec {
        kind: PhaseKind::Heatup,
        exit: PhaseExit::TempAbove(bake_temperature_c - BAKE_HEATUP_BELOW_TARGET_C),
        nominal_secs: 600,
        max_secs: Some(1800),
        duty_slot: Some(DutySlot::Soak),
        convection_fan: true,
        cooling_fan: false,
    });
    let _ = phases.push(PhaseSpec {
        kind: PhaseKind::Bake,
        exit: PhaseExit::After(bake_duration_secs),
        nominal_secs: bake_duration_secs,
        max_secs: None,
        duty_slot: Some(DutySlot::Soak),
        convection_fan: true,
        cooling_fan: false,
    });
    let _ = phases.push(PhaseSpec {
        kind: PhaseKind::StartCooling,
        exit: PhaseExit::After(0),
        nominal_secs: 0,
        max_secs: None,
        duty_slot: None,
        convection_fan: false,
        cooling_fan: true,
    });
    let _ = phases.push(PhaseSpec {
        kind: PhaseKind::Cooling,
        exit: PhaseExit::TempBelow(SAFE_START_TEMP_C),
        nominal_secs: 600,
        max_secs: None,
        duty_slot: None,
        convection_fan: false,
        cooling_fan: true,
    });
    Profile { phases }
}
