//! Bake state machine: heat to a setpoint, hold, then cool.
//!
//! ```text
//!  INIT ─▶ HEATUP ─▶ BAKE ─▶ START_COOLING ─▶ COOLING (terminal)
//!
//!  Any state ──[fault or abort command]──▶ ABORT (terminal)
//! ```
//!
//! Unlike the reflow profile, bake holds a temperature for a long time, so
//! both HEATUP and BAKE gate the heating duties thermostat-style: duties
//! come from the soak slot while below the setpoint and drop to zero at or
//! above it.

use log::{info, warn};

use super::context::{OutputCommands, RunContext, RunOutcome};
use super::StateDescriptor;
use crate::app::events::Tune;
use crate::profile::{DutySlot, PhaseKind};

/// Bake run states, in forward order. Abort is last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BakeState {
    Init,
    Heatup,
    Bake,
    StartCooling,
    Cooling,
    Abort,
}

impl BakeState {
    pub const COUNT: usize = 6;

    pub const fn kind(self) -> PhaseKind {
        match self {
            Self::Init => PhaseKind::Init,
            Self::Heatup => PhaseKind::Heatup,
            Self::Bake => PhaseKind::Bake,
            Self::StartCooling => PhaseKind::StartCooling,
            Self::Cooling => PhaseKind::Cooling,
            Self::Abort => PhaseKind::Abort,
        }
    }
}

pub fn build_state_table() -> [StateDescriptor<BakeState>; BakeState::COUNT] {
    [
        StateDescriptor {
            id: BakeState::Init,
            name: PhaseKind::Init.name(),
            on_enter: None,
            on_exit: None,
            on_update: init_update,
        },
        StateDescriptor {
            id: BakeState::Heatup,
            name: PhaseKind::Heatup.name(),
            on_enter: Some(heatup_enter),
            on_exit: None,
            on_update: heatup_update,
        },
        StateDescriptor {
            id: BakeState::Bake,
            name: PhaseKind::Bake.name(),
            on_enter: Some(bake_enter),
            on_exit: None,
            on_update: bake_update,
        },
        StateDescriptor {
            id: BakeState::StartCooling,
            name: PhaseKind::StartCooling.name(),
            on_enter: Some(start_cooling_enter),
            on_exit: None,
            on_update: start_cooling_update,
        },
        StateDescriptor {
            id: BakeState::Cooling,
            name: PhaseKind::Cooling.name(),
            on_enter: Some(cooling_enter),
            on_exit: None,
            on_update: cooling_update,
        },
        StateDescriptor {
            id: BakeState::Abort,
            name: PhaseKind::Abort.name(),
            on_enter: Some(abort_enter),
            on_exit: None,
            on_update: abort_update,
        },
    ]
}

fn init_update(ctx: &mut RunContext) -> Option<BakeState> {
    if ctx.abort_demanded() {
        return Some(BakeState::Abort);
    }
    Some(BakeState::Heatup)
}

// ---------------------------------------------------------------------------
// HEATUP / BAKE — thermostat-gated heating
// ---------------------------------------------------------------------------

/// Heaters on below the setpoint, off at or above it. Restores the soak
/// slot duties when re-engaging so a tripped gate is not sticky.
fn thermostat_gate(ctx: &mut RunContext) {
    if ctx.temperature_c >= ctx.settings.bake_temperature_c {
        ctx.heaters_off();
    } else {
        ctx.commands.duty = ctx.settings.heating_duties(DutySlot::Soak);
    }
}

fn heatup_enter(ctx: &mut RunContext) {
    ctx.enter_phase(PhaseKind::Heatup);
    info!(
        "Heatup: target {:.0}\u{00b0}C for {}s",
        ctx.settings.bake_temperature_c, ctx.settings.bake_duration_secs
    );
}

fn heatup_update(ctx: &mut RunContext) -> Option<BakeState> {
    if ctx.abort_demanded() {
        return Some(BakeState::Abort);
    }
    thermostat_gate(ctx);
    if ctx.phase_exit_met() {
        return Some(BakeState::Bake);
    }
    None
}

fn bake_enter(ctx: &mut RunContext) {
    ctx.enter_phase(PhaseKind::Bake);
}

fn bake_update(ctx: &mut RunContext) -> Option<BakeState> {
    if ctx.abort_demanded() {
        return Some(BakeState::Abort);
    }
    thermostat_gate(ctx);
    if ctx.phase_exit_met() {
        return Some(BakeState::StartCooling);
    }
    None
}

// ---------------------------------------------------------------------------
// Cooling
// ---------------------------------------------------------------------------

fn start_cooling_enter(ctx: &mut RunContext) {
    ctx.enter_phase(PhaseKind::StartCooling);
    ctx.outcome = RunOutcome::Completed;
    ctx.request_tune(Tune::Done);
    info!("Bake finished, cooling down");
}

fn start_cooling_update(ctx: &mut RunContext) -> Option<BakeState> {
    if ctx.abort_demanded() {
        return Some(BakeState::Abort);
    }
    // Zero-duration phase: announces the end of the bake, then moves on.
    Some(BakeState::Cooling)
}

fn cooling_enter(ctx: &mut RunContext) {
    ctx.enter_phase(PhaseKind::Cooling);
}

fn cooling_update(ctx: &mut RunContext) -> Option<BakeState> {
    if ctx.abort_demanded() {
        return Some(BakeState::Abort);
    }
    // Below the safe-start threshold the fan stops; the run holds here
    // until the user acknowledges.
    if ctx.phase_exit_met() {
        ctx.commands.cooling_fan = false;
    }
    None
}

// ---------------------------------------------------------------------------
// ABORT
// ---------------------------------------------------------------------------

fn abort_enter(ctx: &mut RunContext) {
    ctx.phase_kind = PhaseKind::Abort;
    ctx.commands = OutputCommands::all_off();
    ctx.commands.cooling_fan = true;
    if ctx.outcome == RunOutcome::Running {
        ctx.outcome = RunOutcome::Aborted;
    }
    warn!(
        "ABORT: heaters off, cooling fan on, fault_flags=0b{:08b}",
        ctx.fault_flags
    );
}

fn abort_update(_ctx: &mut RunContext) -> Option<BakeState> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsm::Fsm;
    use crate::profile::bake_profile;
    use crate::settings::OvenSettings;

    fn make_run() -> (Fsm<BakeState, { BakeState::COUNT }>, RunContext) {
        let settings = OvenSettings::default();
        let profile = bake_profile(settings.bake_temperature_c, settings.bake_duration_secs);
        let mut ctx = RunContext::new(settings, profile);
        ctx.begin_run(25.0);
        let mut fsm = Fsm::new(build_state_table(), BakeState::Init);
        fsm.start(&mut ctx);
        fsm.tick(&mut ctx); // Init -> Heatup
        (fsm, ctx)
    }

    #[test]
    fn heatup_exits_just_below_target() {
        let (mut fsm, mut ctx) = make_run();
        let target = ctx.settings.bake_temperature_c;

        ctx.temperature_c = target - 20.0;
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), BakeState::Heatup);

        ctx.temperature_c = target - 10.0;
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), BakeState::Bake);
    }

    #[test]
    fn thermostat_cuts_and_restores_heat_during_bake() {
        let (mut fsm, mut ctx) = make_run();
        let target = ctx.settings.bake_temperature_c;
        fsm.force_transition(BakeState::Bake, &mut ctx);

        ctx.temperature_c = target + 0.5;
        fsm.tick(&mut ctx);
        assert_eq!(ctx.commands.duty, [0; 4]);

        ctx.temperature_c = target - 2.0;
        fsm.tick(&mut ctx);
        assert_eq!(ctx.commands.duty, ctx.settings.heating_duties(DutySlot::Soak));
    }

    #[test]
    fn bake_runs_for_configured_duration() {
        let (mut fsm, mut ctx) = make_run();
        fsm.force_transition(BakeState::Bake, &mut ctx);
        ctx.temperature_c = ctx.settings.bake_temperature_c;

        ctx.elapsed_in_phase_secs = ctx.settings.bake_duration_secs - 1;
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), BakeState::Bake);

        ctx.elapsed_in_phase_secs = ctx.settings.bake_duration_secs;
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), BakeState::StartCooling);
        assert_eq!(ctx.outcome, RunOutcome::Completed);
        assert_eq!(ctx.pending_tune, Some(Tune::Done));
    }

    #[test]
    fn cooling_holds_with_fan_until_cool() {
        let (mut fsm, mut ctx) = make_run();
        fsm.force_transition(BakeState::StartCooling, &mut ctx);
        ctx.temperature_c = 110.0;
        fsm.tick(&mut ctx); // StartCooling -> Cooling
        assert_eq!(fsm.current_state(), BakeState::Cooling);
        assert!(ctx.commands.cooling_fan);
        assert_eq!(ctx.commands.duty, [0; 4]);

        ctx.temperature_c = 45.0;
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), BakeState::Cooling);
        assert!(!ctx.commands.cooling_fan);
    }

    #[test]
    fn fault_during_bake_aborts_with_heaters_off() {
        let (mut fsm, mut ctx) = make_run();
        fsm.force_transition(BakeState::Bake, &mut ctx);
        ctx.fault_flags = crate::error::SafetyFault::OverTemperature.mask();
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), BakeState::Abort);
        assert_eq!(ctx.commands.duty, [0; 4]);
        assert_eq!(ctx.outcome, RunOutcome::Aborted);
    }
}
