//! Reflow state machine: handlers and table builder.
//!
//! ```text
//!  INIT ─▶ PRESOAK ─▶ SOAK ─▶ REFLOW ─▶ WAITING ─▶ COOLING (boards in)
//!                                                      │
//!                                           [temp < 100 C, open door]
//!                                                      ▼
//!                                         COOLING (boards out, terminal)
//!
//!  Any state ──[fault or abort command]──▶ ABORT (terminal)
//! ```
//!
//! Each phase's duty cycles and fan policy come from the profile via
//! [`RunContext::enter_phase`]; exit conditions are evaluated every tick
//! after the fault/abort checks. Both terminal states hold until the user
//! acknowledges.

use log::{info, warn};

use super::context::{OutputCommands, RunContext, RunOutcome};
use super::StateDescriptor;
use crate::app::events::Tune;
use crate::profile::{PhaseExit, PhaseKind};

/// Reflow run states, in forward order. Abort is last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflowState {
    Init,
    Presoak,
    Soak,
    Reflow,
    Waiting,
    CoolingBoardsIn,
    CoolingBoardsOut,
    Abort,
}

impl ReflowState {
    /// Total number of states — sizes the table array.
    pub const COUNT: usize = 8;

    /// The phase kind this state reports and records as.
    pub const fn kind(self) -> PhaseKind {
        match self {
            Self::Init => PhaseKind::Init,
            Self::Presoak => PhaseKind::Presoak,
            Self::Soak => PhaseKind::Soak,
            Self::Reflow => PhaseKind::Reflow,
            Self::Waiting => PhaseKind::Waiting,
            Self::CoolingBoardsIn => PhaseKind::CoolingBoardsIn,
            Self::CoolingBoardsOut => PhaseKind::CoolingBoardsOut,
            Self::Abort => PhaseKind::Abort,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static reflow state table. Called once per run.
pub fn build_state_table() -> [StateDescriptor<ReflowState>; ReflowState::COUNT] {
    [
        StateDescriptor {
            id: ReflowState::Init,
            name: PhaseKind::Init.name(),
            on_enter: None,
            on_exit: None,
            on_update: init_update,
        },
        StateDescriptor {
            id: ReflowState::Presoak,
            name: PhaseKind::Presoak.name(),
            on_enter: Some(presoak_enter),
            on_exit: None,
            on_update: presoak_update,
        },
        StateDescriptor {
            id: ReflowState::Soak,
            name: PhaseKind::Soak.name(),
            on_enter: Some(soak_enter),
            on_exit: None,
            on_update: soak_update,
        },
        StateDescriptor {
            id: ReflowState::Reflow,
            name: PhaseKind::Reflow.name(),
            on_enter: Some(reflow_enter),
            on_exit: None,
            on_update: reflow_update,
        },
        StateDescriptor {
            id: ReflowState::Waiting,
            name: PhaseKind::Waiting.name(),
            on_enter: Some(waiting_enter),
            on_exit: None,
            on_update: waiting_update,
        },
        StateDescriptor {
            id: ReflowState::CoolingBoardsIn,
            name: PhaseKind::CoolingBoardsIn.name(),
            on_enter: Some(cooling_in_enter),
            on_exit: None,
            on_update: cooling_in_update,
        },
        StateDescriptor {
            id: ReflowState::CoolingBoardsOut,
            name: PhaseKind::CoolingBoardsOut.name(),
            on_enter: Some(cooling_out_enter),
            on_exit: None,
            on_update: cooling_out_update,
        },
        StateDescriptor {
            id: ReflowState::Abort,
            name: PhaseKind::Abort.name(),
            on_enter: Some(abort_enter),
            on_exit: None,
            on_update: abort_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  INIT — one tick of bookkeeping, then straight into the ramp
// ═══════════════════════════════════════════════════════════════════════════

fn init_update(ctx: &mut RunContext) -> Option<ReflowState> {
    if ctx.abort_demanded() {
        return Some(ReflowState::Abort);
    }
    Some(ReflowState::Presoak)
}

// ═══════════════════════════════════════════════════════════════════════════
//  PRESOAK — ramp to the soak entry temperature
// ═══════════════════════════════════════════════════════════════════════════

fn presoak_enter(ctx: &mut RunContext) {
    ctx.enter_phase(PhaseKind::Presoak);
}

fn presoak_update(ctx: &mut RunContext) -> Option<ReflowState> {
    if ctx.abort_demanded() {
        return Some(ReflowState::Abort);
    }
    if ctx.phase_exit_met() {
        return Some(ReflowState::Soak);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  SOAK — equalise board and component temperature
// ═══════════════════════════════════════════════════════════════════════════

fn soak_enter(ctx: &mut RunContext) {
    ctx.enter_phase(PhaseKind::Soak);
}

fn soak_update(ctx: &mut RunContext) -> Option<ReflowState> {
    if ctx.abort_demanded() {
        return Some(ReflowState::Abort);
    }
    if ctx.phase_exit_met() {
        return Some(ReflowState::Reflow);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  REFLOW — push to the peak, cut heat at target, wait for the decline
// ═══════════════════════════════════════════════════════════════════════════

fn reflow_enter(ctx: &mut RunContext) {
    ctx.enter_phase(PhaseKind::Reflow);
}

fn reflow_update(ctx: &mut RunContext) -> Option<ReflowState> {
    if ctx.abort_demanded() {
        return Some(ReflowState::Abort);
    }
    // Once the peak target has been seen, heating stays off for the rest of
    // the phase: the elements only coast the temperature past the peak.
    if let Some(PhaseExit::PeakDecline { target_c }) =
        ctx.profile.spec(PhaseKind::Reflow).map(|s| s.exit)
    {
        if ctx.peak_c >= target_c {
            ctx.heaters_off();
        }
    }
    if ctx.phase_exit_met() {
        return Some(ReflowState::Waiting);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  WAITING — elements off, let the heat permeate before cooling
// ═══════════════════════════════════════════════════════════════════════════

fn waiting_enter(ctx: &mut RunContext) {
    ctx.enter_phase(PhaseKind::Waiting);
    ctx.request_tune(Tune::Done);
    info!("Waiting: peak was {:.1}\u{00b0}C", ctx.peak_c);
}

fn waiting_update(ctx: &mut RunContext) -> Option<ReflowState> {
    if ctx.abort_demanded() {
        return Some(ReflowState::Abort);
    }
    if ctx.phase_exit_met() {
        return Some(ReflowState::CoolingBoardsIn);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  COOLING, boards in — door open, fan on, components still settling
// ═══════════════════════════════════════════════════════════════════════════

fn cooling_in_enter(ctx: &mut RunContext) {
    ctx.enter_phase(PhaseKind::CoolingBoardsIn);
}

fn cooling_in_update(ctx: &mut RunContext) -> Option<ReflowState> {
    if ctx.abort_demanded() {
        return Some(ReflowState::Abort);
    }
    if ctx.phase_exit_met() {
        return Some(ReflowState::CoolingBoardsOut);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  COOLING, boards out — run complete; hold until acknowledged
// ═══════════════════════════════════════════════════════════════════════════

fn cooling_out_enter(ctx: &mut RunContext) {
    ctx.enter_phase(PhaseKind::CoolingBoardsOut);
    ctx.outcome = RunOutcome::Completed;
    ctx.request_tune(Tune::RemoveBoards);
    info!("Reflow complete, boards can come out");
}

fn cooling_out_update(ctx: &mut RunContext) -> Option<ReflowState> {
    if ctx.abort_demanded() {
        return Some(ReflowState::Abort);
    }
    // Once back below the safe-start threshold the fan can stop; the run
    // stays here until the user acknowledges.
    if ctx.phase_exit_met() {
        ctx.commands.cooling_fan = false;
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  ABORT — fault or user abort; heaters off, cooling fan on, terminal
// ═══════════════════════════════════════════════════════════════════════════

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

fn abort_update(_ctx: &mut RunContext) -> Option<ReflowState> {
    // Terminal: await acknowledgement.
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsm::Fsm;
    use crate::profile::reflow_profile;
    use crate::settings::OvenSettings;

    fn make_run() -> (Fsm<ReflowState, { ReflowState::COUNT }>, RunContext) {
        let settings = OvenSettings::default();
        let profile = reflow_profile(settings.max_temperature_c);
        let mut ctx = RunContext::new(settings, profile);
        ctx.begin_run(25.0);
        let mut fsm = Fsm::new(build_state_table(), ReflowState::Init);
        fsm.start(&mut ctx);
        fsm.tick(&mut ctx); // Init -> Presoak
        (fsm, ctx)
    }

    #[test]
    fn presoak_holds_below_threshold_and_exits_at_it() {
        let (mut fsm, mut ctx) = make_run();
        for t in [60.0, 100.0, 149.9] {
            ctx.temperature_c = t;
            ctx.peak_c = t;
            fsm.tick(&mut ctx);
            assert_eq!(fsm.current_state(), ReflowState::Presoak, "at {t}");
        }
        ctx.temperature_c = 150.0;
        ctx.peak_c = 150.0;
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), ReflowState::Soak);
    }

    #[test]
    fn presoak_sets_heating_duties_from_settings() {
        let (_fsm, ctx) = make_run();
        let expected = ctx
            .settings
            .heating_duties(crate::profile::DutySlot::Presoak);
        assert_eq!(ctx.commands.duty, expected);
        assert!(ctx.commands.convection_fan);
    }

    #[test]
    fn reflow_cuts_heat_at_peak_and_exits_on_decline() {
        let (mut fsm, mut ctx) = make_run();
        fsm.force_transition(ReflowState::Reflow, &mut ctx);
        assert!(ctx.commands.duty.iter().any(|&d| d > 0));

        // Reached the peak target: heat must cut, state must hold.
        ctx.temperature_c = 240.0;
        ctx.peak_c = 240.0;
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), ReflowState::Reflow);
        assert_eq!(ctx.commands.duty, [0; 4]);

        // Decline observed: transition to Waiting.
        ctx.temperature_c = 238.5;
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), ReflowState::Waiting);
    }

    #[test]
    fn cooling_out_marks_completed_and_holds_for_ack() {
        let (mut fsm, mut ctx) = make_run();
        fsm.force_transition(ReflowState::CoolingBoardsOut, &mut ctx);
        assert_eq!(ctx.outcome, RunOutcome::Completed);
        assert_eq!(ctx.pending_tune, Some(Tune::RemoveBoards));
        assert!(ctx.commands.cooling_fan);

        // Cooled past the threshold: fan stops but the state holds.
        ctx.temperature_c = 45.0;
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), ReflowState::CoolingBoardsOut);
        assert!(!ctx.commands.cooling_fan);
    }

    #[test]
    fn fault_aborts_from_any_phase_with_heaters_off() {
        for state in [
            ReflowState::Presoak,
            ReflowState::Soak,
            ReflowState::Reflow,
            ReflowState::Waiting,
            ReflowState::CoolingBoardsIn,
        ] {
            let (mut fsm, mut ctx) = make_run();
            fsm.force_transition(state, &mut ctx);
            ctx.fault_flags = crate::error::SafetyFault::ThermocoupleOpen.mask();
            fsm.tick(&mut ctx);
            assert_eq!(fsm.current_state(), ReflowState::Abort, "from {state:?}");
            assert_eq!(ctx.commands.duty, [0; 4]);
            assert!(ctx.commands.cooling_fan);
            assert_eq!(ctx.outcome, RunOutcome::Aborted);
        }
    }

    #[test]
    fn user_abort_is_honoured_at_next_tick() {
        let (mut fsm, mut ctx) = make_run();
        ctx.abort_requested = true;
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), ReflowState::Abort);
    }

    #[test]
    fn abort_after_completion_keeps_completed_outcome() {
        let (mut fsm, mut ctx) = make_run();
        fsm.force_transition(ReflowState::CoolingBoardsOut, &mut ctx);
        assert_eq!(ctx.outcome, RunOutcome::Completed);
        ctx.abort_requested = true;
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), ReflowState::Abort);
        assert_eq!(ctx.outcome, RunOutcome::Completed);
    }
}
