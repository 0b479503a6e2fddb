//! Oven service — the hexagonal core.
//!
//! [`OvenService`] owns the active run (reflow FSM, bake FSM, or one of the
//! non-thermal modes), the safety supervisor, the duty-cycle controller, and
//! the shared [`RunContext`]. All I/O flows through port traits injected at
//! call sites, making the entire service testable with mock adapters.
//!
//! ```text
//!  ThermocouplePort ──▶ ┌─────────────────────────────┐ ──▶ EventSink
//!                       │         OvenService          │
//!       OutputPort ◀────│  FSM · Safety · DutyCycle    │◀── ClockPort
//!                       └─────────────────────────────┘
//! ```
//!
//! ## Tick pipeline
//!
//! Every control tick runs the same ordered pipeline:
//!
//! 1. read the thermocouple
//! 2. evaluate safety (latched bitmask)
//! 3. on a fresh fault, force the active run into ABORT
//! 4. tick the FSM (phase logic, exit conditions)
//! 5. slice duty percentages into per-channel on/off
//! 6. apply the outputs
//! 7. emit events (phase change, status, tunes, run end)
//!
//! A fault therefore reaches the relays on the very tick that raised it:
//! the abort handler zeroes the commands *before* step 6 applies them.

use log::{info, warn};

use crate::channels::{ChannelId, OutputType, CHANNEL_COUNT};
use crate::control::duty::DutyCycleController;
use crate::fsm::bake::{self, BakeState};
use crate::fsm::context::{PhaseExitRecord, RunContext, RunOutcome};
use crate::fsm::reflow::{self, ReflowState};
use crate::fsm::Fsm;
use crate::learning;
use crate::profile::{bake_profile, reflow_profile, PhaseKind, Profile, SAFE_START_TEMP_C};
use crate::safety::SafetySupervisor;
use crate::settings::{OvenSettings, SettingsRepository};

use super::commands::{Mode, OvenCommand};
use super::events::{OvenEvent, StartRejection, StatusReport, Tune};
use super::ports::{ClockPort, EventSink, OutputPort, StoragePort, ThermocouplePort};

/// How long each configured output stays on during the wiring test.
const TEST_TICKS_PER_OUTPUT: u32 = 3;

/// What the service is currently running.
enum ActiveRun {
    /// Nothing active; all outputs off.
    Idle,
    /// Wiring check: each configured output exercised in turn.
    Testing { ticks: u32 },
    /// Settings are being edited; outputs held off.
    Config,
    Reflow(Fsm<ReflowState, { ReflowState::COUNT }>),
    Bake(Fsm<BakeState, { BakeState::COUNT }>),
}

impl ActiveRun {
    fn mode(&self) -> Option<Mode> {
        match self {
            Self::Idle => None,
            Self::Testing { .. } => Some(Mode::Testing),
            Self::Config => Some(Mode::Config),
            Self::Reflow(_) => Some(Mode::Reflow),
            Self::Bake(_) => Some(Mode::Bake),
        }
    }
}

/// The oven service orchestrates all domain logic.
pub struct OvenService {
    run: ActiveRun,
    ctx: RunContext,
    safety: SafetySupervisor,
    duty: DutyCycleController,
    /// Wall-clock anchor of the current phase (ms from the injected clock).
    phase_entry_ms: u64,
    /// Start request waiting for the next tick's temperature reading.
    pending_start: Option<Mode>,
    /// Learning already committed for the current run.
    learning_done: bool,
    /// Terminal outcome already announced for the current run.
    outcome_reported: bool,
    /// Settings modified since the last successful save.
    settings_dirty: bool,
    tick_count: u64,
}

impl OvenService {
    /// Construct the service around loaded settings.
    ///
    /// Does **not** start a run — the service idles until a `Start` command.
    pub fn new(settings: OvenSettings) -> Self {
        let safety = SafetySupervisor::new(settings.max_temperature_c);
        let ctx = RunContext::new(settings, Profile::default());
        Self {
            run: ActiveRun::Idle,
            ctx,
            safety,
            duty: DutyCycleController::new(),
            phase_entry_ms: 0,
            pending_start: None,
            learning_done: false,
            outcome_reported: false,
            settings_dirty: false,
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Announce the service; call once before the first `tick()`.
    pub fn start(&mut self, sink: &mut impl EventSink) {
        sink.emit(&OvenEvent::Started);
        info!("OvenService started, idle");
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle.
    ///
    /// The `hw` parameter satisfies **both** [`ThermocouplePort`] and
    /// [`OutputPort`] — this avoids a double mutable borrow while keeping
    /// the port boundary explicit.
    pub fn tick(
        &mut self,
        hw: &mut (impl ThermocouplePort + OutputPort),
        clock: &impl ClockPort,
        sink: &mut impl EventSink,
    ) {
        self.tick_count += 1;
        let now_ms = clock.now_ms();

        // 1. Read the thermocouple.
        let reading = hw.read();
        if let Ok(temp_c) = reading {
            self.ctx.temperature_c = temp_c;
            if temp_c > self.ctx.peak_c {
                self.ctx.peak_c = temp_c;
            }
        }

        // 2. Safety evaluation (bits latch for the rest of the run).
        self.safety.evaluate(reading);

        // 3. Accept or reject a queued start now that a reading exists.
        // An accepted start resets the supervisor, so the mask is sampled
        // afterwards: a run never begins pre-aborted by stale latches.
        if let Some(mode) = self.pending_start.take() {
            self.try_start(mode, reading.is_ok(), now_ms, sink);
        }
        let faults = self.safety.faults();
        self.ctx.fault_flags = faults;

        // 4. Advance the active run. A fault is fatal in every mode: the
        // wiring check drives real heaters too, so Testing and Config end
        // as aborted the same tick the sensor goes bad.
        match &mut self.run {
            ActiveRun::Idle => {
                self.ctx.commands = Default::default();
            }
            ActiveRun::Config => {
                self.ctx.commands = Default::default();
                if faults != 0 || self.ctx.abort_requested {
                    self.abort_non_thermal(faults, sink);
                }
            }
            ActiveRun::Testing { ticks } => {
                *ticks += 1;
                if faults != 0 || self.ctx.abort_requested {
                    self.abort_non_thermal(faults, sink);
                }
            }
            ActiveRun::Reflow(_) | ActiveRun::Bake(_) => {
                self.tick_thermal_run(faults, now_ms, sink);
            }
        }

        // 5.–6. Slice duties and drive the relays.
        self.apply_outputs(hw);
        self.duty.advance();

        // 7. Events: queued tune, run end, periodic status.
        if let Some(tune) = self.ctx.pending_tune.take() {
            sink.emit(&OvenEvent::Tune(tune));
        }
        self.report_outcome(sink);
        sink.emit(&OvenEvent::Status(self.status()));
    }

    /// FSM-driven part of the tick, shared by reflow and bake.
    fn tick_thermal_run(&mut self, faults: u8, now_ms: u64, sink: &mut impl EventSink) {
        // Wall-clock phase timing: re-derive elapsed from the entry anchor
        // so a late tick cannot drift the phase duration.
        self.ctx.elapsed_in_phase_secs =
            (now_ms.saturating_sub(self.phase_entry_ms) / 1000) as u32;

        let prev_kind = self.ctx.phase_kind;
        let elapsed_before = self.ctx.elapsed_in_phase_secs;
        let fresh_fault = faults != 0 && prev_kind != PhaseKind::Abort;

        if fresh_fault {
            warn!("Safety fault! flags=0b{faults:08b}");
            sink.emit(&OvenEvent::FaultDetected(faults));
        }

        match &mut self.run {
            ActiveRun::Reflow(fsm) => {
                if fresh_fault {
                    fsm.force_transition(ReflowState::Abort, &mut self.ctx);
                }
                fsm.tick(&mut self.ctx);
            }
            ActiveRun::Bake(fsm) => {
                if fresh_fault {
                    fsm.force_transition(BakeState::Abort, &mut self.ctx);
                }
                fsm.tick(&mut self.ctx);
            }
            _ => unreachable!("tick_thermal_run called without an FSM"),
        }

        if self.ctx.phase_kind != prev_kind {
            self.on_phase_changed(prev_kind, elapsed_before, now_ms, sink);
        }
    }

    /// Bookkeeping for a phase transition: record the exited phase for the
    /// learning engine, re-anchor the clock, restart the duty period.
    fn on_phase_changed(
        &mut self,
        prev_kind: PhaseKind,
        elapsed_secs: u32,
        now_ms: u64,
        sink: &mut impl EventSink,
    ) {
        if let Some(spec) = self.ctx.profile.spec(prev_kind) {
            let record = PhaseExitRecord {
                kind: prev_kind,
                elapsed_secs,
                reached_target: spec.target_reached(self.ctx.temperature_c, self.ctx.peak_c),
            };
            let _ = self.ctx.records.push(record);
        }
        self.phase_entry_ms = now_ms;
        self.duty.reset();
        sink.emit(&OvenEvent::PhaseChanged {
            from: prev_kind.name(),
            to: self.ctx.phase_kind.name(),
            elapsed_secs,
            temperature_c: self.ctx.temperature_c,
        });
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command (front panel, serial console).
    ///
    /// Commands only set flags or queue work: everything takes effect at
    /// the next tick boundary, so the tick pipeline stays the single place
    /// where outputs change.
    pub fn handle_command(&mut self, cmd: OvenCommand, sink: &mut impl EventSink) {
        match cmd {
            OvenCommand::Start(mode) => {
                if self.run.mode().is_some() {
                    sink.emit(&OvenEvent::StartRejected(StartRejection::AlreadyRunning));
                    return;
                }
                self.pending_start = Some(mode);
            }
            OvenCommand::Abort => {
                if self.run.mode().is_some() {
                    info!("Abort requested");
                    self.ctx.abort_requested = true;
                }
            }
            OvenCommand::Acknowledge => {
                if self.run_is_terminal() {
                    self.finish_run(sink);
                }
            }
            OvenCommand::UpdateSettings(new_settings) => {
                match self.run {
                    ActiveRun::Reflow(_) | ActiveRun::Bake(_) => {
                        warn!("Settings update ignored during an active run");
                    }
                    _ => {
                        self.ctx.settings = new_settings;
                        self.safety = SafetySupervisor::new(self.ctx.settings.max_temperature_c);
                        self.settings_dirty = true;
                        info!("Settings updated");
                    }
                }
            }
        }
    }

    // ── Post-tick persistence ─────────────────────────────────

    /// Commit a finished run's results: run the learning engine exactly once
    /// per completed run, then flush dirty settings to the store. Called
    /// from the main loop after `tick()`. Returns `true` if a save happened.
    pub fn commit_run_results(
        &mut self,
        store: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) -> bool {
        let thermal = matches!(self.run, ActiveRun::Reflow(_) | ActiveRun::Bake(_));
        if thermal && self.ctx.outcome == RunOutcome::Completed && !self.learning_done {
            self.learning_done = true;
            let changed = learning::adjust(
                &mut self.ctx.settings,
                &self.ctx.profile,
                &self.ctx.records,
                self.ctx.outcome,
            );
            if changed {
                self.settings_dirty = true;
                sink.emit(&OvenEvent::DutyCyclesAdjusted);
            }
        }

        if !self.settings_dirty {
            return false;
        }
        match SettingsRepository::save(store, &self.ctx.settings) {
            Ok(()) => {
                self.settings_dirty = false;
                true
            }
            Err(e) => {
                warn!("Settings save failed: {e}");
                false
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Point-in-time status snapshot.
    pub fn status(&self) -> StatusReport {
        let phase = match self.run {
            ActiveRun::Idle => "Idle",
            ActiveRun::Testing { .. } => "Testing",
            ActiveRun::Config => "Config",
            ActiveRun::Reflow(_) | ActiveRun::Bake(_) => self.ctx.phase_kind.name(),
        };
        StatusReport {
            mode: self.run.mode(),
            phase,
            elapsed_secs: self.ctx.elapsed_in_phase_secs,
            temperature_c: self.ctx.temperature_c,
            fault_flags: self.ctx.fault_flags,
        }
    }

    /// Active mode, `None` when idle.
    pub fn mode(&self) -> Option<Mode> {
        self.run.mode()
    }

    /// Current active fault bitmask (0 = no faults).
    pub fn fault_flags(&self) -> u8 {
        self.ctx.fault_flags
    }

    /// Clone of the live settings (for the config UI's read-back).
    pub fn current_settings(&self) -> OvenSettings {
        self.ctx.settings.clone()
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    // ── Internal ──────────────────────────────────────────────

    /// Safe-start gate and run construction.
    fn try_start(&mut self, mode: Mode, reading_ok: bool, now_ms: u64, sink: &mut impl EventSink) {
        if !reading_ok {
            sink.emit(&OvenEvent::StartRejected(StartRejection::SensorFault));
            return;
        }
        let temp_c = self.ctx.temperature_c;
        let needs_cool_oven = matches!(mode, Mode::Reflow | Mode::Bake);
        if needs_cool_oven && temp_c > SAFE_START_TEMP_C {
            warn!("Start rejected: oven at {temp_c:.1}\u{00b0}C, must be below {SAFE_START_TEMP_C:.0}");
            sink.emit(&OvenEvent::StartRejected(StartRejection::OvenTooHot {
                temperature_c: temp_c,
            }));
            return;
        }

        // Previous run's latched faults are cleared by an accepted start.
        self.safety.reset();
        self.ctx.fault_flags = 0;
        self.ctx.begin_run(temp_c);
        self.learning_done = false;
        self.outcome_reported = false;
        self.duty.reset();
        self.phase_entry_ms = now_ms;

        self.run = match mode {
            Mode::Testing => ActiveRun::Testing { ticks: 0 },
            Mode::Config => ActiveRun::Config,
            Mode::Reflow => {
                self.ctx.profile = reflow_profile(self.ctx.settings.max_temperature_c);
                let mut fsm = Fsm::new(reflow::build_state_table(), ReflowState::Init);
                fsm.start(&mut self.ctx);
                ActiveRun::Reflow(fsm)
            }
            Mode::Bake => {
                self.ctx.profile = bake_profile(
                    self.ctx.settings.bake_temperature_c,
                    self.ctx.settings.bake_duration_secs,
                );
                let mut fsm = Fsm::new(bake::build_state_table(), BakeState::Init);
                fsm.start(&mut self.ctx);
                ActiveRun::Bake(fsm)
            }
        };
        info!("{} started at {temp_c:.1}\u{00b0}C", mode.name());
        sink.emit(&OvenEvent::Tune(Tune::Start));
    }

    /// Whether the active run sits in a state that `Acknowledge` may leave.
    fn run_is_terminal(&self) -> bool {
        match &self.run {
            ActiveRun::Idle => false,
            ActiveRun::Testing { .. } | ActiveRun::Config => true,
            ActiveRun::Reflow(fsm) => matches!(
                fsm.current_state(),
                ReflowState::Abort | ReflowState::CoolingBoardsOut
            ),
            ActiveRun::Bake(fsm) => {
                matches!(fsm.current_state(), BakeState::Abort | BakeState::Cooling)
            }
        }
    }

    /// Testing and Config have no abort state to hold in: a fault or an
    /// abort command ends the run immediately, outputs off on this tick.
    fn abort_non_thermal(&mut self, faults: u8, sink: &mut impl EventSink) {
        if faults != 0 {
            warn!("Safety fault! flags=0b{faults:08b}");
            sink.emit(&OvenEvent::FaultDetected(faults));
        }
        self.ctx.outcome = RunOutcome::Aborted;
        self.finish_run(sink);
    }

    /// Return to idle with all outputs off.
    fn finish_run(&mut self, sink: &mut impl EventSink) {
        self.report_outcome(sink);
        self.run = ActiveRun::Idle;
        self.ctx.commands = Default::default();
        self.ctx.abort_requested = false;
        info!("Run finished, back to idle");
    }

    /// Announce a terminal outcome exactly once per run.
    fn report_outcome(&mut self, sink: &mut impl EventSink) {
        if self.outcome_reported {
            return;
        }
        match (self.run.mode(), self.ctx.outcome) {
            (Some(mode), RunOutcome::Completed) => {
                self.outcome_reported = true;
                sink.emit(&OvenEvent::RunCompleted { mode });
            }
            (Some(_), RunOutcome::Aborted) => {
                self.outcome_reported = true;
                sink.emit(&OvenEvent::RunAborted {
                    fault_flags: self.ctx.fault_flags,
                });
            }
            _ => {}
        }
    }

    /// Translate commands into relay states and push them through the port.
    fn apply_outputs(&mut self, hw: &mut impl OutputPort) {
        let desired = match &self.run {
            ActiveRun::Idle | ActiveRun::Config => [false; CHANNEL_COUNT],
            ActiveRun::Testing { ticks } => self.testing_outputs(*ticks),
            ActiveRun::Reflow(_) | ActiveRun::Bake(_) => self.run_outputs(),
        };
        for (i, ch) in ChannelId::ALL.into_iter().enumerate() {
            hw.set_channel(ch, desired[i]);
        }
    }

    /// Per-channel relay states for an active thermal run.
    fn run_outputs(&self) -> [bool; CHANNEL_COUNT] {
        let heater_on = self.duty.outputs_for_tick(&self.ctx.commands.duty);
        let mut out = [false; CHANNEL_COUNT];
        for (i, ty) in self.ctx.settings.output_types.iter().enumerate() {
            out[i] = match ty {
                OutputType::Unused => false,
                // Heaters are double-gated: phase duty AND a clean fault mask.
                OutputType::TopElement | OutputType::BottomElement | OutputType::BoostElement => {
                    heater_on[i] && !self.safety.has_faults()
                }
                OutputType::ConvectionFan => self.ctx.commands.convection_fan,
                OutputType::CoolingFan => self.ctx.commands.cooling_fan,
            };
        }
        out
    }

    /// Wiring check: one configured output on at a time, round-robin.
    fn testing_outputs(&self, ticks: u32) -> [bool; CHANNEL_COUNT] {
        let active = ((ticks / TEST_TICKS_PER_OUTPUT) as usize) % CHANNEL_COUNT;
        let mut out = [false; CHANNEL_COUNT];
        if self.ctx.settings.output_types[active] != OutputType::Unused {
            out[active] = true;
        }
        out
    }
}
