//! End-to-end runs of the oven service against the simulated plant.
//!
//! Every test wires the real service to the simulated oven, a manual
//! clock, an in-memory store, and a recording event sink — the same
//! composition as the host binary, minus the logger.

use reflow_wizard::adapters::memory_store::MemoryStore;
use reflow_wizard::adapters::sim_oven::SimulatedOven;
use reflow_wizard::adapters::time::ManualClock;
use reflow_wizard::app::commands::{Mode, OvenCommand};
use reflow_wizard::app::events::{OvenEvent, StartRejection, Tune};
use reflow_wizard::app::ports::{EventSink, StoragePort};
use reflow_wizard::app::service::OvenService;
use reflow_wizard::channels::ChannelId;
use reflow_wizard::error::{SafetyFault, ThermocoupleFault};
use reflow_wizard::profile::{PhaseKind, SAFE_START_TEMP_C};
use reflow_wizard::settings::{OvenSettings, SettingsRepository, SETTINGS_KEY, SETTINGS_NAMESPACE};

/// Event sink that records everything for later assertions.
#[derive(Default)]
struct RecordingSink {
    events: Vec<OvenEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &OvenEvent) {
        self.events.push(event.clone());
    }
}

impl RecordingSink {
    fn phase_transitions(&self) -> Vec<(&'static str, &'static str)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                OvenEvent::PhaseChanged { from, to, .. } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }

    fn completed(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, OvenEvent::RunCompleted { .. }))
    }

    fn aborted_flags(&self) -> Option<u8> {
        self.events.iter().find_map(|e| match e {
            OvenEvent::RunAborted { fault_flags } => Some(*fault_flags),
            _ => None,
        })
    }

    fn rejection(&self) -> Option<StartRejection> {
        self.events.iter().find_map(|e| match e {
            OvenEvent::StartRejected(r) => Some(*r),
            _ => None,
        })
    }
}

struct Harness {
    oven: SimulatedOven,
    clock: ManualClock,
    store: MemoryStore,
    sink: RecordingSink,
    service: OvenService,
}

impl Harness {
    fn new() -> Self {
        let mut store = MemoryStore::new();
        let settings = SettingsRepository::load(&mut store);
        Self::with_settings(store, settings)
    }

    fn with_settings(mut store: MemoryStore, settings: OvenSettings) -> Self {
        SettingsRepository::save(&mut store, &settings).unwrap();
        let oven = SimulatedOven::new(settings.output_types, 1.0);
        let mut sink = RecordingSink::default();
        let mut service = OvenService::new(settings);
        service.start(&mut sink);
        Self {
            oven,
            clock: ManualClock::new(),
            store,
            sink,
            service,
        }
    }

    /// One simulated second: advance the clock, run the pipeline, commit.
    fn step(&mut self) {
        self.clock.advance_secs(1);
        self.service
            .tick(&mut self.oven, &self.clock, &mut self.sink);
        self.service
            .commit_run_results(&mut self.store, &mut self.sink);
    }

    fn start(&mut self, mode: Mode) {
        self.service
            .handle_command(OvenCommand::Start(mode), &mut self.sink);
    }

    fn stored_blob(&self) -> Vec<u8> {
        let mut buf = [0u8; 64];
        let n = self
            .store
            .read(SETTINGS_NAMESPACE, SETTINGS_KEY, &mut buf)
            .unwrap_or(0);
        buf[..n].to_vec()
    }

    fn heaters_all_off(&self) -> bool {
        // Default wiring: D4..D6 are heating elements.
        !self.oven.is_on(ChannelId::D4)
            && !self.oven.is_on(ChannelId::D5)
            && !self.oven.is_on(ChannelId::D6)
    }
}

#[test]
fn reflow_run_walks_every_phase_and_completes() {
    let mut h = Harness::new();
    h.start(Mode::Reflow);

    for _ in 0..3600 {
        h.step();
        let status = h.service.status();
        if status.phase == PhaseKind::CoolingBoardsOut.name()
            && status.temperature_c <= SAFE_START_TEMP_C
        {
            h.service
                .handle_command(OvenCommand::Acknowledge, &mut h.sink);
        }
        if h.service.mode().is_none() {
            break;
        }
    }
    assert!(h.service.mode().is_none(), "run did not finish");
    assert!(h.sink.completed());
    assert_eq!(h.sink.aborted_flags(), None);

    let transitions = h.sink.phase_transitions();
    let visited: Vec<&str> = transitions.iter().map(|(_, to)| *to).collect();
    assert_eq!(
        visited,
        [
            PhaseKind::Presoak.name(),
            PhaseKind::Soak.name(),
            PhaseKind::Reflow.name(),
            PhaseKind::Waiting.name(),
            PhaseKind::CoolingBoardsIn.name(),
            PhaseKind::CoolingBoardsOut.name(),
        ]
    );

    // The oven actually got hot and came back down.
    assert!(h.oven.temperature_c() <= SAFE_START_TEMP_C + 1.0);

    // Whatever the learning engine decided is what a restart will load.
    let persisted = SettingsRepository::load(&mut h.store);
    assert_eq!(persisted, h.service.current_settings());
}

#[test]
fn start_is_rejected_while_the_oven_is_hot() {
    let mut h = Harness::new();
    h.oven.set_temperature(80.0);
    h.start(Mode::Reflow);
    h.step();

    assert!(matches!(
        h.sink.rejection(),
        Some(StartRejection::OvenTooHot { .. })
    ));
    assert_eq!(h.service.mode(), None);
    assert_eq!(h.service.status().phase, "Idle");
    assert!(h.heaters_all_off());
}

#[test]
fn start_is_rejected_on_a_faulted_sensor() {
    let mut h = Harness::new();
    h.oven.set_fault(Some(ThermocoupleFault::ShortToGround));
    h.start(Mode::Reflow);
    h.step();

    assert_eq!(h.sink.rejection(), Some(StartRejection::SensorFault));
    assert_eq!(h.service.mode(), None);
}

#[test]
fn second_start_is_rejected_while_running() {
    let mut h = Harness::new();
    h.start(Mode::Reflow);
    h.step();
    h.start(Mode::Bake);
    assert_eq!(h.sink.rejection(), Some(StartRejection::AlreadyRunning));
    assert_eq!(h.service.mode(), Some(Mode::Reflow));
}

#[test]
fn sensor_fault_kills_heaters_on_the_same_tick() {
    let mut h = Harness::new();
    h.start(Mode::Reflow);

    // Well into presoak, heaters cycling.
    for _ in 0..30 {
        h.step();
    }
    assert_eq!(h.service.status().phase, PhaseKind::Presoak.name());

    h.oven.set_fault(Some(ThermocoupleFault::Open));
    h.step();

    // The very tick that saw the fault: abort state, heaters off, fan on.
    assert_eq!(h.service.status().phase, PhaseKind::Abort.name());
    assert!(h.heaters_all_off());
    assert!(h.oven.is_on(ChannelId::D7)); // cooling fan
    assert_eq!(
        h.sink.aborted_flags(),
        Some(SafetyFault::ThermocoupleOpen.mask())
    );
}

#[test]
fn sensor_fault_during_testing_mode_aborts_with_outputs_off() {
    let mut h = Harness::new();
    h.start(Mode::Testing);
    for _ in 0..4 {
        h.step();
    }
    assert_eq!(h.service.mode(), Some(Mode::Testing));

    h.oven.set_fault(Some(ThermocoupleFault::Open));
    h.step();

    // The wiring check drives real heaters: the fault ends it on the spot.
    assert_eq!(h.service.mode(), None);
    assert_eq!(h.service.status().phase, "Idle");
    for ch in ChannelId::ALL {
        assert!(!h.oven.is_on(ch), "{ch} still on");
    }
    assert_eq!(
        h.sink.aborted_flags(),
        Some(SafetyFault::ThermocoupleOpen.mask())
    );
}

#[test]
fn aborted_run_never_touches_stored_settings() {
    let mut h = Harness::new();
    let blob_before = h.stored_blob();
    h.start(Mode::Reflow);

    for _ in 0..50 {
        h.step();
    }
    h.service.handle_command(OvenCommand::Abort, &mut h.sink);
    h.step();
    assert_eq!(h.service.status().phase, PhaseKind::Abort.name());
    assert_eq!(h.sink.aborted_flags(), Some(0)); // user abort, no fault bits

    // Abort holds until acknowledged, and nothing was persisted.
    for _ in 0..10 {
        h.step();
    }
    assert_eq!(h.service.status().phase, PhaseKind::Abort.name());
    h.service
        .handle_command(OvenCommand::Acknowledge, &mut h.sink);
    assert_eq!(h.service.mode(), None);
    assert_eq!(h.stored_blob(), blob_before);
}

#[test]
fn restart_after_acknowledged_fault_is_accepted() {
    let mut h = Harness::new();
    h.start(Mode::Reflow);
    h.step();
    h.oven.set_fault(Some(ThermocoupleFault::Open));
    h.step();
    assert_eq!(h.service.status().phase, PhaseKind::Abort.name());

    h.oven.set_fault(None);
    h.service
        .handle_command(OvenCommand::Acknowledge, &mut h.sink);
    assert_eq!(h.service.mode(), None);

    h.sink.events.clear();
    h.start(Mode::Reflow);
    h.step();
    assert_eq!(h.sink.rejection(), None);
    assert_eq!(h.service.mode(), Some(Mode::Reflow));
    assert_eq!(h.service.fault_flags(), 0);
}

#[test]
fn bake_run_heats_holds_and_cools() {
    let settings = OvenSettings {
        bake_temperature_c: 100.0,
        bake_duration_secs: 120,
        ..OvenSettings::default()
    };
    let mut h = Harness::with_settings(MemoryStore::new(), settings);
    h.start(Mode::Bake);

    let mut held_above = 0u32;
    for _ in 0..2000 {
        h.step();
        if h.service.status().phase == PhaseKind::Bake.name()
            && h.oven.temperature_c() >= 88.0
        {
            held_above += 1;
        }
        let status = h.service.status();
        if status.phase == PhaseKind::Cooling.name()
            && status.temperature_c <= SAFE_START_TEMP_C
        {
            h.service
                .handle_command(OvenCommand::Acknowledge, &mut h.sink);
        }
        if h.service.mode().is_none() {
            break;
        }
    }
    assert!(h.service.mode().is_none(), "bake did not finish");
    assert!(h.sink.completed());
    // The hold phase kept the oven near the setpoint for most of its length.
    assert!(held_above > 60, "held_above = {held_above}");
    assert!(h.oven.temperature_c() <= SAFE_START_TEMP_C + 1.0);

    let tunes: Vec<Tune> = h
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            OvenEvent::Tune(t) => Some(*t),
            _ => None,
        })
        .collect();
    assert_eq!(tunes, [Tune::Start, Tune::Done]);
}

#[test]
fn testing_mode_cycles_the_configured_outputs() {
    let mut h = Harness::new();
    // Testing is allowed on a warm oven.
    h.oven.set_temperature(120.0);
    h.start(Mode::Testing);

    let mut seen_on = [false; 4];
    for _ in 0..24 {
        h.step();
        for ch in ChannelId::ALL {
            seen_on[ch.index()] |= h.oven.is_on(ch);
        }
        // Never more than one output at a time during the wiring check.
        let on_now = ChannelId::ALL.iter().filter(|c| h.oven.is_on(**c)).count();
        assert!(on_now <= 1);
    }
    // Default wiring has no unused channels, so all four must have fired.
    assert_eq!(seen_on, [true; 4]);

    h.service
        .handle_command(OvenCommand::Acknowledge, &mut h.sink);
    assert_eq!(h.service.mode(), None);
}

/// Catch-up policy for late ticks: phase timing is wall-clock anchored, so
/// a tick arriving late re-synchronizes elapsed-in-phase to real time in one
/// step; duty slicing advances exactly one slot per tick no matter how late.
#[test]
fn late_tick_resyncs_phase_time_in_one_step() {
    let mut h = Harness::new();
    h.start(Mode::Reflow);
    for _ in 0..10 {
        h.step();
    }
    let before = h.service.status().elapsed_secs;

    // One tick arrives 5 seconds late.
    h.clock.advance_secs(5);
    h.service
        .tick(&mut h.oven, &h.clock, &mut h.sink);

    let after = h.service.status().elapsed_secs;
    assert_eq!(after, before + 5);
    assert_eq!(h.service.status().phase, PhaseKind::Presoak.name());
}

#[test]
fn settings_update_persists_through_commit() {
    let mut h = Harness::new();
    let mut s = h.service.current_settings();
    s.bake_temperature_c = 90.0;
    h.service
        .handle_command(OvenCommand::UpdateSettings(s.clone()), &mut h.sink);
    h.step();

    let persisted = SettingsRepository::load(&mut h.store);
    assert_eq!(persisted.bake_temperature_c, 90.0);
}
