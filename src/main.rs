//! ReflowWizard host simulation.
//!
//! Runs the full controller against the simulated oven plant, one control
//! tick per simulated second, and drives a complete reflow run from cold
//! start to boards-out. Useful for eyeballing profile timing and learning
//! behavior without hardware.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 Adapters (outer ring)                │
//! │                                                      │
//! │  SimulatedOven   LogEventSink   MemoryStore          │
//! │  (Thermo+Output) (EventSink)    (StoragePort)        │
//! │                                                      │
//! │  ───────────── Port Trait Boundary ─────────────     │
//! │                                                      │
//! │  ┌────────────────────────────────────────────────┐  │
//! │  │           OvenService (pure logic)             │  │
//! │  │  FSM · Safety · DutyCycle · Learning           │  │
//! │  └────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────┘
//! ```

use anyhow::{bail, Result};
use log::info;

use reflow_wizard::adapters::log_sink::LogEventSink;
use reflow_wizard::adapters::memory_store::MemoryStore;
use reflow_wizard::adapters::sim_oven::SimulatedOven;
use reflow_wizard::adapters::time::ManualClock;
use reflow_wizard::app::commands::{Mode, OvenCommand};
use reflow_wizard::app::service::OvenService;
use reflow_wizard::profile::{PhaseKind, SAFE_START_TEMP_C};
use reflow_wizard::settings::SettingsRepository;

/// Give up if a run has not finished within this many simulated seconds.
const MAX_SIM_SECS: u32 = 3600;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut store = MemoryStore::new();
    let settings = SettingsRepository::load(&mut store);
    info!(
        "Loaded settings: peak {:.0}\u{00b0}C, outputs {:?}",
        settings.max_temperature_c, settings.output_types
    );

    let mut oven = SimulatedOven::new(settings.output_types, 1.0);
    let clock = ManualClock::new();
    let mut sink = LogEventSink::new();
    let mut service = OvenService::new(settings);

    service.start(&mut sink);
    service.handle_command(OvenCommand::Start(Mode::Reflow), &mut sink);

    for _ in 0..MAX_SIM_SECS {
        clock.advance_secs(1);
        service.tick(&mut oven, &clock, &mut sink);
        service.commit_run_results(&mut store, &mut sink);

        let status = service.status();
        let boards_out = status.phase == PhaseKind::CoolingBoardsOut.name()
            && status.temperature_c <= SAFE_START_TEMP_C;
        if boards_out {
            service.handle_command(OvenCommand::Acknowledge, &mut sink);
        }
        if service.mode().is_none() {
            info!(
                "Simulation finished after {} ticks, oven at {:.1}\u{00b0}C",
                service.tick_count(),
                oven.temperature_c()
            );
            let learned = service.current_settings();
            info!("Learned duty table: {:?}", learned.duty);
            return Ok(());
        }
    }

    bail!("simulation did not finish within {MAX_SIM_SECS} simulated seconds");
}
