//! Simulated oven adapter.
//!
//! A first-order thermal model behind the [`ThermocouplePort`] and
//! [`OutputPort`] traits, for the host simulation binary and integration
//! tests. Heating elements add heat while switched on, heat leaks towards
//! ambient, and the cooling fan multiplies the leak rate. Nothing here
//! claims physical accuracy; the point is a plant whose behavior moves the
//! state machine through every phase.

use crate::app::ports::{OutputPort, ThermocouplePort};
use crate::channels::{ChannelId, OutputType, CHANNEL_COUNT};
use crate::error::ThermocoupleFault;

const AMBIENT_C: f32 = 25.0;

/// Heating rate per element at full power, °C/s.
fn element_rate(ty: OutputType) -> f32 {
    match ty {
        OutputType::BottomElement => 0.9,
        OutputType::TopElement => 0.7,
        OutputType::BoostElement => 0.5,
        _ => 0.0,
    }
}

/// Toy thermal plant. Advances one `dt` step per thermocouple read, which
/// the service performs exactly once per control tick.
pub struct SimulatedOven {
    temperature_c: f32,
    channel_on: [bool; CHANNEL_COUNT],
    output_types: [OutputType; CHANNEL_COUNT],
    dt_secs: f32,
    /// Injected wiring fault returned by every read until cleared.
    fault: Option<ThermocoupleFault>,
}

impl SimulatedOven {
    pub fn new(output_types: [OutputType; CHANNEL_COUNT], dt_secs: f32) -> Self {
        Self {
            temperature_c: AMBIENT_C,
            channel_on: [false; CHANNEL_COUNT],
            output_types,
            dt_secs,
            fault: None,
        }
    }

    /// Current plant temperature (bypasses the fault injection).
    pub fn temperature_c(&self) -> f32 {
        self.temperature_c
    }

    /// Force the plant to a temperature (e.g. a pre-heated oven).
    pub fn set_temperature(&mut self, temp_c: f32) {
        self.temperature_c = temp_c;
    }

    /// Inject or clear a thermocouple wiring fault.
    pub fn set_fault(&mut self, fault: Option<ThermocoupleFault>) {
        self.fault = fault;
    }

    pub fn is_on(&self, channel: ChannelId) -> bool {
        self.channel_on[channel.index()]
    }

    fn step(&mut self) {
        let mut heat = 0.0;
        let mut leak = 0.004; // passive loss coefficient, 1/s
        for (i, &ty) in self.output_types.iter().enumerate() {
            if !self.channel_on[i] {
                continue;
            }
            heat += element_rate(ty);
            if ty == OutputType::CoolingFan {
                leak *= 8.0;
            }
        }
        let loss = (self.temperature_c - AMBIENT_C) * leak;
        self.temperature_c += (heat - loss) * self.dt_secs;
    }
}

impl ThermocouplePort for SimulatedOven {
    fn read(&mut self) -> Result<f32, ThermocoupleFault> {
        self.step();
        match self.fault {
            Some(f) => Err(f),
            None => Ok(self.temperature_c),
        }
    }
}

impl OutputPort for SimulatedOven {
    fn set_channel(&mut self, channel: ChannelId, on: bool) {
        self.channel_on[channel.index()] = on;
    }
}
