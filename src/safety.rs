//! Safety supervisor.
//!
//! The supervisor runs **every tick before the FSM** and accumulates a
//! fault bitmask that ends up in `RunContext.fault_flags`. The phase
//! handlers check this mask to decide whether to transition to ABORT.
//!
//! ## Fault lifecycle
//!
//! 1. A condition triggers a fault (thermocouple wiring fault, or the
//!    temperature exceeding the configured maximum plus margin).
//! 2. The supervisor sets the corresponding bit.
//! 3. The FSM transitions to ABORT; `abort_enter` kills every heater and
//!    turns the cooling fan on.
//! 4. The bits stay **latched for the rest of the run**. A thermocouple
//!    reading cannot be trusted after a wiring fault, so there is no
//!    self-clearing: the user acknowledges the abort and starts over,
//!    which resets the supervisor.
//!
//! Multiple simultaneous faults accumulate in the same mask.

use log::error;

use crate::error::{SafetyFault, ThermocoupleFault};

/// Excess over the configured maximum temperature that trips the
/// over-temperature fault. The controller deliberately overshoots a little
/// near the peak, so the trip point sits above the profile maximum.
pub const OVER_TEMP_MARGIN_C: f32 = 25.0;

/// Safety supervisor with a latched fault bitmask.
pub struct SafetySupervisor {
    /// Trip temperature: profile maximum plus [`OVER_TEMP_MARGIN_C`].
    trip_temp_c: f32,
    /// Latched fault bitmask.
    faults: u8,
}

impl SafetySupervisor {
    pub fn new(max_temperature_c: f32) -> Self {
        Self {
            trip_temp_c: max_temperature_c + OVER_TEMP_MARGIN_C,
            faults: 0,
        }
    }

    /// Evaluate the latest thermocouple reading. Returns the updated fault
    /// bitmask; bits only ever get set here, never cleared.
    pub fn evaluate(&mut self, reading: Result<f32, ThermocoupleFault>) -> u8 {
        match reading {
            Ok(temp_c) => {
                self.latch_if(SafetyFault::OverTemperature, temp_c > self.trip_temp_c);
            }
            Err(fault) => {
                self.latch_if(SafetyFault::from(fault), true);
            }
        }
        self.faults
    }

    /// Current fault bitmask.
    pub fn faults(&self) -> u8 {
        self.faults
    }

    /// True if **any** fault is latched.
    pub fn has_faults(&self) -> bool {
        self.faults != 0
    }

    /// Check if a specific fault is latched.
    pub fn has_fault(&self, fault: SafetyFault) -> bool {
        self.faults & fault.mask() != 0
    }

    /// Reset all latched faults. Called when a new run is accepted, after
    /// the user has acknowledged the previous abort.
    pub fn reset(&mut self) {
        self.faults = 0;
    }

    // ── Internal ──────────────────────────────────────────────────

    fn latch_if(&mut self, fault: SafetyFault, condition: bool) {
        if condition {
            if self.faults & fault.mask() == 0 {
                error!("SAFETY FAULT SET: {fault}");
            }
            self.faults |= fault.mask();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_readings_raise_no_faults() {
        let mut sup = SafetySupervisor::new(240.0);
        for t in [25.0, 150.0, 240.0, 264.9] {
            assert_eq!(sup.evaluate(Ok(t)), 0);
        }
        assert!(!sup.has_faults());
    }

    #[test]
    fn over_temperature_trips_above_margin() {
        let mut sup = SafetySupervisor::new(240.0);
        assert_eq!(sup.evaluate(Ok(265.0)), 0); // exactly at trip point
        assert_ne!(sup.evaluate(Ok(265.1)), 0);
        assert!(sup.has_fault(SafetyFault::OverTemperature));
    }

    #[test]
    fn wiring_faults_map_to_their_bits() {
        let cases = [
            (ThermocoupleFault::Open, SafetyFault::ThermocoupleOpen),
            (ThermocoupleFault::ShortToGround, SafetyFault::ThermocoupleShortGnd),
            (ThermocoupleFault::ShortToSupply, SafetyFault::ThermocoupleShortVcc),
        ];
        for (tc, expected) in cases {
            let mut sup = SafetySupervisor::new(240.0);
            sup.evaluate(Err(tc));
            assert!(sup.has_fault(expected));
        }
    }

    #[test]
    fn faults_latch_until_reset() {
        let mut sup = SafetySupervisor::new(240.0);
        sup.evaluate(Err(ThermocoupleFault::Open));
        // A good reading afterwards must not clear the latch.
        sup.evaluate(Ok(25.0));
        assert!(sup.has_fault(SafetyFault::ThermocoupleOpen));

        sup.reset();
        assert!(!sup.has_faults());
    }

    #[test]
    fn multiple_faults_accumulate() {
        let mut sup = SafetySupervisor::new(100.0);
        sup.evaluate(Ok(200.0));
        sup.evaluate(Err(ThermocoupleFault::ShortToGround));
        assert!(sup.has_fault(SafetyFault::OverTemperature));
        assert!(sup.has_fault(SafetyFault::ThermocoupleShortGnd));
    }
}
