//! Time-proportional duty-cycle controller.
//!
//! Heating elements are driven by relays, not PWM: switching happens on a
//! slow macro period measured in control ticks. Within each period a
//! channel is ON for a contiguous span whose length is its duty percentage
//! rounded to whole ticks, then OFF for the remainder:
//!
//! ```text
//! period (20 ticks), duty 40% -> 8 on-ticks
//!
//! ch0: ████████░░░░░░░░░░░░          on-span starts at offset 0
//! ch1: ░░████████░░░░░░░░░░          staggered by 2 ticks
//! ch2: ░░░░████████░░░░░░░░          staggered by 4 ticks
//! ```
//!
//! The per-channel stagger offsets spread relay switching edges across the
//! period so elements do not all pull in on the same tick. On-spans wrap
//! around the period boundary, which keeps the on-tick count exact for
//! every offset.

use crate::channels::CHANNEL_COUNT;

/// Length of the switching macro period, in control ticks. At a 1 s tick
/// this gives 5% duty resolution.
pub const DUTY_PERIOD_TICKS: u32 = 20;

/// Stagger between consecutive channels' on-span starts, in ticks.
pub const CHANNEL_STAGGER_TICKS: u32 = 2;

/// Slices per-channel duty percentages into on/off decisions per tick.
pub struct DutyCycleController {
    /// Position within the macro period, `0..DUTY_PERIOD_TICKS`.
    cursor: u32,
}

impl Default for DutyCycleController {
    fn default() -> Self {
        Self::new()
    }
}

impl DutyCycleController {
    pub fn new() -> Self {
        Self { cursor: 0 }
    }

    /// Number of on-ticks a duty percentage maps to: `round(duty% * period)`.
    pub fn on_ticks(duty_percent: u8) -> u32 {
        let duty = u32::from(duty_percent.min(100));
        (duty * DUTY_PERIOD_TICKS + 50) / 100
    }

    /// Compute the on/off state of every channel at the current cursor
    /// position for the given duty percentages.
    pub fn outputs_for_tick(&self, duty: &[u8; CHANNEL_COUNT]) -> [bool; CHANNEL_COUNT] {
        let mut out = [false; CHANNEL_COUNT];
        for (i, (&d, slot)) in duty.iter().zip(out.iter_mut()).enumerate() {
            let on = Self::on_ticks(d);
            let offset = (i as u32 * CHANNEL_STAGGER_TICKS) % DUTY_PERIOD_TICKS;
            // Position relative to this channel's span start, wrapped.
            let pos = (self.cursor + DUTY_PERIOD_TICKS - offset) % DUTY_PERIOD_TICKS;
            *slot = pos < on;
        }
        out
    }

    /// Advance the period cursor by one tick.
    pub fn advance(&mut self) {
        self.cursor = (self.cursor + 1) % DUTY_PERIOD_TICKS;
    }

    /// Restart the period. Called on every phase entry so a new phase's
    /// duties always begin with a full on-span.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}
