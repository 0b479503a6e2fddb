//! GPIO relay bank adapter.
//!
//! Drives the four relay/SSR outputs through `embedded-hal` 1.0
//! [`OutputPin`]s. Pin failures are logged rather than propagated: the
//! control core treats output switching as infallible, and a GPIO write
//! on this class of hardware does not fail in practice.

use embedded_hal::digital::OutputPin;
use log::error;

use crate::app::ports::OutputPort;
use crate::channels::{ChannelId, CHANNEL_COUNT};

/// Bank of four output pins in board order (D4..D7).
pub struct GpioOutputBank<P: OutputPin> {
    pins: [P; CHANNEL_COUNT],
    /// Shadow of the last commanded state, to skip redundant pin writes.
    state: [bool; CHANNEL_COUNT],
}

impl<P: OutputPin> GpioOutputBank<P> {
    /// Take ownership of the pins, driving them all low.
    pub fn new(mut pins: [P; CHANNEL_COUNT]) -> Self {
        for (i, pin) in pins.iter_mut().enumerate() {
            if pin.set_low().is_err() {
                error!("{}: failed to initialise low", ChannelId::from_index(i));
            }
        }
        Self {
            pins,
            state: [false; CHANNEL_COUNT],
        }
    }

    /// Last commanded state of one channel.
    pub fn is_on(&self, channel: ChannelId) -> bool {
        self.state[channel.index()]
    }
}

impl<P: OutputPin> OutputPort for GpioOutputBank<P> {
    fn set_channel(&mut self, channel: ChannelId, on: bool) {
        let i = channel.index();
        if self.state[i] == on {
            return;
        }
        let result = if on {
            self.pins[i].set_high()
        } else {
            self.pins[i].set_low()
        };
        if result.is_err() {
            error!("{channel}: failed to set {}", if on { "high" } else { "low" });
            return;
        }
        self.state[i] = on;
    }
}
