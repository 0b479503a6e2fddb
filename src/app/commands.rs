//! Inbound commands to the oven service.
//!
//! These represent actions requested by the outside world (front-panel
//! buttons, serial console) that the
//! [`OvenService`](super::service::OvenService) interprets and acts upon.
//! Commands only set flags or construct runs: an abort takes effect at the
//! next tick boundary, never later.

use crate::settings::OvenSettings;

/// Top-level run modes, in front-panel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Exercise each configured output in turn (wiring check).
    Testing,
    /// Hold outputs off while the UI edits settings.
    Config,
    /// Full solder-reflow thermal profile.
    Reflow,
    /// Constant-temperature bake.
    Bake,
}

impl Mode {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Testing => "Testing",
            Self::Config => "Config",
            Self::Reflow => "Reflow",
            Self::Bake => "Bake",
        }
    }
}

/// Commands that external adapters can send into the control core.
#[derive(Debug, Clone)]
pub enum OvenCommand {
    /// Begin a run in the given mode (subject to the safe-start check).
    Start(Mode),

    /// Abort the active run. Effective at the next tick boundary.
    Abort,

    /// Acknowledge a terminal state (abort or boards-out) and return to idle.
    Acknowledge,

    /// Hot-swap settings (from the config UI). Persisted immediately; a set
    /// `settings_changed` flag resets learned duty cycles to defaults.
    UpdateSettings(OvenSettings),
}
