//! Oven settings: configuration plus learned duty cycles.
//!
//! [`OvenSettings`] is the in-memory, full-width form the control logic
//! works with. [`PackedSettings`] is the narrow-width persisted payload,
//! mirroring the original EEPROM layout: temperatures offset or quantized so
//! every field fits a byte, led by a provisioning sentinel that tells a
//! freshly-erased store apart from valid data.
//!
//! Persistence goes through [`StoragePort`] as one postcard blob per the
//! NVS-adapter pattern: load tolerates missing or corrupt data by
//! provisioning defaults (never an error), save validates first.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{StorageError, StoragePort};
use crate::channels::{OutputType, CHANNEL_COUNT};
use crate::error::Error;
use crate::profile::DutySlot;

/// Storage namespace for all controller data.
pub const SETTINGS_NAMESPACE: &str = "reflow";
/// Key of the settings blob.
pub const SETTINGS_KEY: &str = "ovencfg";

/// Temperatures are stored offset by this so the full range fits a byte.
pub const TEMPERATURE_OFFSET_C: f32 = 150.0;
/// Bake temperature is stored in steps of 5 °C.
pub const BAKE_TEMPERATURE_STEP_C: f32 = 5.0;
/// Bake duration is stored in steps of 30 s (30 s to ~2 h in a byte).
pub const BAKE_DURATION_STEP_SECS: u32 = 30;

/// Sentinel byte marking a provisioned payload. Erased flash reads back as
/// 0xFF, so anything but this exact value means "needs init".
const PROVISIONED: u8 = 0xA5;

// ---------------------------------------------------------------------------
// Full-width settings
// ---------------------------------------------------------------------------

/// All tunable parameters and learned state for the oven.
#[derive(Debug, Clone, PartialEq)]
pub struct OvenSettings {
    /// What each of D4..D7 drives.
    pub output_types: [OutputType; CHANNEL_COUNT],
    /// Reflow peak target; the reflow curve is derived from this.
    pub max_temperature_c: f32,
    /// Set when output wiring or the maximum temperature changed; forces the
    /// learned duty cycles back to defaults on the next load.
    pub settings_changed: bool,
    /// Whether the learning engine may adjust duty cycles after runs.
    pub learning_mode: bool,
    /// Bake hold temperature.
    pub bake_temperature_c: f32,
    /// Bake hold duration.
    pub bake_duration_secs: u32,
    /// Duty percentage (0–100) per (slot, channel).
    pub duty: [[u8; CHANNEL_COUNT]; DutySlot::COUNT],
}

/// Default duty cycles per slot, applied to every heating channel.
/// Starting points for learning mode; deliberately conservative.
const DEFAULT_DUTY: [u8; DutySlot::COUNT] = [60, 40, 80];

impl Default for OvenSettings {
    fn default() -> Self {
        Self {
            // Typical ControLeo wiring: bottom + top elements, boost, cooling fan.
            output_types: [
                OutputType::BottomElement,
                OutputType::TopElement,
                OutputType::BoostElement,
                OutputType::CoolingFan,
            ],
            max_temperature_c: 240.0,
            settings_changed: false,
            learning_mode: true,
            bake_temperature_c: 120.0,
            bake_duration_secs: 3600,
            duty: Self::default_duty(),
        }
    }
}

impl OvenSettings {
    /// The factory duty table: every slot starts at its default percentage.
    pub fn default_duty() -> [[u8; CHANNEL_COUNT]; DutySlot::COUNT] {
        let mut duty = [[0u8; CHANNEL_COUNT]; DutySlot::COUNT];
        for (slot, row) in duty.iter_mut().enumerate() {
            *row = [DEFAULT_DUTY[slot]; CHANNEL_COUNT];
        }
        duty
    }

    /// Learned duty percentage for one (slot, channel).
    pub fn duty_for(&self, slot: DutySlot, channel: usize) -> u8 {
        self.duty[slot.index()][channel]
    }

    /// Set a learned duty percentage, clamped to 100.
    pub fn set_duty(&mut self, slot: DutySlot, channel: usize, percent: u8) {
        self.duty[slot.index()][channel] = percent.min(100);
    }

    /// Per-channel duty for a slot, masked so only heating channels are
    /// ever modulated (fans and unused outputs read as zero).
    pub fn heating_duties(&self, slot: DutySlot) -> [u8; CHANNEL_COUNT] {
        let mut out = [0u8; CHANNEL_COUNT];
        for (i, ty) in self.output_types.iter().enumerate() {
            if ty.is_heating() {
                out[i] = self.duty[slot.index()][i];
            }
        }
        out
    }

    /// Range-check every field. Invalid settings are rejected before
    /// persistence, not silently clamped.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !(150.0..=280.0).contains(&self.max_temperature_c) {
            return Err("max_temperature_c must be 150.0-280.0");
        }
        if !(40.0..=200.0).contains(&self.bake_temperature_c) {
            return Err("bake_temperature_c must be 40.0-200.0");
        }
        if !(BAKE_DURATION_STEP_SECS..=7650).contains(&self.bake_duration_secs) {
            return Err("bake_duration_secs must be 30-7650");
        }
        for row in &self.duty {
            for &d in row {
                if d > 100 {
                    return Err("duty cycle must be 0-100");
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Packed persisted payload
// ---------------------------------------------------------------------------

/// Narrow-width persisted form. Every field fits a byte so the whole payload
/// stays small enough for EEPROM-class stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedSettings {
    /// Needs-init sentinel: anything but [`PROVISIONED`] means erased.
    pub provisioned: u8,
    pub output_types: [u8; CHANNEL_COUNT],
    /// °C minus [`TEMPERATURE_OFFSET_C`].
    pub max_temperature: u8,
    pub settings_changed: u8,
    pub learning_mode: u8,
    /// °C divided by [`BAKE_TEMPERATURE_STEP_C`].
    pub bake_temperature: u8,
    /// Seconds divided by [`BAKE_DURATION_STEP_SECS`].
    pub bake_duration: u8,
    pub duty: [[u8; CHANNEL_COUNT]; DutySlot::COUNT],
}

impl PackedSettings {
    /// Pack full-width settings into the persisted form.
    pub fn encode(s: &OvenSettings) -> Self {
        let mut output_types = [0u8; CHANNEL_COUNT];
        for (i, ty) in s.output_types.iter().enumerate() {
            output_types[i] = *ty as u8;
        }
        Self {
            provisioned: PROVISIONED,
            output_types,
            max_temperature: (s.max_temperature_c - TEMPERATURE_OFFSET_C).clamp(0.0, 255.0) as u8,
            settings_changed: u8::from(s.settings_changed),
            learning_mode: u8::from(s.learning_mode),
            bake_temperature: (s.bake_temperature_c / BAKE_TEMPERATURE_STEP_C).round() as u8,
            bake_duration: (s.bake_duration_secs / BAKE_DURATION_STEP_SECS).min(255) as u8,
            duty: s.duty,
        }
    }

    /// Unpack the persisted form. `None` when the sentinel says the store
    /// was never provisioned (freshly erased flash).
    pub fn decode(&self) -> Option<OvenSettings> {
        if self.provisioned != PROVISIONED {
            return None;
        }
        let mut output_types = [OutputType::Unused; CHANNEL_COUNT];
        for (i, &raw) in self.output_types.iter().enumerate() {
            output_types[i] = OutputType::from_u8(raw);
        }
        let mut duty = self.duty;
        for row in &mut duty {
            for d in row.iter_mut() {
                *d = (*d).min(100);
            }
        }
        Some(OvenSettings {
            output_types,
            max_temperature_c: f32::from(self.max_temperature) + TEMPERATURE_OFFSET_C,
            settings_changed: self.settings_changed != 0,
            learning_mode: self.learning_mode != 0,
            bake_temperature_c: f32::from(self.bake_temperature) * BAKE_TEMPERATURE_STEP_C,
            bake_duration_secs: u32::from(self.bake_duration) * BAKE_DURATION_STEP_SECS,
            duty,
        })
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Typed access to the persisted settings blob.
pub struct SettingsRepository;

impl SettingsRepository {
    /// Load settings, provisioning defaults when the store is erased,
    /// missing, or corrupt. A pending `settings_changed` flag resets the
    /// learned duty cycles to defaults, is cleared, and the result is
    /// persisted immediately.
    pub fn load(store: &mut impl StoragePort) -> OvenSettings {
        let mut buf = [0u8; 64];
        let decoded = match store.read(SETTINGS_NAMESPACE, SETTINGS_KEY, &mut buf) {
            Ok(len) => match postcard::from_bytes::<PackedSettings>(&buf[..len]) {
                Ok(packed) => packed.decode(),
                Err(_) => {
                    warn!("settings: stored payload corrupt, provisioning defaults");
                    None
                }
            },
            Err(StorageError::NotFound) => {
                info!("settings: store not provisioned, writing defaults");
                None
            }
            Err(e) => {
                warn!("settings: read failed ({e}), provisioning defaults");
                None
            }
        };

        let mut settings = match decoded {
            Some(s) => s,
            None => {
                let defaults = OvenSettings::default();
                if Self::save(store, &defaults).is_err() {
                    warn!("settings: provisioning write failed, continuing in memory");
                }
                return defaults;
            }
        };

        if settings.settings_changed {
            info!("settings: configuration changed, relearning duty cycles from defaults");
            settings.duty = OvenSettings::default_duty();
            settings.settings_changed = false;
            if Self::save(store, &settings).is_err() {
                warn!("settings: relearn reset write failed, continuing in memory");
            }
        }

        settings
    }

    /// Validate and persist settings as a single atomic blob write.
    pub fn save(store: &mut impl StoragePort, settings: &OvenSettings) -> crate::error::Result<()> {
        if let Err(msg) = settings.validate() {
            warn!("settings: rejected invalid settings: {msg}");
            return Err(Error::Config(msg));
        }
        let packed = PackedSettings::encode(settings);
        let bytes =
            postcard::to_allocvec(&packed).map_err(|_| Error::Storage(StorageError::IoError))?;
        store.write(SETTINGS_NAMESPACE, SETTINGS_KEY, &bytes)?;
        info!("settings: saved ({} bytes)", bytes.len());
        Ok(())
    }
}
