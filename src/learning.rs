//! Cross-run duty-cycle learning.
//!
//! The oven's thermal mass and element wiring vary between builds, so the
//! stored duty cycles are adjusted after every **completed** run: a phase
//! that took markedly longer than its nominal duration (or timed out before
//! reaching its target) gets more power next time, one that finished
//! markedly faster gets less. Adjustments are a fixed step, clamped to
//! [0, 100], and applied only to channels configured as heating elements.
//!
//! Aborted runs teach nothing: their phase durations are truncated by the
//! abort and would bias the duties downwards.

use log::info;

use crate::channels::CHANNEL_COUNT;
use crate::fsm::context::{PhaseExitRecord, RunOutcome};
use crate::profile::Profile;
use crate::settings::OvenSettings;

/// Duty percentage added or removed per phase per run.
pub const LEARNING_STEP: u8 = 2;

/// Relative deviation from the nominal duration that triggers an
/// adjustment. Within ±20% the duties are considered dialled in.
pub const DURATION_TOLERANCE: f32 = 0.2;

/// Which way a phase's duties should move, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Adjustment {
    None,
    Increase,
    Decrease,
}

fn classify(record: &PhaseExitRecord, nominal_secs: u32) -> Adjustment {
    if !record.reached_target {
        // Timed out short of the target: not enough power.
        return Adjustment::Increase;
    }
    let nominal = nominal_secs as f32;
    let elapsed = record.elapsed_secs as f32;
    if elapsed > nominal * (1.0 + DURATION_TOLERANCE) {
        Adjustment::Increase
    } else if elapsed < nominal * (1.0 - DURATION_TOLERANCE) {
        Adjustment::Decrease
    } else {
        Adjustment::None
    }
}

/// Adjust stored duty cycles from a finished run's phase records.
///
/// Only applies when `learning_mode` is enabled and the run completed.
/// Returns `true` if any duty changed; the caller is responsible for
/// persisting the settings afterwards.
pub fn adjust(
    settings: &mut OvenSettings,
    profile: &Profile,
    records: &[PhaseExitRecord],
    outcome: RunOutcome,
) -> bool {
    if !settings.learning_mode || outcome != RunOutcome::Completed {
        return false;
    }

    let mut changed = false;
    for record in records {
        let Some(spec) = profile.spec(record.kind) else {
            continue;
        };
        let Some(slot) = spec.duty_slot else {
            continue;
        };
        let adjustment = classify(record, spec.nominal_secs);
        if adjustment == Adjustment::None {
            continue;
        }

        for ch in 0..CHANNEL_COUNT {
            if !settings.output_types[ch].is_heating() {
                continue;
            }
            let old = settings.duty[slot.index()][ch];
            let new = match adjustment {
                Adjustment::Increase => old.saturating_add(LEARNING_STEP).min(100),
                Adjustment::Decrease => old.saturating_sub(LEARNING_STEP),
                Adjustment::None => old,
            };
            if new != old {
                settings.duty[slot.index()][ch] = new;
                changed = true;
            }
        }
        if adjustment != Adjustment::None {
            info!(
                "{}: took {}s (nominal {}s, target {}), duty {}",
                record.kind.name(),
                record.elapsed_secs,
                spec.nominal_secs,
                if record.reached_target { "reached" } else { "missed" },
                if adjustment == Adjustment::Increase { "+" } else { "-" },
            );
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{reflow_profile, DutySlot, PhaseKind};

    fn record(kind: PhaseKind, elapsed_secs: u32, reached_target: bool) -> PhaseExitRecord {
        PhaseExitRecord {
            kind,
            elapsed_secs,
            reached_target,
        }
    }

    fn setup() -> (OvenSettings, Profile) {
        let settings = OvenSettings::default();
        let profile = reflow_profile(settings.max_temperature_c);
        (settings, profile)
    }

    #[test]
    fn slow_phase_gains_a_step_on_heating_channels_only() {
        let (mut settings, profile) = setup();
        let before = settings.duty[DutySlot::Presoak.index()];
        // Presoak nominal is 100s; 130s is past the +20% band.
        let recs = [record(PhaseKind::Presoak, 130, true)];
        assert!(adjust(&mut settings, &profile, &recs, RunOutcome::Completed));

        for ch in 0..CHANNEL_COUNT {
            let expected = if settings.output_types[ch].is_heating() {
                before[ch] + LEARNING_STEP
            } else {
                before[ch]
            };
            assert_eq!(settings.duty[DutySlot::Presoak.index()][ch], expected);
        }
    }

    #[test]
    fn fast_phase_loses_a_step() {
        let (mut settings, profile) = setup();
        let before = settings.duty[DutySlot::Soak.index()][0];
        // Soak nominal is 90s; 60s is below the -20% band.
        let recs = [record(PhaseKind::Soak, 60, true)];
        assert!(adjust(&mut settings, &profile, &recs, RunOutcome::Completed));
        assert_eq!(settings.duty[DutySlot::Soak.index()][0], before - LEARNING_STEP);
    }

    #[test]
    fn within_tolerance_changes_nothing() {
        let (mut settings, profile) = setup();
        let before = settings.duty;
        let recs = [
            record(PhaseKind::Presoak, 100, true),
            record(PhaseKind::Soak, 95, true),
            record(PhaseKind::Reflow, 55, true),
        ];
        assert!(!adjust(&mut settings, &profile, &recs, RunOutcome::Completed));
        assert_eq!(settings.duty, before);
    }

    #[test]
    fn timeout_without_target_counts_as_slow() {
        let (mut settings, profile) = setup();
        let before = settings.duty[DutySlot::Reflow.index()][0];
        // Timed out quickly does not matter: the target was missed.
        let recs = [record(PhaseKind::Reflow, 180, false)];
        assert!(adjust(&mut settings, &profile, &recs, RunOutcome::Completed));
        assert_eq!(
            settings.duty[DutySlot::Reflow.index()][0],
            before + LEARNING_STEP
        );
    }

    #[test]
    fn aborted_runs_teach_nothing() {
        let (mut settings, profile) = setup();
        let before = settings.duty;
        let recs = [record(PhaseKind::Presoak, 300, false)];
        assert!(!adjust(&mut settings, &profile, &recs, RunOutcome::Aborted));
        assert_eq!(settings.duty, before);
    }

    #[test]
    fn learning_mode_off_changes_nothing() {
        let (mut settings, profile) = setup();
        settings.learning_mode = false;
        let before = settings.duty;
        let recs = [record(PhaseKind::Presoak, 300, false)];
        assert!(!adjust(&mut settings, &profile, &recs, RunOutcome::Completed));
        assert_eq!(settings.duty, before);
    }

    #[test]
    fn duty_clamps_at_the_extremes() {
        let (mut settings, profile) = setup();
        settings.duty[DutySlot::Presoak.index()] = [100, 99, 1, 0];
        let slow = [record(PhaseKind::Presoak, 300, true)];
        adjust(&mut settings, &profile, &slow, RunOutcome::Completed);
        assert_eq!(settings.duty[DutySlot::Presoak.index()][0], 100);
        assert_eq!(settings.duty[DutySlot::Presoak.index()][1], 100);

        settings.duty[DutySlot::Presoak.index()] = [1, 0, 0, 0];
        let fast = [record(PhaseKind::Presoak, 10, true)];
        adjust(&mut settings, &profile, &fast, RunOutcome::Completed);
        assert_eq!(settings.duty[DutySlot::Presoak.index()][0], 0);
    }

    #[test]
    fn phases_without_a_duty_slot_are_skipped() {
        let (mut settings, profile) = setup();
        let before = settings.duty;
        let recs = [record(PhaseKind::Waiting, 500, true)];
        assert!(!adjust(&mut settings, &profile, &recs, RunOutcome::Completed));
        assert_eq!(settings.duty, before);
    }
}
