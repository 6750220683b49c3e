//! Daily workout modulation from readiness
//!
//! Readiness (HRV status plus any extra negative signals reported by the athlete)
//! selects one of three adjustments, which can then be applied to a structured
//! workout template.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{IntervalKind, WorkoutInterval, WorkoutTemplate, WorkoutType};
use crate::readiness::HrvStatus;

/// Intensity of the replacement block on recovery days, as a fraction of FTP
pub const RECOVERY_RIDE_INTENSITY: Decimal = dec!(0.55);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentAction {
    Keep,
    ReduceVolume,
    RecoveryRide,
}

impl std::fmt::Display for AdjustmentAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdjustmentAction::Keep => write!(f, "KEEP"),
            AdjustmentAction::ReduceVolume => write!(f, "REDUCE_VOLUME"),
            AdjustmentAction::RecoveryRide => write!(f, "RECOVERY_RIDE"),
        }
    }
}

/// Scaling factors for today's session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAdjustment {
    pub action: AdjustmentAction,
    pub intensity_factor: Decimal,
    pub volume_factor: Decimal,
    pub rest_increase_factor: Decimal,
    pub rationale: String,
}

/// Pick today's adjustment.
///
/// Two or more negatives (a non-green HRV counts as one) or a red HRV force a
/// recovery ride.
pub fn daily_adjustment<S: AsRef<str>>(status: HrvStatus, signals: &[S]) -> DailyAdjustment {
    let negatives = usize::from(status != HrvStatus::Green) + signals.len();

    debug!(
        %status,
        negatives,
        signals = ?signals.iter().map(AsRef::as_ref).collect::<Vec<_>>(),
        "Selecting daily adjustment"
    );

    if negatives >= 2 || status == HrvStatus::Red {
        DailyAdjustment {
            action: AdjustmentAction::RecoveryRide,
            intensity_factor: dec!(0.60),
            volume_factor: dec!(0.50),
            rest_increase_factor: Decimal::ONE,
            rationale: "Multiple fatigue markers are present. Swap today's session for an easy recovery ride."
                .to_string(),
        }
    } else if status == HrvStatus::Yellow {
        DailyAdjustment {
            action: AdjustmentAction::ReduceVolume,
            intensity_factor: dec!(0.95),
            volume_factor: dec!(0.75),
            rest_increase_factor: dec!(1.33),
            rationale: "HRV is slightly suppressed. Keep the session but cut volume and lengthen recoveries."
                .to_string(),
        }
    } else {
        DailyAdjustment {
            action: AdjustmentAction::Keep,
            intensity_factor: Decimal::ONE,
            volume_factor: Decimal::ONE,
            rest_increase_factor: Decimal::ONE,
            rationale: "Readiness is good. Train as planned.".to_string(),
        }
    }
}

/// Rewrite a workout template with the adjustment's factors
pub fn apply_adjustment(template: &WorkoutTemplate, adjustment: &DailyAdjustment) -> WorkoutTemplate {
    match adjustment.action {
        AdjustmentAction::Keep => template.clone(),
        AdjustmentAction::RecoveryRide => recovery_ride(template, adjustment.volume_factor),
        AdjustmentAction::ReduceVolume => scale_template(template, adjustment),
    }
}

fn recovery_ride(template: &WorkoutTemplate, volume_factor: Decimal) -> WorkoutTemplate {
    let duration = scale_seconds(template.total_duration_seconds(), volume_factor);

    WorkoutTemplate {
        name: format!("{} (recovery ride)", template.name),
        workout_type: WorkoutType::Recovery,
        intervals: vec![WorkoutInterval {
            kind: IntervalKind::Work,
            duration_seconds: duration,
            intensity: RECOVERY_RIDE_INTENSITY,
            description: Some("Easy spin, zone 1".to_string()),
        }],
    }
}

fn scale_template(template: &WorkoutTemplate, adjustment: &DailyAdjustment) -> WorkoutTemplate {
    let mut intervals: Vec<WorkoutInterval> = template
        .intervals
        .iter()
        .map(|interval| match interval.kind {
            IntervalKind::Work => WorkoutInterval {
                intensity: (interval.intensity * adjustment.intensity_factor)
                    .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
                ..interval.clone()
            },
            IntervalKind::Rest => WorkoutInterval {
                duration_seconds: scale_seconds(
                    interval.duration_seconds,
                    adjustment.rest_increase_factor,
                ),
                ..interval.clone()
            },
            _ => interval.clone(),
        })
        .collect();

    if adjustment.volume_factor < Decimal::ONE {
        drop_trailing_work(&mut intervals, adjustment.volume_factor);
    }

    WorkoutTemplate {
        name: format!("{} (reduced)", template.name),
        workout_type: template.workout_type,
        intervals,
    }
}

/// Remove the last work intervals in proportion to `1 - volume_factor`, always
/// keeping at least one. The rest preceding a dropped work interval goes with it.
fn drop_trailing_work(intervals: &mut Vec<WorkoutInterval>, volume_factor: Decimal) {
    let work_positions: Vec<usize> = intervals
        .iter()
        .enumerate()
        .filter(|(_, i)| i.kind == IntervalKind::Work)
        .map(|(idx, _)| idx)
        .collect();

    let work_count = work_positions.len();
    if work_count <= 1 {
        return;
    }

    let to_drop = (Decimal::from(work_count) * (Decimal::ONE - volume_factor))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_usize()
        .unwrap_or(0)
        .min(work_count - 1);
    if to_drop == 0 {
        return;
    }

    let first_dropped = work_positions[work_count - to_drop];
    let cut_from = match first_dropped.checked_sub(1) {
        Some(prev) if intervals[prev].kind == IntervalKind::Rest => prev,
        _ => first_dropped,
    };

    let mut position = 0;
    intervals.retain(|interval| {
        let keep = position < cut_from
            || !matches!(interval.kind, IntervalKind::Work | IntervalKind::Rest);
        position += 1;
        keep
    });
}

fn scale_seconds(seconds: u32, factor: Decimal) -> u32 {
    (Decimal::from(seconds) * factor)
        .round()
        .to_u32()
        .unwrap_or(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval_session(reps: usize) -> WorkoutTemplate {
        let mut intervals = vec![WorkoutInterval::new(IntervalKind::Warmup, 600, dec!(0.60))];
        for rep in 0..reps {
            if rep > 0 {
                intervals.push(WorkoutInterval::new(IntervalKind::Rest, 180, dec!(0.50)));
            }
            intervals.push(WorkoutInterval::new(IntervalKind::Work, 300, dec!(1.10)));
        }
        intervals.push(WorkoutInterval::new(IntervalKind::Cooldown, 600, dec!(0.50)));

        WorkoutTemplate {
            name: "VO2max 5x5".to_string(),
            workout_type: WorkoutType::VO2Max,
            intervals,
        }
    }

    #[test]
    fn test_red_forces_recovery_ride() {
        let adjustment = daily_adjustment::<&str>(HrvStatus::Red, &[]);
        assert_eq!(adjustment.action, AdjustmentAction::RecoveryRide);
        assert_eq!(adjustment.intensity_factor, dec!(0.60));
        assert_eq!(adjustment.volume_factor, dec!(0.50));
    }

    #[test]
    fn test_single_signal_with_green_keeps() {
        let adjustment = daily_adjustment(HrvStatus::Green, &["poor_sleep"]);
        assert_eq!(adjustment.action, AdjustmentAction::Keep);
        assert_eq!(adjustment.intensity_factor, Decimal::ONE);
    }

    #[test]
    fn test_two_signals_with_green_force_recovery() {
        let adjustment = daily_adjustment(HrvStatus::Green, &["poor_sleep", "sore_legs"]);
        assert_eq!(adjustment.action, AdjustmentAction::RecoveryRide);
    }

    #[test]
    fn test_yellow_reduces_volume() {
        let adjustment = daily_adjustment::<String>(HrvStatus::Yellow, &[]);
        assert_eq!(adjustment.action, AdjustmentAction::ReduceVolume);
        assert_eq!(adjustment.rest_increase_factor, dec!(1.33));

        let adjustment = daily_adjustment(HrvStatus::Yellow, &["stress".to_string()]);
        assert_eq!(adjustment.action, AdjustmentAction::RecoveryRide);
    }

    #[test]
    fn test_keep_is_noop() {
        let template = interval_session(5);
        let adjustment = daily_adjustment::<&str>(HrvStatus::Green, &[]);
        assert_eq!(apply_adjustment(&template, &adjustment), template);
    }

    #[test]
    fn test_recovery_ride_replaces_intervals() {
        let template = interval_session(5);
        let adjustment = daily_adjustment::<&str>(HrvStatus::Red, &[]);
        let adjusted = apply_adjustment(&template, &adjustment);

        assert_eq!(adjusted.intervals.len(), 1);
        assert_eq!(adjusted.workout_type, WorkoutType::Recovery);
        assert_eq!(adjusted.intervals[0].intensity, RECOVERY_RIDE_INTENSITY);
        assert_eq!(
            adjusted.total_duration_seconds(),
            template.total_duration_seconds() / 2
        );
    }

    #[test]
    fn test_reduce_volume_scales_and_drops_trailing_work() {
        let template = interval_session(5);
        let adjustment = daily_adjustment::<&str>(HrvStatus::Yellow, &[]);
        let adjusted = apply_adjustment(&template, &adjustment);

        // round(5 * 0.25) = 1 work interval dropped along with its preceding rest
        assert_eq!(adjusted.work_interval_count(), 4);
        assert_eq!(adjusted.intervals.len(), template.intervals.len() - 2);
        assert_eq!(adjusted.intervals.first().map(|i| i.kind), Some(IntervalKind::Warmup));
        assert_eq!(adjusted.intervals.last().map(|i| i.kind), Some(IntervalKind::Cooldown));

        for interval in &adjusted.intervals {
            match interval.kind {
                IntervalKind::Work => assert_eq!(interval.intensity, dec!(1.05)),
                IntervalKind::Rest => assert_eq!(interval.duration_seconds, 239),
                _ => {}
            }
        }
    }

    #[test]
    fn test_single_work_interval_is_kept() {
        let template = interval_session(1);
        let adjustment = daily_adjustment::<&str>(HrvStatus::Yellow, &[]);
        let adjusted = apply_adjustment(&template, &adjustment);
        assert_eq!(adjusted.work_interval_count(), 1);
    }
}
