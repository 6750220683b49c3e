//! Daily readiness: HRV traffic light and composite readiness score
//!
//! # Classification
//!
//! Today's HRV is compared to the rolling baseline:
//! - **Green**: deviation ≥ -5%
//! - **Yellow**: -15% ≤ deviation < -5%
//! - **Red**: deviation < -15%
//!
//! A missing or zero baseline classifies as Green with zero deviation, so missing
//! data never blocks training.
//!
//! # Readiness score
//!
//! A 0-100 score combining HRV, sleep, resting heart rate, subjective wellness and
//! training form. Factors without data are left out and the remaining weights are
//! renormalized.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::baseline::{round_tenth, Baseline};
use crate::models::DailySample;

/// Deviation (percent) at or above which HRV is Green
pub const GREEN_THRESHOLD_PCT: f64 = -5.0;

/// Deviation (percent) at or above which HRV is Yellow
pub const YELLOW_THRESHOLD_PCT: f64 = -15.0;

/// Score reported when no readiness factor has data
pub const NEUTRAL_READINESS: u8 = 50;

/// Traffic-light HRV status relative to the personal baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HrvStatus {
    Green,
    Yellow,
    Red,
}

impl fmt::Display for HrvStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HrvStatus::Green => write!(f, "GREEN"),
            HrvStatus::Yellow => write!(f, "YELLOW"),
            HrvStatus::Red => write!(f, "RED"),
        }
    }
}

impl HrvStatus {
    /// Status for a deviation in percent
    pub fn from_deviation(deviation_pct: f64) -> Self {
        // Snap away float noise so that exactly -5% and -15% land on the boundary
        let deviation = (deviation_pct * 1e6).round() / 1e6;

        if deviation >= GREEN_THRESHOLD_PCT {
            HrvStatus::Green
        } else if deviation >= YELLOW_THRESHOLD_PCT {
            HrvStatus::Yellow
        } else {
            HrvStatus::Red
        }
    }

    /// Fixed recommendation, escalated by the number of consecutive depressed days
    pub fn recommendation(&self, consecutive_days: Option<u32>) -> &'static str {
        let days = consecutive_days.unwrap_or(0);
        match self {
            HrvStatus::Green => "HRV is within your normal range. Train as planned.",
            HrvStatus::Yellow if days >= 3 => {
                "HRV has been below baseline for several days. Reduce volume and prioritize sleep before the next hard session."
            }
            HrvStatus::Yellow => {
                "HRV is slightly below baseline. Keep intensity but trim volume and extend recoveries."
            }
            HrvStatus::Red if days >= 3 => {
                "HRV has been strongly suppressed for several days. Take a full rest day and review sleep, stress and illness symptoms."
            }
            HrvStatus::Red => {
                "HRV is well below baseline. Replace today's session with an easy recovery ride or rest."
            }
        }
    }
}

/// Result of comparing today's HRV to the baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessResult {
    pub status: HrvStatus,
    /// Deviation from baseline in percent, one decimal
    pub deviation_pct: f64,
    pub recommendation: String,
}

/// Percent deviation of `current` from `baseline`, None when baseline is unusable
pub fn deviation_pct(current: f64, baseline: f64) -> Option<f64> {
    if baseline <= 0.0 || !baseline.is_finite() {
        return None;
    }
    Some((current - baseline) / baseline * 100.0)
}

/// Classify today's value against the baseline mean
pub fn classify(current: f64, baseline: f64) -> ReadinessResult {
    classify_with_streak(current, baseline, None)
}

/// Classify with recommendation wording escalated by a depressed-day streak
pub fn classify_with_streak(
    current: f64,
    baseline: f64,
    consecutive_days: Option<u32>,
) -> ReadinessResult {
    let Some(deviation) = deviation_pct(current, baseline) else {
        return ReadinessResult {
            status: HrvStatus::Green,
            deviation_pct: 0.0,
            recommendation: HrvStatus::Green.recommendation(None).to_string(),
        };
    };

    let status = HrvStatus::from_deviation(deviation);
    ReadinessResult {
        status,
        deviation_pct: round_tenth(deviation),
        recommendation: status.recommendation(consecutive_days).to_string(),
    }
}

/// Number of consecutive most recent HRV readings sharing the latest reading's status
pub fn days_in_status(samples: &[DailySample], baseline: &Baseline) -> u32 {
    let mut readings = samples.iter().rev().filter_map(|s| s.valid_hrv());

    let Some(latest) = readings.next() else {
        return 0;
    };
    let status = classify(latest, baseline.mean).status;

    1 + readings
        .take_while(|&hrv| classify(hrv, baseline.mean).status == status)
        .count() as u32
}

/// One component of the readiness score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessFactor {
    pub name: String,
    /// Component score 0-100
    pub score: f64,
    /// Weight after renormalization over the factors present
    pub weight: f64,
}

/// Composite readiness score with its breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessScore {
    pub score: u8,
    pub factors: Vec<ReadinessFactor>,
}

const HRV_WEIGHT: f64 = 0.35;
const SLEEP_QUALITY_WEIGHT: f64 = 0.15;
const SLEEP_DURATION_WEIGHT: f64 = 0.10;
const RESTING_HR_WEIGHT: f64 = 0.10;
const WELLNESS_WEIGHT: f64 = 0.15;
const FORM_WEIGHT: f64 = 0.15;

/// Target sleep duration for a full sleep score
const SLEEP_TARGET_HOURS: f64 = 8.0;

/// Combine today's sample with its baselines and current form into one score
pub fn readiness_score(
    today: Option<&DailySample>,
    hrv_baseline: &Baseline,
    resting_hr_baseline: Option<f64>,
    tsb: Option<Decimal>,
) -> ReadinessScore {
    let mut raw: Vec<(&str, f64, f64)> = Vec::new();

    if let Some(sample) = today {
        if let Some(hrv) = sample.valid_hrv() {
            if let Some(deviation) = deviation_pct(hrv, hrv_baseline.mean) {
                raw.push(("hrv", (100.0 + deviation * 4.0).clamp(0.0, 100.0), HRV_WEIGHT));
            }
        }
        if let Some(quality) = sample.sleep_quality {
            raw.push((
                "sleep_quality",
                f64::from(quality.clamp(1, 10)) * 10.0,
                SLEEP_QUALITY_WEIGHT,
            ));
        }
        if let Some(hours) = sample.sleep_duration_hours.filter(|h| h.is_finite()) {
            raw.push((
                "sleep_duration",
                (hours / SLEEP_TARGET_HOURS * 100.0).clamp(0.0, 100.0),
                SLEEP_DURATION_WEIGHT,
            ));
        }
        if let (Some(rhr), Some(baseline_rhr)) = (sample.resting_hr, resting_hr_baseline) {
            let elevation = f64::from(rhr) - baseline_rhr;
            raw.push((
                "resting_hr",
                (100.0 - elevation.max(0.0) * 10.0).clamp(0.0, 100.0),
                RESTING_HR_WEIGHT,
            ));
        }
        if let Some(wellness) = sample.subjective.wellness_score() {
            raw.push(("wellness", wellness.clamp(0.0, 100.0), WELLNESS_WEIGHT));
        }
    }

    if let Some(tsb) = tsb.and_then(|t| t.to_f64()) {
        raw.push(("form", (50.0 + tsb * 2.0).clamp(0.0, 100.0), FORM_WEIGHT));
    }

    let total_weight: f64 = raw.iter().map(|(_, _, w)| w).sum();
    if total_weight <= 0.0 {
        return ReadinessScore {
            score: NEUTRAL_READINESS,
            factors: Vec::new(),
        };
    }

    let factors: Vec<ReadinessFactor> = raw
        .into_iter()
        .map(|(name, score, weight)| ReadinessFactor {
            name: name.to_string(),
            score: round_tenth(score),
            weight: (weight / total_weight * 1000.0).round() / 1000.0,
        })
        .collect();

    let weighted: f64 = factors.iter().map(|f| f.score * f.weight).sum();
    let score = weighted.round().clamp(0.0, 100.0) as u8;

    debug!(score, factors = factors.len(), "Readiness score computed");

    ReadinessScore { score, factors }
}
