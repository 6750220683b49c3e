//! Rolling personal baseline for a daily scalar series (HRV)
//!
//! The baseline is recomputed on every request from the most recent window of
//! samples and is never persisted. Fewer than three samples produce a zeroed
//! sentinel rather than an error so callers can render "not enough data".

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::debug;

use crate::models::DailySample;

/// Minimum number of samples for a usable baseline
pub const MIN_BASELINE_SAMPLES: usize = 3;

/// Default baseline window in days
pub const DEFAULT_WINDOW_DAYS: usize = 7;

/// Rolling statistics over the baseline window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    /// mean ± 10%
    pub normal_range: (f64, f64),
    pub sample_size: usize,
}

impl Baseline {
    /// Sentinel returned when the window holds too few samples
    pub fn insufficient() -> Self {
        Baseline {
            mean: 0.0,
            std_dev: 0.0,
            min: 0.0,
            max: 0.0,
            normal_range: (0.0, 0.0),
            sample_size: 0,
        }
    }

    pub fn is_established(&self) -> bool {
        self.sample_size > 0 && self.mean > 0.0
    }
}

pub(crate) fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Compute the baseline from the most recent `window_days` values.
///
/// `values` must be in chronological order.
pub fn compute_baseline(values: &[f64], window_days: usize) -> Baseline {
    let start = values.len().saturating_sub(window_days);
    let window = &values[start..];

    if window.len() < MIN_BASELINE_SAMPLES {
        debug!(
            samples = window.len(),
            required = MIN_BASELINE_SAMPLES,
            "Not enough samples for a baseline"
        );
        return Baseline::insufficient();
    }

    let mean = window.iter().mean();
    let std_dev = window.iter().population_std_dev();
    let min = Statistics::min(window.iter());
    let max = Statistics::max(window.iter());

    Baseline {
        mean: round_tenth(mean),
        std_dev: round_tenth(std_dev),
        min: round_tenth(min),
        max: round_tenth(max),
        normal_range: (round_tenth(mean * 0.9), round_tenth(mean * 1.1)),
        sample_size: window.len(),
    }
}

/// HRV baseline from date-ordered daily samples, ignoring days without a reading
pub fn hrv_baseline(samples: &[DailySample], window_days: usize) -> Baseline {
    let values: Vec<f64> = samples.iter().filter_map(|s| s.valid_hrv()).collect();
    compute_baseline(&values, window_days)
}

/// Mean resting heart rate over the window, None below the minimum sample count
pub fn resting_hr_baseline(samples: &[DailySample], window_days: usize) -> Option<f64> {
    let values: Vec<f64> = samples
        .iter()
        .filter_map(|s| s.resting_hr)
        .map(f64::from)
        .collect();
    let baseline = compute_baseline(&values, window_days);
    baseline.is_established().then_some(baseline.mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_insufficient_samples_return_sentinel() {
        for values in [vec![], vec![50.0], vec![50.0, 60.0]] {
            let baseline = compute_baseline(&values, 7);
            assert_eq!(baseline.mean, 0.0);
            assert_eq!(baseline.sample_size, 0);
            assert!(!baseline.mean.is_nan());
        }
    }

    #[test]
    fn test_window_keeps_most_recent_values() {
        let values = vec![10.0, 10.0, 10.0, 60.0, 60.0, 60.0];
        let baseline = compute_baseline(&values, 3);
        assert_eq!(baseline.mean, 60.0);
        assert_eq!(baseline.sample_size, 3);
        assert_eq!(baseline.std_dev, 0.0);
    }

    #[test]
    fn test_window_larger_than_history_uses_everything() {
        let values = vec![50.0, 60.0, 70.0];
        let baseline = compute_baseline(&values, 30);
        assert_eq!(baseline.sample_size, 3);
        assert_eq!(baseline.mean, 60.0);
        assert_eq!(baseline.min, 50.0);
        assert_eq!(baseline.max, 70.0);
        // population std dev of 50, 60, 70 = sqrt(200/3) = 8.16
        assert_eq!(baseline.std_dev, 8.2);
        assert_eq!(baseline.normal_range, (54.0, 66.0));
    }

    #[test]
    fn test_hrv_baseline_skips_missing_readings() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let mut samples: Vec<DailySample> = (0..4)
            .map(|i| DailySample::with_hrv(date + chrono::Days::new(i), 60.0))
            .collect();
        samples[1].hrv = None;

        let baseline = hrv_baseline(&samples, 7);
        assert_eq!(baseline.sample_size, 3);
        assert_eq!(baseline.mean, 60.0);
    }

    #[test]
    fn test_resting_hr_baseline() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let samples: Vec<DailySample> = [48u16, 50, 52]
            .iter()
            .enumerate()
            .map(|(i, &hr)| DailySample {
                resting_hr: Some(hr),
                ..DailySample::with_hrv(date + chrono::Days::new(i as u64), 60.0)
            })
            .collect();
        assert_eq!(resting_hr_baseline(&samples, 7), Some(50.0));
        assert_eq!(resting_hr_baseline(&samples[..2], 7), None);
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_baseline_never_nan(
            values in prop::collection::vec(10.0f64..150.0, 0..40),
            window in 1usize..30,
        ) {
            let baseline = compute_baseline(&values, window);
            prop_assert!(baseline.mean.is_finite());
            prop_assert!(baseline.std_dev.is_finite());
            if values.len().min(window) < MIN_BASELINE_SAMPLES {
                prop_assert_eq!(baseline.sample_size, 0);
                prop_assert_eq!(baseline.mean, 0.0);
            } else {
                prop_assert!(baseline.min <= baseline.mean && baseline.mean <= baseline.max);
            }
        }
    }
}
