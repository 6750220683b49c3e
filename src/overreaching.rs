//! Overreaching detection from depressed-HRV streaks
//!
//! Only the current streak counts: the scan starts at the most recent reading and
//! stops at the first day that is not depressed. A depressed episode that has
//! already ended is not reported.
//!
//! | Depressed days | Status | Severity |
//! |---|---|---|
//! | 0 | Normal | - |
//! | 1-2 | Warning | Low |
//! | 3-10 | Functional overreaching | Medium |
//! | 11-21 | Non-functional overreaching | High |
//! | > 21 | Non-functional overreaching | Critical |

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::models::DailySample;
use crate::readiness::{deviation_pct, HrvStatus};

/// Resting heart rate rise (bpm) over baseline treated as corroborating fatigue
pub const RESTING_HR_ELEVATION_BPM: f64 = 5.0;

/// Overreaching detector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverreachingConfig {
    /// Number of most recent samples inspected
    pub window_days: usize,
    /// Minimum valid HRV readings inside the window
    pub min_samples: usize,
}

impl Default for OverreachingConfig {
    fn default() -> Self {
        Self {
            window_days: 21,
            min_samples: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverreachingStatus {
    Normal,
    Warning,
    #[serde(rename = "FOR")]
    FunctionalOverreaching,
    #[serde(rename = "NFOR")]
    NonFunctionalOverreaching,
}

impl fmt::Display for OverreachingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverreachingStatus::Normal => write!(f, "Normal"),
            OverreachingStatus::Warning => write!(f, "Warning"),
            OverreachingStatus::FunctionalOverreaching => write!(f, "Functional Overreaching"),
            OverreachingStatus::NonFunctionalOverreaching => {
                write!(f, "Non-Functional Overreaching")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverreachingAnalysis {
    pub status: OverreachingStatus,
    /// None when status is Normal
    pub severity: Option<Severity>,
    /// Length of the current depressed streak
    pub days_depressed: u32,
    pub recommendation: String,
    pub medical_consult: bool,
    /// Resting heart rate over the streak compared with its baseline, when both are known
    pub resting_hr_elevated: Option<bool>,
    pub message: String,
}

impl OverreachingAnalysis {
    fn insufficient_data(valid: usize, required: usize) -> Self {
        OverreachingAnalysis {
            status: OverreachingStatus::Normal,
            severity: None,
            days_depressed: 0,
            recommendation: "Keep logging morning HRV to enable overreaching detection."
                .to_string(),
            medical_consult: false,
            resting_hr_elevated: None,
            message: format!(
                "Insufficient data: {} valid HRV readings, {} required",
                valid, required
            ),
        }
    }
}

pub struct OverreachingDetector {
    config: OverreachingConfig,
}

impl Default for OverreachingDetector {
    fn default() -> Self {
        Self::new(OverreachingConfig::default())
    }
}

impl OverreachingDetector {
    pub fn new(config: OverreachingConfig) -> Self {
        Self { config }
    }

    /// Analyze date-ordered samples against the HRV baseline mean.
    ///
    /// `resting_hr_baseline` is optional and only feeds the corroboration flag.
    pub fn analyze(
        &self,
        samples: &[DailySample],
        baseline: f64,
        resting_hr_baseline: Option<f64>,
    ) -> OverreachingAnalysis {
        let start = samples.len().saturating_sub(self.config.window_days);
        let window: Vec<&DailySample> = samples[start..]
            .iter()
            .filter(|s| s.valid_hrv().is_some())
            .collect();

        if window.len() < self.config.min_samples || baseline <= 0.0 {
            debug!(
                valid = window.len(),
                baseline, "Overreaching analysis skipped for insufficient data"
            );
            return OverreachingAnalysis::insufficient_data(window.len(), self.config.min_samples);
        }

        let streak: Vec<&DailySample> = window
            .iter()
            .rev()
            .take_while(|s| is_depressed(s, baseline))
            .copied()
            .collect();
        let days_depressed = streak.len() as u32;

        let resting_hr_elevated = resting_hr_baseline.and_then(|rhr_baseline| {
            let readings: Vec<f64> = streak
                .iter()
                .filter_map(|s| s.resting_hr)
                .map(f64::from)
                .collect();
            if readings.is_empty() {
                return None;
            }
            let mean = readings.iter().sum::<f64>() / readings.len() as f64;
            Some(mean - rhr_baseline >= RESTING_HR_ELEVATION_BPM)
        });

        let analysis = Self::classify_streak(days_depressed, resting_hr_elevated);

        if analysis.status != OverreachingStatus::Normal {
            info!(
                days_depressed,
                status = %analysis.status,
                "Depressed HRV streak detected"
            );
        }

        analysis
    }

    fn classify_streak(days: u32, resting_hr_elevated: Option<bool>) -> OverreachingAnalysis {
        let (status, severity, recommendation, medical_consult) = match days {
            0 => (
                OverreachingStatus::Normal,
                None,
                "No sign of overreaching. Continue with the planned training.",
                false,
            ),
            1..=2 => (
                OverreachingStatus::Warning,
                Some(Severity::Low),
                "HRV is suppressed. Monitor closely and favor easy sessions until it recovers.",
                false,
            ),
            3..=10 => (
                OverreachingStatus::FunctionalOverreaching,
                Some(Severity::Medium),
                "Functional overreaching. Taper for 7-14 days with reduced volume and intensity.",
                false,
            ),
            11..=21 => (
                OverreachingStatus::NonFunctionalOverreaching,
                Some(Severity::High),
                "Non-functional overreaching. Unload for 4-6 weeks and consult a sports physician.",
                true,
            ),
            _ => (
                OverreachingStatus::NonFunctionalOverreaching,
                Some(Severity::Critical),
                "Prolonged HRV suppression. Stop structured training and seek medical evaluation before resuming.",
                true,
            ),
        };

        let mut message = if days == 0 {
            "HRV is not currently depressed".to_string()
        } else {
            format!("HRV more than 15% below baseline for {} consecutive days", days)
        };
        if resting_hr_elevated == Some(true) {
            message.push_str("; resting heart rate is elevated");
        }

        OverreachingAnalysis {
            status,
            severity,
            days_depressed: days,
            recommendation: recommendation.to_string(),
            medical_consult,
            resting_hr_elevated,
            message,
        }
    }
}

fn is_depressed(sample: &DailySample, baseline: f64) -> bool {
    sample
        .valid_hrv()
        .and_then(|hrv| deviation_pct(hrv, baseline))
        .is_some_and(|d| HrvStatus::from_deviation(d) == HrvStatus::Red)
}
