//! Cycling power model
//!
//! Pure functions over a decoded power sample series: mean maximal power, normalized
//! power, intensity factor, training stress score, the two-parameter critical power
//! model, and phenotype metrics (VLamax estimate, anaerobic power reserve, rider
//! profile, somatotype).
//!
//! Samples are assumed to be recorded at 1 Hz. Dropouts (`power: None`) count as
//! zero watts so that sliding windows keep their wall-clock meaning.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::{CalculationError, Result};
use crate::models::{AthleteProfile, PowerSample};

/// Durations (seconds) reported in a mean maximal power curve
pub const STANDARD_DURATIONS: [u32; 12] = [1, 5, 10, 15, 30, 60, 180, 300, 600, 720, 1200, 3600];

/// Durations used to build the critical power regression from raw samples
pub const CP_TEST_DURATIONS: [u32; 4] = [180, 300, 720, 1200];

/// Best sustained power for a given duration, used as regression input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerDurationPoint {
    pub duration_seconds: u32,
    pub watts: u16,
}

impl PowerDurationPoint {
    pub fn new(duration_seconds: u32, watts: u16) -> Self {
        PowerDurationPoint {
            duration_seconds,
            watts,
        }
    }
}

/// Two-parameter critical power model fitted on work vs. time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalPowerModel {
    /// Critical Power (CP) - sustainable power in watts
    pub critical_power: u16,
    /// W' (W-prime) - finite work capacity above CP in joules
    pub w_prime: u32,
    /// FTP estimated as 96% of CP
    pub derived_ftp: u16,
    /// Fit quality on the work-time line
    pub r_squared: Decimal,
    /// Number of points used in the fit
    pub points_used: usize,
}

/// Power-based metrics for one workout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutPowerMetrics {
    pub duration_seconds: u32,
    pub average_power: u16,
    pub normalized_power: u16,
    /// Variability Index (VI = NP/Average Power)
    pub variability_index: Decimal,
    pub intensity_factor: Decimal,
    pub tss: Decimal,
}

/// Rider phenotype derived from the power-duration relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiderProfile {
    Sprinter,
    TimeTrialist,
    Climber,
    AllRounder,
}

impl std::fmt::Display for RiderProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiderProfile::Sprinter => write!(f, "Sprinter"),
            RiderProfile::TimeTrialist => write!(f, "Time Trialist"),
            RiderProfile::Climber => write!(f, "Climber"),
            RiderProfile::AllRounder => write!(f, "All-Rounder"),
        }
    }
}

/// Body type classification from BMI and sprint ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Somatotype {
    Ectomorph,
    Mesomorph,
    MesomorphSprint,
    Endomorph,
}

impl std::fmt::Display for Somatotype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Somatotype::Ectomorph => write!(f, "Ectomorph"),
            Somatotype::Mesomorph => write!(f, "Mesomorph"),
            Somatotype::MesomorphSprint => write!(f, "Mesomorph (Sprint)"),
            Somatotype::Endomorph => write!(f, "Endomorph"),
        }
    }
}

/// Combined phenotype report for an athlete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerPhenotype {
    pub peak_power: u16,
    /// 5-minute power, used as the maximal aerobic power estimate
    pub map: u16,
    pub critical_power: Option<CriticalPowerModel>,
    pub vlamax: Decimal,
    pub anaerobic_power_reserve: i32,
    pub rider_profile: RiderProfile,
    pub bmi: Option<Decimal>,
    pub somatotype: Option<Somatotype>,
}

fn round_ratio(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn round_tenth(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

fn to_watts(value: f64) -> u16 {
    value.round().clamp(0.0, u16::MAX as f64) as u16
}

/// Main power model
pub struct PowerModel;

impl PowerModel {
    /// Power values in sample order, dropouts as zero
    pub fn power_series(samples: &[PowerSample]) -> Vec<u16> {
        samples.iter().map(|s| s.power.unwrap_or(0)).collect()
    }

    /// Mean Maximal Power for a specific duration, rounded to the watt
    pub fn mean_maximal_power(samples: &[PowerSample], duration_seconds: u32) -> u16 {
        Self::mmp_from_series(&Self::power_series(samples), duration_seconds)
    }

    fn mmp_from_series(power_data: &[u16], duration_seconds: u32) -> u16 {
        let window_size = duration_seconds as usize;
        if window_size == 0 || power_data.len() < window_size {
            return 0;
        }

        let mut window_sum: u64 = power_data[..window_size].iter().map(|&p| p as u64).sum();
        let mut max_sum = window_sum;

        for i in window_size..power_data.len() {
            window_sum += power_data[i] as u64;
            window_sum -= power_data[i - window_size] as u64;
            max_sum = max_sum.max(window_sum);
        }

        to_watts(max_sum as f64 / window_size as f64)
    }

    /// Plain average power, rounded to the watt
    pub fn average_power(samples: &[PowerSample]) -> u16 {
        if samples.is_empty() {
            return 0;
        }
        let series = Self::power_series(samples);
        let total: u64 = series.iter().map(|&p| p as u64).sum();
        to_watts(total as f64 / series.len() as f64)
    }

    /// Normalized Power with 30-second rolling average.
    /// Falls back to average power below 30 samples.
    pub fn normalized_power(samples: &[PowerSample]) -> u16 {
        if samples.len() < 30 {
            return Self::average_power(samples);
        }

        let power_data = Self::power_series(samples);

        let fourth_powers: Vec<f64> = power_data
            .windows(30)
            .map(|window| {
                let avg = window.iter().map(|&p| p as f64).sum::<f64>() / 30.0;
                avg.powi(4)
            })
            .collect();

        let avg_fourth_power = fourth_powers.iter().sum::<f64>() / fourth_powers.len() as f64;

        to_watts(avg_fourth_power.powf(0.25))
    }

    /// Intensity Factor (IF = NP/FTP), 0 without FTP
    pub fn intensity_factor(normalized_power: u16, ftp: Option<u16>) -> Decimal {
        match ftp {
            Some(ftp) if ftp > 0 => {
                round_ratio(Decimal::from(normalized_power) / Decimal::from(ftp))
            }
            _ => Decimal::ZERO,
        }
    }

    /// TSS = duration × NP × IF / (FTP × 3600) × 100, 0 without FTP
    pub fn training_stress_score(
        duration_seconds: u32,
        normalized_power: u16,
        intensity_factor: Decimal,
        ftp: Option<u16>,
    ) -> Decimal {
        let ftp = match ftp {
            Some(ftp) if ftp > 0 => ftp,
            _ => return Decimal::ZERO,
        };

        let tss = Decimal::from(duration_seconds) * Decimal::from(normalized_power) * intensity_factor
            / (Decimal::from(ftp) * dec!(3600))
            * dec!(100);

        round_tenth(tss)
    }

    /// Fit the 2-parameter CP model on work = CP·t + W'.
    ///
    /// Ordinary least squares on (t, P·t): slope is CP in watts, intercept is W' in joules.
    pub fn critical_power_model(points: &[PowerDurationPoint]) -> Result<CriticalPowerModel> {
        if points.len() < 2 {
            return Err(CalculationError::InsufficientData {
                calculation: "critical power".to_string(),
                reason: format!("need at least 2 power-duration points, got {}", points.len()),
            }
            .into());
        }

        let n = points.len() as f64;
        let mut sum_x = 0.0;
        let mut sum_y = 0.0;
        let mut sum_xx = 0.0;
        let mut sum_xy = 0.0;

        for point in points {
            let x = point.duration_seconds as f64;
            let y = point.watts as f64 * x;
            sum_x += x;
            sum_y += y;
            sum_xx += x * x;
            sum_xy += x * y;
        }

        let denominator = n * sum_xx - sum_x * sum_x;
        if denominator.abs() < f64::EPSILON {
            return Err(CalculationError::InvalidParameter {
                calculation: "critical power".to_string(),
                parameter: "duration_seconds".to_string(),
                value: "all points share the same duration".to_string(),
            }
            .into());
        }

        let cp = (n * sum_xy - sum_x * sum_y) / denominator;
        let w_prime = (sum_y - cp * sum_x) / n;

        let mean_y = sum_y / n;
        let mut ss_tot = 0.0;
        let mut ss_res = 0.0;
        for point in points {
            let x = point.duration_seconds as f64;
            let y = point.watts as f64 * x;
            ss_tot += (y - mean_y).powi(2);
            ss_res += (y - (cp * x + w_prime)).powi(2);
        }
        let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 1.0 };

        if w_prime < 0.0 {
            warn!(w_prime, "Regression produced negative W', clamping to zero");
        }

        let model = CriticalPowerModel {
            critical_power: to_watts(cp),
            w_prime: w_prime.max(0.0).round() as u32,
            derived_ftp: to_watts(cp * 0.96),
            r_squared: round_ratio(Decimal::from_f64(r_squared).unwrap_or(Decimal::ZERO)),
            points_used: points.len(),
        };

        debug!(
            cp = model.critical_power,
            w_prime = model.w_prime,
            r_squared = %model.r_squared,
            "Critical power model fitted"
        );

        Ok(model)
    }

    /// Peak 1-second power
    pub fn estimate_peak_power(samples: &[PowerSample]) -> u16 {
        Self::mean_maximal_power(samples, 1)
    }

    /// VLamax estimate in mmol/L/s: (Pmax - CP) × 0.1 / 100
    pub fn estimate_vlamax(pmax: Option<u16>, cp: Option<u16>) -> Decimal {
        match (pmax, cp) {
            (Some(pmax), Some(cp)) if pmax > 0 && cp > 0 => {
                let diff = Decimal::from(pmax) - Decimal::from(cp);
                round_ratio(diff * dec!(0.1) / dec!(100))
            }
            _ => Decimal::ZERO,
        }
    }

    /// Anaerobic Power Reserve: Pmax - MAP
    pub fn anaerobic_power_reserve(pmax: Option<u16>, map: Option<u16>) -> i32 {
        match (pmax, map) {
            (Some(pmax), Some(map)) if pmax > 0 && map > 0 => pmax as i32 - map as i32,
            _ => 0,
        }
    }

    /// Classify the rider from peak power, FTP and optional anaerobic markers
    pub fn rider_profile(
        pmax: Option<u16>,
        ftp: Option<u16>,
        w_prime: Option<u32>,
        vlamax: Option<Decimal>,
        apr: Option<i32>,
    ) -> RiderProfile {
        let (pmax, ftp) = match (pmax, ftp) {
            (Some(pmax), Some(ftp)) if pmax > 0 && ftp > 0 => (pmax, ftp),
            _ => return RiderProfile::AllRounder,
        };

        if let Some(vlamax) = vlamax {
            if vlamax >= dec!(0.6) {
                return RiderProfile::Sprinter;
            }
            if vlamax <= dec!(0.3) {
                return RiderProfile::TimeTrialist;
            }
        }

        let ratio = pmax as f64 / ftp as f64;

        if ratio > 3.5 {
            RiderProfile::Sprinter
        } else if ratio < 2.0 {
            // Without an APR reading the low ratio alone points at a steady-state rider
            if apr.unwrap_or(0) < 200 {
                RiderProfile::TimeTrialist
            } else {
                RiderProfile::Climber
            }
        } else {
            match w_prime {
                Some(w_prime) if w_prime > 25_000 => RiderProfile::AllRounder,
                Some(_) => RiderProfile::TimeTrialist,
                None if ratio > 2.8 => RiderProfile::Sprinter,
                None => RiderProfile::AllRounder,
            }
        }
    }

    /// Body mass index, one decimal. 0 without a height.
    pub fn bmi(weight_kg: Decimal, height_cm: u16) -> Decimal {
        if height_cm == 0 {
            return Decimal::ZERO;
        }
        let height_m = Decimal::from(height_cm) / dec!(100);
        round_tenth(weight_kg / (height_m * height_m))
    }

    pub fn somatotype(bmi: Decimal, pmax: Option<u16>, ftp: Option<u16>) -> Somatotype {
        if bmi < dec!(20) {
            Somatotype::Ectomorph
        } else if bmi <= dec!(25) {
            let sprint = match (pmax, ftp) {
                (Some(pmax), Some(ftp)) if ftp > 0 => pmax as f64 / ftp as f64 > 3.0,
                _ => false,
            };
            if sprint {
                Somatotype::MesomorphSprint
            } else {
                Somatotype::Mesomorph
            }
        } else {
            Somatotype::Endomorph
        }
    }

    /// Mean maximal power at the standard durations the series is long enough for
    pub fn power_curve(samples: &[PowerSample]) -> BTreeMap<u32, u16> {
        let series = Self::power_series(samples);
        STANDARD_DURATIONS
            .iter()
            .filter(|&&d| series.len() >= d as usize)
            .map(|&d| (d, Self::mmp_from_series(&series, d)))
            .collect()
    }

    /// Best efforts at the given durations, skipping durations with no data
    pub fn best_efforts(samples: &[PowerSample], durations: &[u32]) -> Vec<PowerDurationPoint> {
        let series = Self::power_series(samples);
        durations
            .iter()
            .map(|&d| PowerDurationPoint::new(d, Self::mmp_from_series(&series, d)))
            .filter(|p| p.watts > 0)
            .collect()
    }

    /// Average power, NP, VI, IF and TSS for one workout
    pub fn workout_metrics(samples: &[PowerSample], ftp: Option<u16>) -> Result<WorkoutPowerMetrics> {
        if samples.iter().all(|s| s.power.is_none()) {
            return Err(CalculationError::InsufficientData {
                calculation: "workout power metrics".to_string(),
                reason: "no power data available".to_string(),
            }
            .into());
        }

        let duration_seconds = match (samples.first(), samples.last()) {
            (Some(first), Some(last)) => {
                (last.timestamp.saturating_sub(first.timestamp) + 1).max(samples.len() as u32)
            }
            _ => 0,
        };

        let average_power = Self::average_power(samples);
        let normalized_power = Self::normalized_power(samples);
        let variability_index = if average_power > 0 {
            round_ratio(Decimal::from(normalized_power) / Decimal::from(average_power))
        } else {
            Decimal::ZERO
        };
        let intensity_factor = Self::intensity_factor(normalized_power, ftp);
        let tss =
            Self::training_stress_score(duration_seconds, normalized_power, intensity_factor, ftp);

        Ok(WorkoutPowerMetrics {
            duration_seconds,
            average_power,
            normalized_power,
            variability_index,
            intensity_factor,
            tss,
        })
    }

    /// Full phenotype from a maximal-effort history. Requires FTP on the profile.
    pub fn phenotype(samples: &[PowerSample], profile: &AthleteProfile) -> Result<PowerPhenotype> {
        let ftp = profile.ftp.filter(|f| *f > 0).ok_or_else(|| {
            CalculationError::MissingProfile {
                field: "ftp".to_string(),
            }
        })?;

        let peak_power = Self::estimate_peak_power(samples);
        let map = Self::mean_maximal_power(samples, 300);

        let efforts = Self::best_efforts(samples, &CP_TEST_DURATIONS);
        let critical_power = match Self::critical_power_model(&efforts) {
            Ok(model) => Some(model),
            Err(e) => {
                debug!(error = %e, "Skipping CP model for phenotype");
                None
            }
        };

        let cp = critical_power.as_ref().map(|m| m.critical_power);
        let vlamax = Self::estimate_vlamax(Some(peak_power), cp);
        let apr = Self::anaerobic_power_reserve(Some(peak_power), Some(map));
        let rider_profile = Self::rider_profile(
            Some(peak_power),
            Some(ftp),
            critical_power.as_ref().map(|m| m.w_prime),
            cp.map(|_| vlamax),
            Some(apr),
        );

        let bmi = match (profile.weight, profile.height) {
            (Some(weight), Some(height)) if height > 0 => Some(Self::bmi(weight, height)),
            _ => None,
        };
        let somatotype = bmi.map(|b| Self::somatotype(b, Some(peak_power), Some(ftp)));

        Ok(PowerPhenotype {
            peak_power,
            map,
            critical_power,
            vlamax,
            anaerobic_power_reserve: apr,
            rider_profile,
            bmi,
            somatotype,
        })
    }
}
