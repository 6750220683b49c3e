//! Read-only athlete snapshot combining HRV, PMC, readiness and profile data
//!
//! The snapshot is rebuilt from the full history for every planning request and is
//! the single input of protocol scoring.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::baseline::{hrv_baseline, resting_hr_baseline, Baseline};
use crate::models::{AthleteProfile, DailySample, ExperienceLevel, LoadEntry};
use crate::pmc::{FormStatus, PmcCalculator};
use crate::readiness::{classify, days_in_status, readiness_score, HrvStatus, ReadinessScore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HrvSnapshot {
    /// Today's reading, if one was logged
    pub current: Option<f64>,
    pub baseline: Baseline,
    pub status: HrvStatus,
    pub deviation_pct: f64,
    pub days_in_status: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PmcSnapshot {
    pub ctl: Decimal,
    pub atl: Decimal,
    pub tsb: Decimal,
    pub form_status: FormStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub ftp: Option<u16>,
    pub max_hr: Option<u16>,
    pub weight: Option<Decimal>,
    pub experience: ExperienceLevel,
}

impl From<&AthleteProfile> for ProfileSnapshot {
    fn from(profile: &AthleteProfile) -> Self {
        ProfileSnapshot {
            ftp: profile.ftp,
            max_hr: profile.max_hr,
            weight: profile.weight,
            experience: profile.experience,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AthleteAnalysis {
    pub athlete_id: String,
    pub date: NaiveDate,
    pub hrv: HrvSnapshot,
    pub pmc: PmcSnapshot,
    pub readiness: ReadinessScore,
    pub profile: ProfileSnapshot,
}

impl AthleteAnalysis {
    /// Build the snapshot for `today`.
    ///
    /// `samples` must be date-ordered. The HRV baseline is taken from the readings
    /// before today so today's value does not pull its own reference.
    #[instrument(skip_all, fields(athlete = %profile.id, date = %today))]
    pub fn build(
        profile: &AthleteProfile,
        samples: &[DailySample],
        loads: &[LoadEntry],
        today: NaiveDate,
        baseline_window: usize,
        pmc: &PmcCalculator,
    ) -> Self {
        let history: Vec<DailySample> = samples
            .iter()
            .filter(|s| s.date < today)
            .cloned()
            .collect();
        let today_sample = samples.iter().find(|s| s.date == today);

        let baseline = hrv_baseline(&history, baseline_window);
        let rhr_baseline = resting_hr_baseline(&history, baseline_window);
        let current = today_sample.and_then(|s| s.valid_hrv());

        let hrv = match current {
            Some(value) => {
                let result = classify(value, baseline.mean);
                let upto_today: Vec<DailySample> =
                    samples.iter().filter(|s| s.date <= today).cloned().collect();
                HrvSnapshot {
                    current,
                    status: result.status,
                    deviation_pct: result.deviation_pct,
                    days_in_status: days_in_status(&upto_today, &baseline),
                    baseline,
                }
            }
            None => HrvSnapshot {
                current: None,
                status: HrvStatus::Green,
                deviation_pct: 0.0,
                days_in_status: 0,
                baseline,
            },
        };

        let point = pmc.point_on(loads, today);
        let pmc_snapshot = PmcSnapshot {
            ctl: point.ctl,
            atl: point.atl,
            tsb: point.tsb,
            form_status: FormStatus::from_tsb(point.tsb),
        };

        let readiness = readiness_score(today_sample, &hrv.baseline, rhr_baseline, Some(point.tsb));

        debug!(
            status = %hrv.status,
            tsb = %pmc_snapshot.tsb,
            readiness = readiness.score,
            "Athlete analysis built"
        );

        AthleteAnalysis {
            athlete_id: profile.id.clone(),
            date: today,
            hrv,
            pmc: pmc_snapshot,
            readiness,
            profile: ProfileSnapshot::from(profile),
        }
    }
}
