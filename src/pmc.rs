use crate::error::{CalculationError, Result};
use crate::models::LoadEntry;
use chrono::{Days, NaiveDate};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// CTL time constant in days
pub const CTL_TIME_CONSTANT: u32 = 42;

/// ATL time constant in days
pub const ATL_TIME_CONSTANT: u32 = 7;

/// Performance Management Chart values for one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PmcPoint {
    pub date: NaiveDate,

    /// Chronic Training Load (fitness)
    pub ctl: Decimal,

    /// Acute Training Load (fatigue)
    pub atl: Decimal,

    /// Training Stress Balance (form, CTL - ATL)
    pub tsb: Decimal,

    /// Total TSS recorded for the day
    pub tss: Decimal,
}

/// PMC window configuration. Time constants are fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PmcConfig {
    /// Days before today included in the emitted series
    pub lookback_days: u32,

    /// Days after today included in the emitted series
    pub forecast_days: u32,

    /// Ramp rate calculation period in days
    pub ramp_rate_days: u16,

    /// Minimum emitted days required for trend analysis
    pub min_trend_days: u16,
}

impl Default for PmcConfig {
    fn default() -> Self {
        PmcConfig {
            lookback_days: 90,
            forecast_days: 7,
            ramp_rate_days: 7,
            min_trend_days: 14,
        }
    }
}

/// Form classification from TSB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormStatus {
    VeryFresh,    // +25 and above
    Fresh,        // +5 to +25
    Neutral,      // -10 to +5
    Fatigued,     // -30 to -10
    VeryFatigued, // Below -30
}

impl FormStatus {
    pub fn from_tsb(tsb: Decimal) -> Self {
        if tsb >= Decimal::from(25) {
            FormStatus::VeryFresh
        } else if tsb >= Decimal::from(5) {
            FormStatus::Fresh
        } else if tsb >= Decimal::from(-10) {
            FormStatus::Neutral
        } else if tsb >= Decimal::from(-30) {
            FormStatus::Fatigued
        } else {
            FormStatus::VeryFatigued
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            FormStatus::VeryFresh => "TSB 25 or higher, load has dropped well below fitness",
            FormStatus::Fresh => "TSB 5 to 25, recovered with fitness intact",
            FormStatus::Neutral => "TSB -10 to 5, load roughly matches fitness",
            FormStatus::Fatigued => "TSB -30 to -10, carrying productive fatigue",
            FormStatus::VeryFatigued => "TSB below -30, fatigue far exceeds fitness",
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            FormStatus::VeryFresh => "Start a build block before detraining sets in",
            FormStatus::Fresh => "Schedule key intervals or a race",
            FormStatus::Neutral => "Keep the planned weekly progression",
            FormStatus::Fatigued => "Keep intensity to one key session until TSB recovers",
            FormStatus::VeryFatigued => "Take easy days until TSB is back above -30",
        }
    }
}

impl std::fmt::Display for FormStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormStatus::VeryFresh => write!(f, "Very Fresh"),
            FormStatus::Fresh => write!(f, "Fresh"),
            FormStatus::Neutral => write!(f, "Neutral"),
            FormStatus::Fatigued => write!(f, "Fatigued"),
            FormStatus::VeryFatigued => write!(f, "Very Fatigued"),
        }
    }
}

/// PMC trend analysis results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PmcTrends {
    pub ctl_trend: TrendDirection,
    pub atl_trend: TrendDirection,
    pub tsb_trend: TrendDirection,

    /// CTL change per week over the most recent ramp period
    pub ctl_ramp_rate: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Increasing,
    Stable,
    Decreasing,
}

/// Relative change below which a metric counts as stable
const TREND_BAND: Decimal = dec!(0.05);

impl TrendDirection {
    /// Direction of `last` relative to `first`. Values near zero are scaled against 1.
    pub fn between(first: Decimal, last: Decimal) -> Self {
        let scale = first.abs().max(Decimal::ONE);
        let relative = (last - first) / scale;
        match relative {
            r if r > TREND_BAND => TrendDirection::Increasing,
            r if r < -TREND_BAND => TrendDirection::Decreasing,
            _ => TrendDirection::Stable,
        }
    }
}

fn round_tenth(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

/// Core PMC calculation engine
pub struct PmcCalculator {
    config: PmcConfig,
}

impl PmcCalculator {
    pub fn new() -> Self {
        PmcCalculator {
            config: PmcConfig::default(),
        }
    }

    pub fn with_config(config: PmcConfig) -> Self {
        PmcCalculator { config }
    }

    pub fn config(&self) -> &PmcConfig {
        &self.config
    }

    /// Sum load entries per calendar day
    pub fn aggregate_daily_tss(entries: &[LoadEntry]) -> BTreeMap<NaiveDate, Decimal> {
        let mut daily_tss: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
        for entry in entries {
            *daily_tss.entry(entry.date).or_insert(Decimal::ZERO) += entry.tss.max(Decimal::ZERO);
        }
        daily_tss
    }

    /// Series for the configured window around `today`, including the forecast horizon
    pub fn calculate(&self, entries: &[LoadEntry], today: NaiveDate) -> Vec<PmcPoint> {
        let start = today
            .checked_sub_days(Days::new(self.config.lookback_days.into()))
            .unwrap_or(today);
        let end = today
            .checked_add_days(Days::new(self.config.forecast_days.into()))
            .unwrap_or(today);
        self.calculate_series(entries, start, end)
    }

    /// PMC rows for `[start, end]`.
    ///
    /// The recurrence starts at the earliest entry when that is older than `start`,
    /// so emitted values carry the full training history.
    pub fn calculate_series(
        &self,
        entries: &[LoadEntry],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<PmcPoint> {
        let daily_tss = Self::aggregate_daily_tss(entries);
        let recurrence_start = daily_tss
            .keys()
            .next()
            .map_or(start, |&earliest| earliest.min(start));

        let ctl_constant = Decimal::from(CTL_TIME_CONSTANT);
        let atl_constant = Decimal::from(ATL_TIME_CONSTANT);
        let mut ctl = Decimal::ZERO;
        let mut atl = Decimal::ZERO;
        let mut series = Vec::new();

        for date in recurrence_start.iter_days().take_while(|d| *d <= end) {
            let tss = daily_tss.get(&date).copied().unwrap_or(Decimal::ZERO);
            ctl += (tss - ctl) / ctl_constant;
            atl += (tss - atl) / atl_constant;

            if date >= start {
                let ctl_rounded = round_tenth(ctl);
                let atl_rounded = round_tenth(atl);
                series.push(PmcPoint {
                    date,
                    ctl: ctl_rounded,
                    atl: atl_rounded,
                    tsb: ctl_rounded - atl_rounded,
                    tss: round_tenth(tss),
                });
            }
        }

        debug!(
            from = %recurrence_start,
            to = %end,
            emitted = series.len(),
            "PMC series calculated"
        );

        series
    }

    /// PMC values on `date`, computed from the full history
    pub fn point_on(&self, entries: &[LoadEntry], date: NaiveDate) -> PmcPoint {
        self.calculate_series(entries, date, date)
            .pop()
            .unwrap_or(PmcPoint {
                date,
                ctl: Decimal::ZERO,
                atl: Decimal::ZERO,
                tsb: Decimal::ZERO,
                tss: Decimal::ZERO,
            })
    }

    /// CTL change per week over the last `ramp_rate_days` of the series
    pub fn ctl_ramp_rate(&self, series: &[PmcPoint]) -> Option<Decimal> {
        let days = self.config.ramp_rate_days as usize;
        if days == 0 || series.len() <= days {
            return None;
        }

        let recent = series[series.len() - 1].ctl;
        let past = series[series.len() - 1 - days].ctl;
        let weeks = Decimal::from(days) / Decimal::from(7);
        Some(round_tenth((recent - past) / weeks))
    }

    /// Analyze PMC trends over the series
    pub fn analyze_trends(&self, series: &[PmcPoint]) -> Result<PmcTrends> {
        if series.len() < self.config.min_trend_days as usize {
            return Err(CalculationError::InsufficientData {
                calculation: "PMC trends".to_string(),
                reason: format!(
                    "need at least {} days, got {}",
                    self.config.min_trend_days,
                    series.len()
                ),
            }
            .into());
        }

        let (Some(first), Some(last)) = (series.first(), series.last()) else {
            return Err(CalculationError::InsufficientData {
                calculation: "PMC trends".to_string(),
                reason: "empty series".to_string(),
            }
            .into());
        };

        Ok(PmcTrends {
            ctl_trend: TrendDirection::between(first.ctl, last.ctl),
            atl_trend: TrendDirection::between(first.atl, last.atl),
            tsb_trend: TrendDirection::between(first.tsb, last.tsb),
            ctl_ramp_rate: self.ctl_ramp_rate(series).unwrap_or(Decimal::ZERO),
        })
    }

    /// Training recommendations for a PMC point
    pub fn recommendations(&self, point: &PmcPoint, ramp_rate: Option<Decimal>) -> Vec<String> {
        let form = FormStatus::from_tsb(point.tsb);
        let mut recommendations = vec![form.recommendation().to_string()];

        if let Some(ramp_rate) = ramp_rate {
            if ramp_rate > Decimal::from(8) {
                recommendations
                    .push("CTL ramp above 8 per week is aggressive, watch HRV for overreaching".to_string());
            } else if ramp_rate < Decimal::from(-5) {
                recommendations.push(
                    "CTL falling more than 5 per week, fitness is being lost".to_string(),
                );
            }
        }

        recommendations
    }
}

impl Default for PmcCalculator {
    fn default() -> Self {
        Self::new()
    }
}
