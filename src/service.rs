//! Per-athlete facade over the engine
//!
//! Every call reads the athlete's history through the store and recomputes its
//! result. Nothing is cached between calls.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::adaptive::{daily_adjustment, DailyAdjustment};
use crate::analysis::AthleteAnalysis;
use crate::baseline::{hrv_baseline, resting_hr_baseline, Baseline, MIN_BASELINE_SAMPLES};
use crate::config::EngineConfig;
use crate::error::{CoachError, Result};
use crate::generator::{HttpWorkoutGenerator, WorkoutGenerator};
use crate::mesocycle::{Mesocycle, MesocycleBuilder};
use crate::models::{DailySample, PowerSample};
use crate::overreaching::{OverreachingAnalysis, OverreachingDetector};
use crate::pmc::{PmcCalculator, PmcPoint, PmcTrends};
use crate::power::{PowerModel, PowerPhenotype, WorkoutPowerMetrics};
use crate::readiness::ReadinessResult;
use crate::recommender::{self, ProtocolRecommendation};
use crate::store::AthleteStore;

pub struct CoachService<S: AthleteStore> {
    store: S,
    config: EngineConfig,
    pmc: PmcCalculator,
    detector: OverreachingDetector,
    builder: MesocycleBuilder,
}

impl<S: AthleteStore> CoachService<S> {
    /// Service planning from the template library only
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self {
            pmc: PmcCalculator::with_config(config.pmc.clone()),
            detector: OverreachingDetector::new(config.overreaching.clone()),
            builder: MesocycleBuilder::new(),
            store,
            config,
        }
    }

    /// Service wired to the HTTP generator when the configuration enables one
    pub fn from_config(store: S, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let generator = HttpWorkoutGenerator::from_config(&config.generator)?;
        let timeout = config.generator.timeout();
        let service = Self::new(store, config);
        Ok(match generator {
            Some(generator) => service.with_generator(Arc::new(generator), timeout),
            None => service,
        })
    }

    pub fn with_generator(
        mut self,
        generator: Arc<dyn WorkoutGenerator>,
        timeout: std::time::Duration,
    ) -> Self {
        self.builder = MesocycleBuilder::with_generator(generator, timeout);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn samples_until(&self, athlete_id: &str, today: NaiveDate) -> Result<Vec<DailySample>> {
        let mut samples = self.store.list_daily_samples(athlete_id)?;
        samples.retain(|s| s.date <= today);
        Ok(samples)
    }

    /// PMC series over the configured lookback ending at `today`
    #[instrument(skip(self))]
    pub fn pmc(&self, athlete_id: &str, today: NaiveDate) -> Result<Vec<PmcPoint>> {
        let loads = self.store.list_load_entries(athlete_id)?;
        Ok(self.pmc.calculate(&loads, today))
    }

    /// Trends over the lookback window, forecast days excluded
    pub fn pmc_trends(&self, athlete_id: &str, today: NaiveDate) -> Result<PmcTrends> {
        let mut series = self.pmc(athlete_id, today)?;
        series.retain(|p| p.date <= today);
        self.pmc.analyze_trends(&series)
    }

    /// HRV baseline from the readings before `today`
    pub fn hrv_baseline(&self, athlete_id: &str, today: NaiveDate) -> Result<Baseline> {
        let mut samples = self.store.list_daily_samples(athlete_id)?;
        samples.retain(|s| s.date < today);
        Ok(hrv_baseline(&samples, self.config.baseline.window_days))
    }

    /// Today's HRV classification. A day without a reading reports GREEN.
    pub fn readiness(&self, athlete_id: &str, today: NaiveDate) -> Result<ReadinessResult> {
        let analysis = self.analysis(athlete_id, today)?;
        let hrv = analysis.hrv;
        let streak = hrv.current.map(|_| hrv.days_in_status);
        Ok(ReadinessResult {
            status: hrv.status,
            deviation_pct: hrv.deviation_pct,
            recommendation: hrv.status.recommendation(streak).to_string(),
        })
    }

    /// Overreaching over the detection window ending at `today`.
    ///
    /// The reference baseline comes from the readings before the window. Short
    /// histories use the earliest readings instead.
    #[instrument(skip(self))]
    pub fn overreaching(&self, athlete_id: &str, today: NaiveDate) -> Result<OverreachingAnalysis> {
        let samples = self.samples_until(athlete_id, today)?;
        let window_start = samples
            .len()
            .saturating_sub(self.config.overreaching.window_days);
        let window_days = self.config.baseline.window_days;

        let mut baseline = hrv_baseline(&samples[..window_start], window_days);
        let mut rhr_baseline = resting_hr_baseline(&samples[..window_start], window_days);
        if baseline.sample_size < MIN_BASELINE_SAMPLES {
            let earliest: Vec<DailySample> = samples
                .iter()
                .filter(|s| s.valid_hrv().is_some())
                .take(window_days)
                .cloned()
                .collect();
            baseline = hrv_baseline(&earliest, window_days);
            rhr_baseline = resting_hr_baseline(&earliest, window_days);
            debug!(
                sample_size = baseline.sample_size,
                "Overreaching baseline taken from earliest readings"
            );
        }

        Ok(self.detector.analyze(&samples, baseline.mean, rhr_baseline))
    }

    pub fn analysis(&self, athlete_id: &str, today: NaiveDate) -> Result<AthleteAnalysis> {
        let profile = self.store.get_athlete_profile(athlete_id)?;
        let samples = self.store.list_daily_samples(athlete_id)?;
        let loads = self.store.list_load_entries(athlete_id)?;
        Ok(AthleteAnalysis::build(
            &profile,
            &samples,
            &loads,
            today,
            self.config.baseline.window_days,
            &self.pmc,
        ))
    }

    #[instrument(skip(self))]
    pub fn recommend(&self, athlete_id: &str, today: NaiveDate) -> Result<ProtocolRecommendation> {
        let analysis = self.analysis(athlete_id, today)?;
        let protocols = self.store.list_protocols()?;
        let recommendation = recommender::recommend(&protocols, &analysis)?;
        info!(
            primary = %recommendation.primary.protocol.id,
            score = recommendation.primary.score,
            "Protocol recommended"
        );
        Ok(recommendation)
    }

    /// Adjustment for today's planned session from HRV status and reported signals
    pub fn daily_adjustment<T: AsRef<str>>(
        &self,
        athlete_id: &str,
        today: NaiveDate,
        signals: &[T],
    ) -> Result<DailyAdjustment> {
        let analysis = self.analysis(athlete_id, today)?;
        Ok(daily_adjustment(analysis.hrv.status, signals))
    }

    /// Plan a mesocycle for `protocol_id`, or for the recommended protocol when none is given
    #[instrument(skip(self))]
    pub async fn plan_mesocycle(
        &self,
        athlete_id: &str,
        protocol_id: Option<&str>,
        weeks: u32,
        start_date: NaiveDate,
        today: NaiveDate,
    ) -> Result<Mesocycle> {
        let profile = self.store.get_athlete_profile(athlete_id)?;
        let analysis = self.analysis(athlete_id, today)?;
        let protocols = self.store.list_protocols()?;

        let (protocol, rationale) = match protocol_id {
            Some(id) => {
                let mut matching = protocols.iter().filter(|p| p.id == id);
                let protocol = matching
                    .next()
                    .cloned()
                    .ok_or_else(|| CoachError::not_found("Protocol", id))?;
                if matching.next().is_some() {
                    return Err(CoachError::Configuration(format!(
                        "protocol id {} is defined more than once",
                        id
                    )));
                }
                let rationale = recommender::score(&protocol, &analysis).rationale();
                (protocol, rationale)
            }
            None => {
                let primary = recommender::recommend(&protocols, &analysis)?.primary;
                (primary.protocol, primary.rationale)
            }
        };

        self.builder
            .build(&profile, &protocol, rationale, weeks, start_date)
            .await
    }

    pub fn workout_metrics(
        &self,
        athlete_id: &str,
        samples: &[PowerSample],
    ) -> Result<WorkoutPowerMetrics> {
        let profile = self.store.get_athlete_profile(athlete_id)?;
        PowerModel::workout_metrics(samples, profile.ftp)
    }

    pub fn phenotype(&self, athlete_id: &str, samples: &[PowerSample]) -> Result<PowerPhenotype> {
        let profile = self.store.get_athlete_profile(athlete_id)?;
        PowerModel::phenotype(samples, &profile)
    }
}
