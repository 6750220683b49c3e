use chrono::{Days, NaiveDate};
use coachrs::adaptive::{apply_adjustment, daily_adjustment, AdjustmentAction};
use coachrs::config::EngineConfig;
use coachrs::models::{
    AthleteProfile, DailySample, ExperienceLevel, IntervalKind, LoadEntry, PowerSample,
    WorkoutInterval, WorkoutTemplate, WorkoutType,
};
use coachrs::overreaching::{OverreachingDetector, OverreachingStatus, Severity};
use coachrs::pmc::PmcCalculator;
use coachrs::power::{PowerDurationPoint, PowerModel};
use coachrs::readiness::{classify, HrvStatus};
use coachrs::service::CoachService;
use coachrs::store::{AthleteHistory, InMemoryStore};
use coachrs::CoachError;
use rust_decimal_macros::dec;

/// Integration tests that run complete engine workflows

#[cfg(test)]
mod integration_tests {
    use super::*;

    fn create_test_athlete() -> AthleteProfile {
        AthleteProfile {
            id: "test_athlete".to_string(),
            name: "Test Athlete".to_string(),
            ftp: Some(250),
            max_hr: Some(190),
            resting_hr: Some(50),
            weight: Some(dec!(70.0)),
            height: Some(175),
            experience: ExperienceLevel::Intermediate,
        }
    }

    fn day(offset: u64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap() + Days::new(offset)
    }

    /// 35 days of steady riding with stable HRV
    fn steady_history() -> AthleteHistory {
        let mut daily_samples = Vec::new();
        let mut load_entries = Vec::new();
        for offset in 0..35 {
            let mut sample = DailySample::with_hrv(day(offset), 62.0 + (offset % 3) as f64);
            sample.resting_hr = Some(48);
            sample.sleep_quality = Some(8);
            sample.sleep_duration_hours = Some(7.5);
            daily_samples.push(sample);
            if offset % 7 != 6 {
                load_entries.push(LoadEntry::new(day(offset), dec!(55)).unwrap());
            }
        }
        AthleteHistory {
            profile: create_test_athlete(),
            daily_samples,
            load_entries,
        }
    }

    #[test]
    fn test_critical_power_end_to_end() {
        let points = vec![
            PowerDurationPoint::new(180, 320),
            PowerDurationPoint::new(720, 260),
        ];
        let model = PowerModel::critical_power_model(&points).unwrap();

        assert_eq!(model.critical_power, 240);
        assert_eq!(model.w_prime, 14400);
        assert_eq!(model.derived_ftp, 230);
        assert_eq!(model.points_used, 2);
    }

    #[test]
    fn test_critical_power_needs_two_points() {
        assert!(PowerModel::critical_power_model(&[]).is_err());
        assert!(PowerModel::critical_power_model(&[PowerDurationPoint::new(180, 300)]).is_err());
        assert!(PowerModel::critical_power_model(&[
            PowerDurationPoint::new(180, 300),
            PowerDurationPoint::new(720, 250),
        ])
        .is_ok());
    }

    #[test]
    fn test_workout_metrics_feed_pmc() {
        // 1 hour at exactly FTP
        let samples: Vec<PowerSample> = (0..3600)
            .map(|t| PowerSample {
                timestamp: t,
                power: Some(250),
                heart_rate: None,
            })
            .collect();
        let metrics = PowerModel::workout_metrics(&samples, Some(250)).unwrap();
        assert_eq!(metrics.normalized_power, 250);
        assert_eq!(metrics.intensity_factor, dec!(1.00));
        assert_eq!(metrics.tss, dec!(100.0));

        let entry = LoadEntry::from_workout(day(0), &metrics);
        let point = PmcCalculator::new().point_on(&[entry], day(0));
        assert_eq!(point.ctl, dec!(2.4));
        assert_eq!(point.atl, dec!(14.3));
        assert_eq!(point.tsb, dec!(-11.9));
    }

    #[test]
    fn test_readiness_boundaries() {
        assert_eq!(classify(57.0, 60.0).status, HrvStatus::Green);
        assert_eq!(classify(60.0 * 0.94999, 60.0).status, HrvStatus::Yellow);
        assert_eq!(classify(51.0, 60.0).status, HrvStatus::Yellow);
        assert_eq!(classify(60.0 * 0.84999, 60.0).status, HrvStatus::Red);
        assert_eq!(classify(40.0, 0.0).status, HrvStatus::Green);
        assert_eq!(classify(40.0, 0.0).deviation_pct, 0.0);
    }

    #[test]
    fn test_non_functional_overreaching_scenario() {
        let samples: Vec<DailySample> = (0..21)
            .map(|offset| {
                let hrv = if offset < 9 { 60.0 } else { 48.0 };
                DailySample::with_hrv(day(offset), hrv)
            })
            .collect();

        let analysis = OverreachingDetector::default().analyze(&samples, 60.0, None);

        assert_eq!(analysis.status, OverreachingStatus::NonFunctionalOverreaching);
        assert!(analysis.days_depressed >= 11);
        assert_eq!(analysis.severity, Some(Severity::High));
        assert!(analysis.medical_consult);
    }

    #[test]
    fn test_adaptive_scenarios() {
        let none: [&str; 0] = [];
        let red = daily_adjustment(HrvStatus::Red, &none);
        assert_eq!(red.action, AdjustmentAction::RecoveryRide);
        assert_eq!(red.intensity_factor, dec!(0.60));

        assert_eq!(
            daily_adjustment(HrvStatus::Green, &["poor_sleep"]).action,
            AdjustmentAction::Keep
        );
        assert_eq!(
            daily_adjustment(HrvStatus::Green, &["poor_sleep", "sore_legs"]).action,
            AdjustmentAction::RecoveryRide
        );

        let template = WorkoutTemplate {
            name: "Threshold 3x10".to_string(),
            workout_type: WorkoutType::Threshold,
            intervals: vec![
                WorkoutInterval::new(IntervalKind::Warmup, 600, dec!(0.60)),
                WorkoutInterval::new(IntervalKind::Work, 600, dec!(0.95)),
                WorkoutInterval::new(IntervalKind::Rest, 300, dec!(0.50)),
                WorkoutInterval::new(IntervalKind::Work, 600, dec!(0.95)),
                WorkoutInterval::new(IntervalKind::Cooldown, 600, dec!(0.50)),
            ],
        };
        let recovery = apply_adjustment(&template, &red);
        assert_eq!(recovery.workout_type, WorkoutType::Recovery);
        assert_eq!(recovery.intervals.len(), 1);
        assert_eq!(recovery.total_duration_seconds(), template.total_duration_seconds() / 2);
    }

    #[test]
    fn test_service_analysis_and_recommendation() {
        let store = InMemoryStore::new();
        store.import_history(steady_history()).unwrap();
        let service = CoachService::new(store, EngineConfig::default());
        let today = day(34);

        let analysis = service.analysis("test_athlete", today).unwrap();
        assert_eq!(analysis.hrv.status, HrvStatus::Green);
        assert!(analysis.pmc.ctl > dec!(0));
        assert!(analysis.readiness.score > 50);

        let recommendation = service.recommend("test_athlete", today).unwrap();
        assert_eq!(recommendation.primary.label, "Primary");
        assert_eq!(recommendation.alternatives[0].label, "Alternative 1");
        assert_eq!(recommendation.alternatives[1].label, "Alternative 2");
        assert!(recommendation.primary.score >= recommendation.alternatives[0].score);

        let overreaching = service.overreaching("test_athlete", today).unwrap();
        assert_eq!(overreaching.status, OverreachingStatus::Normal);
    }

    #[test]
    fn test_service_not_found() {
        let service = CoachService::new(InMemoryStore::new(), EngineConfig::default());
        let result = service.readiness("missing", day(0));
        assert!(matches!(result, Err(CoachError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_plan_mesocycle_from_history() {
        let store = InMemoryStore::new();
        store.import_history(steady_history()).unwrap();
        let service = CoachService::new(store, EngineConfig::default());
        let today = day(34);

        let mesocycle = service
            .plan_mesocycle("test_athlete", Some("sweet_spot_base"), 6, day(35), today)
            .await
            .unwrap();

        assert_eq!(mesocycle.protocol_id, "sweet_spot_base");
        assert_eq!(mesocycle.weekly_structure.len(), 6);
        let recovery_weeks: Vec<u32> = mesocycle
            .weekly_structure
            .iter()
            .filter(|w| w.is_recovery_week)
            .map(|w| w.week_number)
            .collect();
        assert_eq!(recovery_weeks, vec![4, 6]);

        // Dates increase through the block
        let dates: Vec<NaiveDate> = mesocycle.workouts().map(|w| w.date).collect();
        assert!(dates.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
