//! Multi-week training block construction
//!
//! A mesocycle expands a protocol into weeks of dated workout skeletons. Workout
//! detail comes from the configured [`WorkoutGenerator`] when one is available;
//! every failure, timeout or invalid response falls back to the fixed template
//! library, so building a mesocycle never fails because of the generator.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{CoachError, ExternalServiceError, Result};
use crate::generator::{
    TemplateWorkoutGenerator, WorkoutGenerationRequest, WorkoutGenerationResponse,
    WorkoutGenerator,
};
use crate::models::{AthleteProfile, WorkoutInterval, WorkoutType};
use crate::protocols::TrainingProtocol;

/// Session days in priority order; a week with n sessions uses the first n
pub const WEEKDAY_PATTERN: [Weekday; 6] = [
    Weekday::Mon,
    Weekday::Wed,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Tue,
    Weekday::Thu,
];

pub const RECOVERY_SESSION_MINUTES: u32 = 60;
pub const MIDWEEK_SESSION_MINUTES: u32 = 90;

/// Longest block the builder accepts
pub const MAX_WEEKS: u32 = 52;

/// Lifecycle of a mesocycle. The engine only ever creates `PendingApproval`;
/// the other states belong to the approval workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MesocycleStatus {
    PendingApproval,
    Approved,
    Active,
    Completed,
    Cancelled,
}

/// Where a planned workout's detail came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkoutSource {
    Generated,
    Template,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedWorkout {
    pub date: NaiveDate,
    pub weekday: Weekday,
    pub workout_type: WorkoutType,
    pub duration_minutes: u32,
    pub name: String,
    pub description: String,
    pub intervals: Vec<WorkoutInterval>,
    pub tss: Decimal,
    pub coaching_notes: String,
    pub source: WorkoutSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MesocycleWeek {
    pub week_number: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub focus: String,
    pub is_recovery_week: bool,
    /// Weekly TSS target from the protocol progression
    pub target_tss: Decimal,
    /// Sum of the planned workouts' TSS
    pub planned_tss: Decimal,
    pub workouts: Vec<PlannedWorkout>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesocycle {
    pub id: Uuid,
    pub athlete_id: String,
    pub protocol_id: String,
    pub protocol_name: String,
    pub rationale: String,
    pub weeks: u32,
    /// Monday of the first week
    pub start_date: NaiveDate,
    pub weekly_structure: Vec<MesocycleWeek>,
    pub status: MesocycleStatus,
    pub created_at: DateTime<Utc>,
}

impl Mesocycle {
    pub fn total_planned_tss(&self) -> Decimal {
        self.weekly_structure.iter().map(|w| w.planned_tss).sum()
    }

    pub fn workouts(&self) -> impl Iterator<Item = &PlannedWorkout> {
        self.weekly_structure.iter().flat_map(|w| w.workouts.iter())
    }
}

/// Day, type and duration of one session before detail is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSlot {
    pub weekday: Weekday,
    pub workout_type: WorkoutType,
    pub duration_minutes: u32,
}

pub fn is_recovery_week(week: u32, total_weeks: u32) -> bool {
    week == total_weeks || week % 4 == 0
}

pub fn week_focus(protocol: &TrainingProtocol, week: u32, total_weeks: u32) -> String {
    if week == total_weeks {
        "Recovery and consolidation".to_string()
    } else if week == 1 {
        "Adaptation".to_string()
    } else if week + 1 == total_weeks {
        "Peak load".to_string()
    } else {
        format!("{} progression", protocol.name)
    }
}

fn is_weekend(weekday: Weekday) -> bool {
    matches!(weekday, Weekday::Sat | Weekday::Sun)
}

/// Session layout for one week
pub fn session_slots(protocol: &TrainingProtocol, week: u32, total_weeks: u32) -> Vec<SessionSlot> {
    let recovery = is_recovery_week(week, total_weeks);
    let sessions = protocol.sessions_per_week;
    let count = if recovery {
        sessions.saturating_sub(1).max(3).min(sessions)
    } else {
        sessions
    } as usize;

    let mut midweek_slot = 0;
    WEEKDAY_PATTERN
        .iter()
        .take(count)
        .map(|&weekday| {
            let (workout_type, duration_minutes) = if recovery {
                (WorkoutType::Recovery, RECOVERY_SESSION_MINUTES)
            } else if is_weekend(weekday) {
                (WorkoutType::Endurance, protocol.long_ride_minutes)
            } else {
                let workout_type = protocol.midweek_workout_type(midweek_slot);
                midweek_slot += 1;
                (workout_type, MIDWEEK_SESSION_MINUTES)
            };
            SessionSlot {
                weekday,
                workout_type,
                duration_minutes,
            }
        })
        .collect()
}

/// Monday on or before `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.weekday().num_days_from_monday()))
}

pub struct MesocycleBuilder {
    generator: Option<Arc<dyn WorkoutGenerator>>,
    fallback: TemplateWorkoutGenerator,
    timeout: Duration,
}

impl MesocycleBuilder {
    /// Builder using only the template library
    pub fn new() -> Self {
        Self {
            generator: None,
            fallback: TemplateWorkoutGenerator::new(),
            timeout: Duration::from_secs(20),
        }
    }

    /// Builder trying `generator` first for every workout
    pub fn with_generator(generator: Arc<dyn WorkoutGenerator>, timeout: Duration) -> Self {
        Self {
            generator: Some(generator),
            fallback: TemplateWorkoutGenerator::new(),
            timeout,
        }
    }

    #[instrument(skip_all, fields(athlete = %athlete.id, protocol = %protocol.id, weeks))]
    pub async fn build(
        &self,
        athlete: &AthleteProfile,
        protocol: &TrainingProtocol,
        rationale: impl Into<String>,
        weeks: u32,
        start_date: NaiveDate,
    ) -> Result<Mesocycle> {
        if weeks == 0 || weeks > MAX_WEEKS {
            return Err(CoachError::Validation(format!(
                "mesocycle length must be between 1 and {} weeks (got {})",
                MAX_WEEKS, weeks
            )));
        }
        protocol.validate()?;

        let first_monday = week_start(start_date);
        let mut weekly_structure = Vec::with_capacity(weeks as usize);
        let mut fallbacks = 0usize;

        for week in 1..=weeks {
            let monday = first_monday + Days::new(u64::from(week - 1) * 7);
            let focus = week_focus(protocol, week, weeks);
            let target_tss = protocol.target_tss(week);
            let slots = session_slots(protocol, week, weeks);
            let per_session_tss = if slots.is_empty() {
                None
            } else {
                Some(
                    (target_tss / Decimal::from(slots.len()))
                        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero),
                )
            };

            let mut workouts = Vec::with_capacity(slots.len());
            for slot in slots {
                let request = WorkoutGenerationRequest {
                    athlete_profile: athlete.clone(),
                    workout_type: slot.workout_type,
                    duration_minutes: slot.duration_minutes,
                    target_tss: per_session_tss,
                    instructions: Some(format!(
                        "{} week {} of {}: {}",
                        protocol.name, week, weeks, focus
                    )),
                };

                let (detail, source) = self.workout_detail(&request).await;
                if source == WorkoutSource::Template {
                    fallbacks += 1;
                }

                workouts.push(PlannedWorkout {
                    date: monday + Days::new(u64::from(slot.weekday.num_days_from_monday())),
                    weekday: slot.weekday,
                    workout_type: slot.workout_type,
                    duration_minutes: slot.duration_minutes,
                    name: detail.name,
                    description: detail.description,
                    intervals: detail.intervals,
                    tss: detail.tss,
                    coaching_notes: detail.coaching_notes,
                    source,
                });
            }
            workouts.sort_by_key(|w| w.date);

            weekly_structure.push(MesocycleWeek {
                week_number: week,
                start_date: monday,
                end_date: monday + Days::new(6),
                focus,
                is_recovery_week: is_recovery_week(week, weeks),
                target_tss,
                planned_tss: workouts.iter().map(|w| w.tss).sum(),
                workouts,
            });
        }

        let mesocycle = Mesocycle {
            id: Uuid::new_v4(),
            athlete_id: athlete.id.clone(),
            protocol_id: protocol.id.clone(),
            protocol_name: protocol.name.clone(),
            rationale: rationale.into(),
            weeks,
            start_date: first_monday,
            weekly_structure,
            status: MesocycleStatus::PendingApproval,
            created_at: Utc::now(),
        };

        info!(
            mesocycle = %mesocycle.id,
            workouts = mesocycle.workouts().count(),
            fallbacks,
            "Mesocycle built"
        );

        Ok(mesocycle)
    }

    /// One attempt at the generator, then the template library
    async fn workout_detail(
        &self,
        request: &WorkoutGenerationRequest,
    ) -> (WorkoutGenerationResponse, WorkoutSource) {
        if let Some(generator) = &self.generator {
            match self.try_generate(generator.as_ref(), request).await {
                Ok(detail) => return (detail, WorkoutSource::Generated),
                Err(e) => warn!(
                    generator = generator.name(),
                    workout_type = %request.workout_type,
                    error = %e,
                    "Workout generation failed, using template"
                ),
            }
        }

        (
            self.fallback
                .build(request.workout_type, request.duration_minutes),
            WorkoutSource::Template,
        )
    }

    async fn try_generate(
        &self,
        generator: &dyn WorkoutGenerator,
        request: &WorkoutGenerationRequest,
    ) -> std::result::Result<WorkoutGenerationResponse, ExternalServiceError> {
        let detail = tokio::time::timeout(self.timeout, generator.generate(request))
            .await
            .map_err(|_| ExternalServiceError::Timeout(self.timeout))??;
        detail.validate()?;
        Ok(detail)
    }
}

impl Default for MesocycleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExperienceLevel, IntervalKind};
    use crate::protocols::{builtin_protocols, find_protocol};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn athlete() -> AthleteProfile {
        AthleteProfile {
            id: "athlete-1".to_string(),
            name: "Planner".to_string(),
            ftp: Some(250),
            max_hr: Some(185),
            resting_hr: Some(48),
            weight: Some(dec!(70)),
            height: Some(178),
            experience: ExperienceLevel::Advanced,
        }
    }

    struct FailingGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WorkoutGenerator for FailingGenerator {
        fn name(&self) -> &str {
            "failing"
        }

        async fn generate(
            &self,
            _request: &WorkoutGenerationRequest,
        ) -> std::result::Result<WorkoutGenerationResponse, ExternalServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ExternalServiceError::Unavailable)
        }
    }

    struct SlowGenerator;

    #[async_trait]
    impl WorkoutGenerator for SlowGenerator {
        fn name(&self) -> &str {
            "slow"
        }

        async fn generate(
            &self,
            request: &WorkoutGenerationRequest,
        ) -> std::result::Result<WorkoutGenerationResponse, ExternalServiceError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(TemplateWorkoutGenerator::new().build(request.workout_type, request.duration_minutes))
        }
    }

    struct EchoGenerator;

    #[async_trait]
    impl WorkoutGenerator for EchoGenerator {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(
            &self,
            request: &WorkoutGenerationRequest,
        ) -> std::result::Result<WorkoutGenerationResponse, ExternalServiceError> {
            Ok(WorkoutGenerationResponse {
                name: format!("Coached {}", request.workout_type),
                description: request.instructions.clone().unwrap_or_default(),
                intervals: vec![WorkoutInterval::new(
                    IntervalKind::Work,
                    request.duration_minutes * 60,
                    dec!(0.70),
                )],
                tss: request.target_tss.unwrap_or_default(),
                coaching_notes: "Generated".to_string(),
            })
        }
    }

    #[test]
    fn test_recovery_weeks() {
        let flags: Vec<bool> = (1..=6).map(|w| is_recovery_week(w, 6)).collect();
        assert_eq!(flags, vec![false, false, false, true, false, true]);
    }

    #[test]
    fn test_week_focus() {
        let protocol = find_protocol("sweet_spot_base").unwrap();
        assert_eq!(week_focus(protocol, 1, 4), "Adaptation");
        assert_eq!(week_focus(protocol, 2, 4), "Sweet Spot Base progression");
        assert_eq!(week_focus(protocol, 3, 4), "Peak load");
        assert_eq!(week_focus(protocol, 4, 4), "Recovery and consolidation");
    }

    #[test]
    fn test_session_slots_for_polarized_build_week() {
        let protocol = find_protocol("polarized_80_20").unwrap();
        let slots = session_slots(protocol, 1, 4);

        let days: Vec<Weekday> = slots.iter().map(|s| s.weekday).collect();
        assert_eq!(
            days,
            vec![Weekday::Mon, Weekday::Wed, Weekday::Fri, Weekday::Sat, Weekday::Tue]
        );
        assert_eq!(slots[0].workout_type, WorkoutType::VO2Max);
        assert_eq!(slots[1].workout_type, WorkoutType::Endurance);
        assert_eq!(slots[3].workout_type, WorkoutType::Endurance);
        assert_eq!(slots[3].duration_minutes, 180);
        assert_eq!(slots[0].duration_minutes, 90);
    }

    #[test]
    fn test_session_slots_for_recovery_week() {
        let protocol = find_protocol("threshold_block").unwrap();
        let slots = session_slots(protocol, 4, 4);
        assert_eq!(slots.len(), 3);
        assert!(slots
            .iter()
            .all(|s| s.workout_type == WorkoutType::Recovery && s.duration_minutes == 60));

        // Three sessions never drop below three
        let base = find_protocol("base_endurance").unwrap();
        assert_eq!(session_slots(base, 4, 4).len(), 3);
    }

    #[test]
    fn test_week_start_is_monday() {
        let thursday = NaiveDate::from_ymd_opt(2024, 5, 16).unwrap();
        assert_eq!(week_start(thursday), NaiveDate::from_ymd_opt(2024, 5, 13).unwrap());
        let monday = NaiveDate::from_ymd_opt(2024, 5, 13).unwrap();
        assert_eq!(week_start(monday), monday);
    }

    #[tokio::test]
    async fn test_template_only_mesocycle() {
        let protocol = find_protocol("vo2max_block").unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();
        let mesocycle = MesocycleBuilder::new()
            .build(&athlete(), protocol, "best match", 5, start)
            .await
            .unwrap();

        assert_eq!(mesocycle.status, MesocycleStatus::PendingApproval);
        assert_eq!(mesocycle.start_date, NaiveDate::from_ymd_opt(2024, 5, 13).unwrap());
        assert_eq!(mesocycle.weekly_structure.len(), 5);
        assert_eq!(mesocycle.weekly_structure[4].target_tss, dec!(280));
        assert!(mesocycle.weekly_structure[3].is_recovery_week);
        assert!(mesocycle
            .workouts()
            .all(|w| w.source == WorkoutSource::Template));

        let week_two = &mesocycle.weekly_structure[1];
        assert_eq!(week_two.start_date, NaiveDate::from_ymd_opt(2024, 5, 20).unwrap());
        let types: Vec<WorkoutType> = week_two.workouts.iter().map(|w| w.workout_type).collect();
        assert_eq!(
            types,
            vec![
                WorkoutType::VO2Max,
                WorkoutType::VO2Max,
                WorkoutType::Threshold,
                WorkoutType::Endurance
            ]
        );
        for workout in &week_two.workouts {
            assert_eq!(workout.weekday, workout.date.weekday());
            assert!(workout.date >= week_two.start_date && workout.date <= week_two.end_date);
        }
        assert_eq!(
            week_two.planned_tss,
            week_two.workouts.iter().map(|w| w.tss).sum::<Decimal>()
        );
    }

    #[tokio::test]
    async fn test_failing_generator_falls_back_for_every_workout() {
        let generator = Arc::new(FailingGenerator {
            calls: AtomicUsize::new(0),
        });
        let builder = MesocycleBuilder::with_generator(generator.clone(), Duration::from_secs(1));
        let protocol = find_protocol("sweet_spot_base").unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 5, 13).unwrap();

        let mesocycle = builder
            .build(&athlete(), protocol, "test", 4, start)
            .await
            .unwrap();

        let workouts: Vec<&PlannedWorkout> = mesocycle.workouts().collect();
        // 4 + 4 + 4 sessions, then 3 in the recovery week
        assert_eq!(workouts.len(), 15);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 15);
        assert!(workouts.iter().all(|w| w.source == WorkoutSource::Template));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_generator_times_out() {
        let builder =
            MesocycleBuilder::with_generator(Arc::new(SlowGenerator), Duration::from_millis(100));
        let protocol = find_protocol("base_endurance").unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 5, 13).unwrap();

        let mesocycle = builder
            .build(&athlete(), protocol, "test", 1, start)
            .await
            .unwrap();
        assert_eq!(mesocycle.workouts().count(), 3);
        assert!(mesocycle
            .workouts()
            .all(|w| w.source == WorkoutSource::Template));
    }

    #[tokio::test]
    async fn test_generated_workouts_keep_order() {
        let builder =
            MesocycleBuilder::with_generator(Arc::new(EchoGenerator), Duration::from_secs(1));
        let protocol = find_protocol("threshold_block").unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 5, 13).unwrap();

        let mesocycle = builder
            .build(&athlete(), protocol, "test", 2, start)
            .await
            .unwrap();

        let first_week = &mesocycle.weekly_structure[0];
        assert!(first_week
            .workouts
            .iter()
            .all(|w| w.source == WorkoutSource::Generated));
        assert_eq!(first_week.workouts[0].name, "Coached Threshold");
        // 380 TSS over 4 sessions
        assert_eq!(first_week.workouts[0].tss, dec!(95));
        let weekdays: Vec<Weekday> = first_week.workouts.iter().map(|w| w.weekday).collect();
        assert_eq!(
            weekdays,
            vec![Weekday::Mon, Weekday::Wed, Weekday::Fri, Weekday::Sat]
        );
    }

    #[tokio::test]
    async fn test_invalid_week_count() {
        let protocol = find_protocol("threshold_block").unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 5, 13).unwrap();
        let result = MesocycleBuilder::new()
            .build(&athlete(), protocol, "test", 0, start)
            .await;
        assert!(matches!(result, Err(CoachError::Validation(_))));
    }

    #[tokio::test]
    async fn test_zero_minute_long_ride_is_rejected() {
        let mut protocol = find_protocol("sweet_spot_base").unwrap().clone();
        protocol.long_ride_minutes = 0;
        let start = NaiveDate::from_ymd_opt(2024, 5, 13).unwrap();

        let result = MesocycleBuilder::new()
            .build(&athlete(), &protocol, "test", 2, start)
            .await;
        assert!(matches!(result, Err(CoachError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_every_template_workout_has_content() {
        let start = NaiveDate::from_ymd_opt(2024, 5, 13).unwrap();
        for protocol in builtin_protocols() {
            let mesocycle = MesocycleBuilder::new()
                .build(&athlete(), protocol, "test", 4, start)
                .await
                .unwrap();
            for workout in mesocycle.workouts() {
                assert!(!workout.intervals.is_empty(), "{} {}", protocol.id, workout.date);
                assert!(workout.tss > Decimal::ZERO, "{} {}", protocol.id, workout.date);
            }
        }
    }
}
