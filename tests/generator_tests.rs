use chrono::NaiveDate;
use coachrs::error::ExternalServiceError;
use coachrs::generator::{HttpWorkoutGenerator, WorkoutGenerationRequest, WorkoutGenerator};
use coachrs::mesocycle::{MesocycleBuilder, WorkoutSource};
use coachrs::models::{AthleteProfile, ExperienceLevel, WorkoutType};
use coachrs::protocols::find_protocol;
use mockito::{Matcher, Server};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

fn athlete() -> AthleteProfile {
    AthleteProfile {
        id: "gen-athlete".to_string(),
        name: "Generator Rider".to_string(),
        ftp: Some(265),
        max_hr: Some(186),
        resting_hr: Some(47),
        weight: Some(dec!(71)),
        height: Some(179),
        experience: ExperienceLevel::Advanced,
    }
}

fn request() -> WorkoutGenerationRequest {
    WorkoutGenerationRequest {
        athlete_profile: athlete(),
        workout_type: WorkoutType::Threshold,
        duration_minutes: 60,
        target_tss: Some(dec!(80)),
        instructions: Some("Threshold Block week 1 of 4: Adaptation".to_string()),
    }
}

const GENERATED_WORKOUT: &str = r#"{
    "name": "Over-Unders",
    "description": "3 x 12 min alternating 95% and 105% FTP",
    "intervals": [
        {"kind": "warmup", "duration_seconds": 900, "intensity": 0.6},
        {"kind": "work", "duration_seconds": 720, "intensity": 1.0},
        {"kind": "rest", "duration_seconds": 300, "intensity": 0.5},
        {"kind": "work", "duration_seconds": 720, "intensity": 1.0},
        {"kind": "cooldown", "duration_seconds": 960, "intensity": 0.5}
    ],
    "tss": 78.5,
    "coaching_notes": "Keep cadence above 90 on the overs"
}"#;

#[tokio::test]
async fn test_http_generator_success() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/workouts")
        .match_header("authorization", "Bearer test-key")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "workout_type": "THRESHOLD",
            "duration_minutes": 60
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(GENERATED_WORKOUT)
        .create_async()
        .await;

    let generator = HttpWorkoutGenerator::new(
        format!("{}/workouts", server.url()),
        Some("test-key".to_string()),
        Duration::from_secs(5),
    )
    .unwrap();

    let workout = generator.generate(&request()).await.unwrap();

    mock.assert_async().await;
    assert_eq!(workout.name, "Over-Unders");
    assert_eq!(workout.intervals.len(), 5);
    assert_eq!(workout.tss, dec!(78.5));
    assert_eq!(workout.total_duration_seconds(), 3600);
}

#[tokio::test]
async fn test_http_generator_server_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/workouts")
        .with_status(500)
        .with_body("upstream exploded")
        .create_async()
        .await;

    let generator =
        HttpWorkoutGenerator::new(format!("{}/workouts", server.url()), None, Duration::from_secs(5))
            .unwrap();

    let error = generator.generate(&request()).await.unwrap_err();
    match error {
        ExternalServiceError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "upstream exploded");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_http_generator_invalid_json() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/workouts")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"name": "Missing everything"}"#)
        .create_async()
        .await;

    let generator =
        HttpWorkoutGenerator::new(format!("{}/workouts", server.url()), None, Duration::from_secs(5))
            .unwrap();

    let error = generator.generate(&request()).await.unwrap_err();
    assert!(matches!(error, ExternalServiceError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_http_generator_rejects_empty_workout() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/workouts")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"name": "Nothing", "description": "", "intervals": [], "tss": 0}"#)
        .create_async()
        .await;

    let generator =
        HttpWorkoutGenerator::new(format!("{}/workouts", server.url()), None, Duration::from_secs(5))
            .unwrap();

    let error = generator.generate(&request()).await.unwrap_err();
    assert!(matches!(error, ExternalServiceError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_mesocycle_uses_generator_and_falls_back() {
    let mut server = Server::new_async().await;
    // Only threshold requests succeed; everything else gets a 503
    let _threshold = server
        .mock("POST", "/workouts")
        .match_body(Matcher::PartialJson(
            serde_json::json!({"workout_type": "THRESHOLD"}),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(GENERATED_WORKOUT)
        .expect(2)
        .create_async()
        .await;
    let _others = server
        .mock("POST", "/workouts")
        .match_body(Matcher::AnyOf(vec![
            Matcher::PartialJson(serde_json::json!({"workout_type": "ENDURANCE"})),
            Matcher::PartialJson(serde_json::json!({"workout_type": "RECOVERY"})),
        ]))
        .with_status(503)
        .with_body("busy")
        .create_async()
        .await;

    let generator =
        HttpWorkoutGenerator::new(format!("{}/workouts", server.url()), None, Duration::from_secs(5))
            .unwrap();
    let builder = MesocycleBuilder::with_generator(Arc::new(generator), Duration::from_secs(5));
    let protocol = find_protocol("threshold_block").unwrap();
    let start = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();

    let mesocycle = builder
        .build(&athlete(), protocol, "test rationale", 2, start)
        .await
        .unwrap();

    let first_week = &mesocycle.weekly_structure[0];
    assert_eq!(first_week.workouts.len(), 4);
    for workout in &first_week.workouts {
        let expected = if workout.workout_type == WorkoutType::Threshold {
            WorkoutSource::Generated
        } else {
            WorkoutSource::Template
        };
        assert_eq!(workout.source, expected, "{:?}", workout.workout_type);
    }
    assert_eq!(first_week.workouts[0].name, "Over-Unders");

    // Last week is a recovery week, served entirely from templates
    assert!(mesocycle.weekly_structure[1]
        .workouts
        .iter()
        .all(|w| w.source == WorkoutSource::Template));
}
