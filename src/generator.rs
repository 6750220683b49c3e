//! Workout detail generation
//!
//! Two implementations share the [`WorkoutGenerator`] capability:
//! - [`HttpWorkoutGenerator`] asks an external text-generation service for a
//!   described workout. Each call is a single attempt bounded by a timeout.
//! - [`TemplateWorkoutGenerator`] builds one of five fixed interval templates
//!   scaled to the requested duration. It never fails and is used as the fallback.

use async_trait::async_trait;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

use crate::config::GeneratorConfig;
use crate::error::{CoachError, ExternalServiceError};
use crate::models::{AthleteProfile, IntervalKind, WorkoutInterval, WorkoutType};

/// Request sent to a workout generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutGenerationRequest {
    pub athlete_profile: AthleteProfile,
    pub workout_type: WorkoutType,
    pub duration_minutes: u32,
    pub target_tss: Option<Decimal>,
    pub instructions: Option<String>,
}

/// Described workout returned by a generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutGenerationResponse {
    pub name: String,
    pub description: String,
    pub intervals: Vec<WorkoutInterval>,
    pub tss: Decimal,
    #[serde(default)]
    pub coaching_notes: String,
}

impl WorkoutGenerationResponse {
    /// Reject responses that cannot be planned
    pub fn validate(&self) -> Result<(), ExternalServiceError> {
        if self.name.trim().is_empty() {
            return Err(ExternalServiceError::InvalidResponse(
                "workout name is empty".to_string(),
            ));
        }
        if self.intervals.is_empty() {
            return Err(ExternalServiceError::InvalidResponse(
                "workout has no intervals".to_string(),
            ));
        }
        if self.tss < Decimal::ZERO {
            return Err(ExternalServiceError::InvalidResponse(format!(
                "negative TSS {}",
                self.tss
            )));
        }
        if let Some(interval) = self
            .intervals
            .iter()
            .find(|i| i.duration_seconds == 0 || i.intensity <= Decimal::ZERO || i.intensity > dec!(3))
        {
            return Err(ExternalServiceError::InvalidResponse(format!(
                "interval out of range: {}s at {}",
                interval.duration_seconds, interval.intensity
            )));
        }
        Ok(())
    }

    pub fn total_duration_seconds(&self) -> u32 {
        self.intervals.iter().map(|i| i.duration_seconds).sum()
    }
}

/// Capability to produce a described workout
#[async_trait]
pub trait WorkoutGenerator: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    async fn generate(
        &self,
        request: &WorkoutGenerationRequest,
    ) -> Result<WorkoutGenerationResponse, ExternalServiceError>;
}

/// Generator backed by an external HTTP service
pub struct HttpWorkoutGenerator {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpWorkoutGenerator {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> crate::error::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoachError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key,
            timeout,
        })
    }

    /// Generator from configuration, None when disabled or no endpoint is set.
    ///
    /// The API key is read from the environment variable named in the config.
    pub fn from_config(config: &GeneratorConfig) -> crate::error::Result<Option<Self>> {
        let endpoint = match (config.enabled, config.endpoint.as_deref()) {
            (true, Some(endpoint)) if !endpoint.trim().is_empty() => endpoint.to_string(),
            _ => return Ok(None),
        };
        let api_key = std::env::var(&config.api_key_env).ok();

        Self::new(endpoint, api_key, config.timeout()).map(Some)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl WorkoutGenerator for HttpWorkoutGenerator {
    fn name(&self) -> &str {
        "http"
    }

    async fn generate(
        &self,
        request: &WorkoutGenerationRequest,
    ) -> Result<WorkoutGenerationResponse, ExternalServiceError> {
        let mut builder = self.http.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ExternalServiceError::Timeout(self.timeout)
            } else {
                ExternalServiceError::from(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExternalServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let workout: WorkoutGenerationResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ExternalServiceError::Timeout(self.timeout)
            } else {
                ExternalServiceError::InvalidResponse(e.to_string())
            }
        })?;
        workout.validate()?;

        debug!(
            workout_type = %request.workout_type,
            name = %workout.name,
            "Generated workout received"
        );

        Ok(workout)
    }
}

/// Repeated work/rest set inside a template
#[derive(Debug, Clone)]
struct SetSpec {
    work_seconds: u32,
    work_intensity: Decimal,
    rest_seconds: u32,
    rest_intensity: Decimal,
    max_sets: u32,
}

#[derive(Debug, Clone)]
struct TemplateSpec {
    workout_type: WorkoutType,
    name: &'static str,
    description: &'static str,
    coaching_notes: &'static str,
    /// Intensity factor used for the TSS estimate
    intensity_factor: Decimal,
    warmup_seconds: u32,
    cooldown_seconds: u32,
    /// Intensity of steady riding between warmup and cooldown
    steady_intensity: Decimal,
    sets: Option<SetSpec>,
}

static TEMPLATES: LazyLock<Vec<TemplateSpec>> = LazyLock::new(|| {
    vec![
        TemplateSpec {
            workout_type: WorkoutType::Endurance,
            name: "Endurance Ride",
            description: "Steady zone 2 riding",
            coaching_notes: "Keep the effort conversational and fuel regularly.",
            intensity_factor: dec!(0.68),
            warmup_seconds: 600,
            cooldown_seconds: 300,
            steady_intensity: dec!(0.68),
            sets: None,
        },
        TemplateSpec {
            workout_type: WorkoutType::Threshold,
            name: "Threshold Intervals",
            description: "10-minute efforts just below FTP",
            coaching_notes: "Hold the target evenly; the last minute of each effort should feel hard but controlled.",
            intensity_factor: dec!(0.88),
            warmup_seconds: 900,
            cooldown_seconds: 600,
            steady_intensity: dec!(0.65),
            sets: Some(SetSpec {
                work_seconds: 600,
                work_intensity: dec!(0.95),
                rest_seconds: 300,
                rest_intensity: dec!(0.55),
                max_sets: 5,
            }),
        },
        TemplateSpec {
            workout_type: WorkoutType::VO2Max,
            name: "VO2max Intervals",
            description: "4-minute efforts above MAP",
            coaching_notes: "Start each effort controlled and finish strong; spin easy during recoveries.",
            intensity_factor: dec!(0.92),
            warmup_seconds: 900,
            cooldown_seconds: 600,
            steady_intensity: dec!(0.65),
            sets: Some(SetSpec {
                work_seconds: 240,
                work_intensity: dec!(1.15),
                rest_seconds: 240,
                rest_intensity: dec!(0.50),
                max_sets: 6,
            }),
        },
        TemplateSpec {
            workout_type: WorkoutType::Sprint,
            name: "Sprint Session",
            description: "Short maximal sprints with full recovery",
            coaching_notes: "Sprint from a rolling start and recover completely between efforts.",
            intensity_factor: dec!(0.80),
            warmup_seconds: 900,
            cooldown_seconds: 600,
            steady_intensity: dec!(0.65),
            sets: Some(SetSpec {
                work_seconds: 15,
                work_intensity: dec!(1.80),
                rest_seconds: 285,
                rest_intensity: dec!(0.50),
                max_sets: 8,
            }),
        },
        TemplateSpec {
            workout_type: WorkoutType::Recovery,
            name: "Recovery Spin",
            description: "Easy zone 1 spin",
            coaching_notes: "Keep the legs moving with no pressure on the pedals.",
            intensity_factor: dec!(0.55),
            warmup_seconds: 0,
            cooldown_seconds: 0,
            steady_intensity: dec!(0.55),
            sets: None,
        },
    ]
});

/// Intensity factor used to estimate TSS for a workout type
pub fn template_intensity_factor(workout_type: WorkoutType) -> Decimal {
    template_for(workout_type).intensity_factor
}

fn template_for(workout_type: WorkoutType) -> &'static TemplateSpec {
    // Endurance is first in the library and covers any type without its own template
    TEMPLATES
        .iter()
        .find(|t| t.workout_type == workout_type)
        .unwrap_or(&TEMPLATES[0])
}

/// TSS estimate `hours * IF^2 * 100`, one decimal
pub fn estimate_tss(duration_minutes: u32, intensity_factor: Decimal) -> Decimal {
    let hours = Decimal::from(duration_minutes) / Decimal::from(60);
    (hours * intensity_factor * intensity_factor * Decimal::from(100))
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

/// Deterministic generator built on the fixed template library
#[derive(Debug, Clone, Default)]
pub struct TemplateWorkoutGenerator;

impl TemplateWorkoutGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Template workout for a type, scaled to `duration_minutes`
    pub fn build(&self, workout_type: WorkoutType, duration_minutes: u32) -> WorkoutGenerationResponse {
        let spec = template_for(workout_type);
        let total = duration_minutes.saturating_mul(60);
        let intervals = scale_intervals(spec, total);

        WorkoutGenerationResponse {
            name: format!("{} ({} min)", spec.name, duration_minutes),
            description: spec.description.to_string(),
            intervals,
            tss: estimate_tss(duration_minutes, spec.intensity_factor),
            coaching_notes: spec.coaching_notes.to_string(),
        }
    }
}

fn scale_intervals(spec: &TemplateSpec, total_seconds: u32) -> Vec<WorkoutInterval> {
    let frame = spec.warmup_seconds + spec.cooldown_seconds;
    let set_seconds = spec
        .sets
        .as_ref()
        .map(|s| s.work_seconds + s.rest_seconds)
        .unwrap_or(0);

    // Too short for the structure: one steady block
    if total_seconds <= frame + set_seconds || total_seconds <= frame {
        if total_seconds == 0 {
            return Vec::new();
        }
        return vec![WorkoutInterval::new(
            IntervalKind::Work,
            total_seconds,
            spec.steady_intensity,
        )];
    }

    let mut intervals = Vec::new();
    if spec.warmup_seconds > 0 {
        intervals.push(WorkoutInterval::new(
            IntervalKind::Warmup,
            spec.warmup_seconds,
            dec!(0.60),
        ));
    }

    let mut main = total_seconds - frame;
    if let Some(sets) = &spec.sets {
        // The last effort needs no trailing rest
        let count = ((main + sets.rest_seconds) / set_seconds).clamp(1, sets.max_sets);
        for rep in 0..count {
            if rep > 0 {
                intervals.push(WorkoutInterval::new(
                    IntervalKind::Rest,
                    sets.rest_seconds,
                    sets.rest_intensity,
                ));
            }
            intervals.push(WorkoutInterval::new(
                IntervalKind::Work,
                sets.work_seconds,
                sets.work_intensity,
            ));
        }
        main -= count * set_seconds - sets.rest_seconds;
    }

    if main > 0 {
        let kind = if spec.sets.is_some() {
            IntervalKind::Rest
        } else {
            IntervalKind::Work
        };
        intervals.push(WorkoutInterval::new(kind, main, spec.steady_intensity));
    }

    if spec.cooldown_seconds > 0 {
        intervals.push(WorkoutInterval::new(
            IntervalKind::Cooldown,
            spec.cooldown_seconds,
            dec!(0.50),
        ));
    }

    intervals
}

#[async_trait]
impl WorkoutGenerator for TemplateWorkoutGenerator {
    fn name(&self) -> &str {
        "template"
    }

    async fn generate(
        &self,
        request: &WorkoutGenerationRequest,
    ) -> Result<WorkoutGenerationResponse, ExternalServiceError> {
        Ok(self.build(request.workout_type, request.duration_minutes))
    }
}
