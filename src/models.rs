use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoachError, Result};
use crate::power::WorkoutPowerMetrics;

/// Training background used for protocol suitability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Advanced,
    Elite,
}

impl std::fmt::Display for ExperienceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExperienceLevel::Beginner => write!(f, "beginner"),
            ExperienceLevel::Intermediate => write!(f, "intermediate"),
            ExperienceLevel::Advanced => write!(f, "advanced"),
            ExperienceLevel::Elite => write!(f, "elite"),
        }
    }
}

/// Workout types used when planning sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkoutType {
    Endurance,
    Threshold,
    #[serde(rename = "VO2MAX")]
    VO2Max,
    Sprint,
    Recovery,
}

impl std::fmt::Display for WorkoutType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkoutType::Endurance => write!(f, "Endurance"),
            WorkoutType::Threshold => write!(f, "Threshold"),
            WorkoutType::VO2Max => write!(f, "VO2max"),
            WorkoutType::Sprint => write!(f, "Sprint"),
            WorkoutType::Recovery => write!(f, "Recovery"),
        }
    }
}

/// Individual sample decoded from an activity file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerSample {
    /// Timestamp in seconds from workout start
    pub timestamp: u32,

    /// Power output in watts
    pub power: Option<u16>,

    /// Heart rate in beats per minute
    pub heart_rate: Option<u16>,
}

/// Subjective wellness scores from the athlete's diary (1-10 scale)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectiveScores {
    pub fatigue: Option<u8>,
    pub soreness: Option<u8>,
    pub stress: Option<u8>,
    pub mood: Option<u8>,
    pub motivation: Option<u8>,
}

impl SubjectiveScores {
    /// Wellness on a 0-100 scale, with fatigue/soreness/stress inverted.
    /// None when nothing was recorded.
    pub fn wellness_score(&self) -> Option<f64> {
        let inverted = [self.fatigue, self.soreness, self.stress]
            .into_iter()
            .flatten()
            .map(|v| 11.0 - f64::from(v.clamp(1, 10)));
        let direct = [self.mood, self.motivation]
            .into_iter()
            .flatten()
            .map(|v| f64::from(v.clamp(1, 10)));

        let values: Vec<f64> = inverted.chain(direct).collect();
        if values.is_empty() {
            return None;
        }

        Some(values.iter().sum::<f64>() / values.len() as f64 * 10.0)
    }
}

/// One physiological record per athlete per day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySample {
    pub date: NaiveDate,

    /// HRV (RMSSD) in milliseconds
    pub hrv: Option<f64>,

    /// Resting heart rate in beats per minute
    pub resting_hr: Option<u16>,

    /// Sleep quality (1-10)
    pub sleep_quality: Option<u8>,

    /// Sleep duration in hours
    pub sleep_duration_hours: Option<f64>,

    #[serde(default)]
    pub subjective: SubjectiveScores,
}

impl DailySample {
    /// Sample carrying only an HRV reading
    pub fn with_hrv(date: NaiveDate, hrv: f64) -> Self {
        DailySample {
            date,
            hrv: Some(hrv),
            resting_hr: None,
            sleep_quality: None,
            sleep_duration_hours: None,
            subjective: SubjectiveScores::default(),
        }
    }

    /// HRV reading if it is a usable positive value
    pub fn valid_hrv(&self) -> Option<f64> {
        self.hrv.filter(|v| v.is_finite() && *v > 0.0)
    }
}

/// Training stress recorded for a date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadEntry {
    pub date: NaiveDate,
    pub tss: Decimal,
}

impl LoadEntry {
    pub fn new(date: NaiveDate, tss: Decimal) -> Result<Self> {
        if tss < Decimal::ZERO {
            return Err(CoachError::Validation(format!(
                "TSS must not be negative (got {} on {})",
                tss, date
            )));
        }
        Ok(LoadEntry { date, tss })
    }

    /// Load entry for a completed workout's power metrics
    pub fn from_workout(date: NaiveDate, metrics: &WorkoutPowerMetrics) -> Self {
        LoadEntry {
            date,
            tss: metrics.tss.max(Decimal::ZERO),
        }
    }
}

/// Athlete profile as provided by the storage collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AthleteProfile {
    /// Unique athlete identifier
    pub id: String,

    /// Athlete's display name
    pub name: String,

    /// Functional Threshold Power (watts)
    pub ftp: Option<u16>,

    /// Maximum heart rate
    pub max_hr: Option<u16>,

    /// Resting heart rate
    pub resting_hr: Option<u16>,

    /// Weight in kilograms
    pub weight: Option<Decimal>,

    /// Height in centimeters
    pub height: Option<u16>,

    pub experience: ExperienceLevel,
}

impl AthleteProfile {
    /// FTP or a validation error naming the missing field
    pub fn require_ftp(&self) -> Result<u16> {
        self.ftp
            .filter(|ftp| *ftp > 0)
            .ok_or_else(|| CoachError::Validation(format!("athlete {} has no FTP set", self.id)))
    }
}

/// Role of an interval inside a structured workout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalKind {
    Warmup,
    Work,
    Rest,
    Cooldown,
}

/// Single step of a structured workout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutInterval {
    pub kind: IntervalKind,
    pub duration_seconds: u32,

    /// Target intensity as a fraction of FTP
    pub intensity: Decimal,

    pub description: Option<String>,
}

impl WorkoutInterval {
    pub fn new(kind: IntervalKind, duration_seconds: u32, intensity: Decimal) -> Self {
        WorkoutInterval {
            kind,
            duration_seconds,
            intensity,
            description: None,
        }
    }
}

/// Structured workout, either generated or taken from the template library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutTemplate {
    pub name: String,
    pub workout_type: WorkoutType,
    pub intervals: Vec<WorkoutInterval>,
}

impl WorkoutTemplate {
    pub fn total_duration_seconds(&self) -> u32 {
        self.intervals.iter().map(|i| i.duration_seconds).sum()
    }

    pub fn work_interval_count(&self) -> usize {
        self.intervals
            .iter()
            .filter(|i| i.kind == IntervalKind::Work)
            .count()
    }
}
