// Library interface for the coachrs engine
// The binary and the integration tests both go through these modules

pub mod adaptive;
pub mod analysis;
pub mod baseline;
pub mod config;
pub mod error;
pub mod generator;
pub mod logging;
pub mod mesocycle;
pub mod models;
pub mod overreaching;
pub mod pmc;
pub mod power;
pub mod protocols;
pub mod readiness;
pub mod recommender;
pub mod service;
pub mod store;

// Re-export commonly used types for convenience
pub use models::*;
pub use adaptive::{apply_adjustment, daily_adjustment, AdjustmentAction, DailyAdjustment};
pub use analysis::AthleteAnalysis;
pub use baseline::{hrv_baseline, Baseline};
pub use config::EngineConfig;
pub use error::{CalculationError, CoachError, ExternalServiceError, Result};
pub use generator::{HttpWorkoutGenerator, TemplateWorkoutGenerator, WorkoutGenerator};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use mesocycle::{Mesocycle, MesocycleBuilder, MesocycleStatus};
pub use overreaching::{OverreachingAnalysis, OverreachingDetector, OverreachingStatus};
pub use pmc::{PmcCalculator, PmcPoint};
pub use power::{CriticalPowerModel, PowerDurationPoint, PowerModel};
pub use protocols::{builtin_protocols, find_protocol, TrainingProtocol};
pub use readiness::{classify, HrvStatus, ReadinessResult};
pub use recommender::ProtocolRecommendation;
pub use service::CoachService;
pub use store::{AthleteHistory, AthleteStore, InMemoryStore};
