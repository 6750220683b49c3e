//! Unified error hierarchy for coachrs
//!
//! Validation and lookup failures are surfaced to callers. Insufficient history is
//! never an error: baseline and overreaching analysis return sentinel results instead.
//! External service failures are caught by the mesocycle builder and replaced by
//! deterministic fallbacks, so they only escape when a generator is called directly.

use std::time::Duration;
use thiserror::Error;

/// Top-level error type for all coachrs operations
#[derive(Debug, Error)]
pub enum CoachError {
    /// Input failed validation (missing profile fields, malformed parameters)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Numeric model errors
    #[error("Calculation error: {0}")]
    Calculation(#[from] CalculationError),

    /// Unknown athlete, protocol or other referenced entity
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Workout text generation collaborator errors
    #[error("External service error: {0}")]
    ExternalService(#[from] ExternalServiceError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Calculation errors
#[derive(Debug, Error)]
pub enum CalculationError {
    /// Insufficient data for calculation
    #[error("Insufficient data for {calculation}: {reason}")]
    InsufficientData { calculation: String, reason: String },

    /// Invalid parameter
    #[error("Invalid parameter for {calculation}: {parameter}={value}")]
    InvalidParameter {
        calculation: String,
        parameter: String,
        value: String,
    },

    /// Division by zero
    #[error("Division by zero in {calculation}")]
    DivisionByZero { calculation: String },

    /// Missing athlete profile data
    #[error("Missing athlete profile: {field}")]
    MissingProfile { field: String },
}

/// Failures of the workout text generation collaborator
#[derive(Debug, Error)]
pub enum ExternalServiceError {
    /// No generator is configured
    #[error("Workout generator unavailable")]
    Unavailable,

    /// The call did not complete in time
    #[error("Workout generator timed out after {0:?}")]
    Timeout(Duration),

    /// Transport level failure
    #[error("Workout generator request failed: {0}")]
    Transport(String),

    /// Non-success HTTP status
    #[error("Workout generator returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not satisfy the response contract
    #[error("Invalid workout generator response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ExternalServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ExternalServiceError::InvalidResponse(err.to_string())
        } else {
            ExternalServiceError::Transport(err.to_string())
        }
    }
}

/// Result type alias for coachrs operations
pub type Result<T> = std::result::Result<T, CoachError>;

impl CoachError {
    /// Shorthand for a NotFound error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoachError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoachError::ExternalService(ExternalServiceError::Timeout(_))
                | CoachError::ExternalService(ExternalServiceError::Transport(_))
                | CoachError::Io(_)
        )
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CoachError::Validation(_) => ErrorSeverity::Warning,
            CoachError::Calculation(CalculationError::InsufficientData { .. }) => {
                ErrorSeverity::Warning
            }
            CoachError::Calculation(_) => ErrorSeverity::Error,
            CoachError::NotFound { .. } => ErrorSeverity::Error,
            CoachError::ExternalService(_) => ErrorSeverity::Warning,
            CoachError::Configuration(_) => ErrorSeverity::Critical,
            CoachError::Io(_) => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            CoachError::NotFound { entity, id } => {
                format!("No {} with id '{}' exists.", entity.to_lowercase(), id)
            }
            CoachError::Calculation(CalculationError::InsufficientData {
                calculation,
                ..
            }) => {
                format!(
                    "Not enough data to calculate {}. Record more efforts and try again.",
                    calculation
                )
            }
            CoachError::Calculation(CalculationError::MissingProfile { field }) => {
                format!("Your athlete profile is missing '{}'.", field)
            }
            CoachError::ExternalService(_) => {
                "Workout descriptions are temporarily unavailable; standard templates were used."
                    .to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity() {
        let err = CoachError::Validation("ftp".to_string());
        assert_eq!(err.severity(), ErrorSeverity::Warning);

        let err = CoachError::not_found("Protocol", "unknown");
        assert_eq!(err.severity(), ErrorSeverity::Error);

        let err = CoachError::Configuration("bad".to_string());
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_error_retryable() {
        let err = CoachError::ExternalService(ExternalServiceError::Timeout(
            Duration::from_secs(5),
        ));
        assert!(err.is_retryable());

        let err = CoachError::Validation("test".to_string());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_user_messages() {
        let err = CoachError::not_found("Athlete", "a-42");
        assert!(err.user_message().contains("a-42"));

        let err = CoachError::Calculation(CalculationError::MissingProfile {
            field: "ftp".to_string(),
        });
        assert!(err.user_message().contains("ftp"));
    }
}
