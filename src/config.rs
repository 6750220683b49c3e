use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::baseline::DEFAULT_WINDOW_DAYS;
use crate::error::CoachError;
use crate::logging::LogConfig;
use crate::overreaching::OverreachingConfig;
use crate::pmc::PmcConfig;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub baseline: BaselineConfig,

    pub overreaching: OverreachingConfig,

    /// Performance Management Chart window
    pub pmc: PmcConfig,

    /// External workout generator
    pub generator: GeneratorConfig,

    pub logging: LogConfig,

    /// Optional TOML protocol catalog replacing the built-in one
    pub protocol_catalog: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// Most recent days used for the HRV baseline
    pub window_days: usize,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub enabled: bool,

    /// URL receiving workout generation requests
    pub endpoint: Option<String>,

    /// Environment variable holding the bearer token
    pub api_key_env: String,

    /// Per-call timeout
    pub timeout_seconds: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            api_key_env: "COACHRS_GENERATOR_API_KEY".to_string(),
            timeout_seconds: 20,
        }
    }
}

impl GeneratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl EngineConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: EngineConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// `~/.coachrs/config.toml`
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".coachrs")
            .join("config.toml")
    }

    /// Load the default config file, falling back to defaults when it is missing or invalid
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!(
                    path = %config_path.display(),
                    error = %e,
                    "Using default configuration"
                );
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> std::result::Result<(), CoachError> {
        if self.baseline.window_days < crate::baseline::MIN_BASELINE_SAMPLES {
            return Err(CoachError::Configuration(format!(
                "baseline.window_days must be at least {}",
                crate::baseline::MIN_BASELINE_SAMPLES
            )));
        }
        if self.overreaching.window_days == 0 || self.overreaching.min_samples == 0 {
            return Err(CoachError::Configuration(
                "overreaching window and minimum samples must be positive".to_string(),
            ));
        }
        if self.overreaching.min_samples > self.overreaching.window_days {
            return Err(CoachError::Configuration(
                "overreaching.min_samples cannot exceed overreaching.window_days".to_string(),
            ));
        }
        if self.generator.timeout_seconds == 0 {
            return Err(CoachError::Configuration(
                "generator.timeout_seconds must be positive".to_string(),
            ));
        }
        if self.generator.enabled && self.generator.endpoint.is_none() {
            return Err(CoachError::Configuration(
                "generator.endpoint is required when the generator is enabled".to_string(),
            ));
        }
        Ok(())
    }
}
