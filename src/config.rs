//! Configuration for the coach.

use crate::core::{EngineSettings, DEFAULT_TICK_PERIOD};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the coach.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Daily step goal
    pub step_goal: u32,

    /// Minutes of stillness between inactivity reminders
    pub inactivity_alert_threshold_minutes: u32,

    /// Period of the inactivity check
    #[serde(with = "duration_serde")]
    pub tick_period: Duration,

    /// IANA zone that defines when the day starts
    pub timezone: String,

    /// Which sensors to use
    pub sources: SourceConfig,

    /// Whether notification permission is granted when asked
    pub notifications: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            step_goal: 10_000,
            inactivity_alert_threshold_minutes: 60,
            tick_period: DEFAULT_TICK_PERIOD,
            timezone: "UTC".to_string(),
            sources: SourceConfig::default(),
            notifications: true,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content).map_err(ConfigError::Parse)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stride-coach")
            .join("config.json")
    }

    /// Check every value the engine depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine_settings().map(|_| ())
    }

    /// The parsed timezone.
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::Invalid(format!("unknown timezone '{}'", self.timezone)))
    }

    /// Convert to the engine's settings, validating along the way.
    pub fn engine_settings(&self) -> Result<EngineSettings, ConfigError> {
        let step_goal = NonZeroU32::new(self.step_goal)
            .ok_or_else(|| ConfigError::Invalid("step goal must be positive".to_string()))?;
        let inactivity_alert_threshold = NonZeroU32::new(self.inactivity_alert_threshold_minutes)
            .ok_or_else(|| {
                ConfigError::Invalid("inactivity threshold must be positive".to_string())
            })?;
        if self.tick_period.is_zero() {
            return Err(ConfigError::Invalid(
                "tick period must be at least one second".to_string(),
            ));
        }

        Ok(EngineSettings {
            step_goal,
            inactivity_alert_threshold,
            tick_period: self.tick_period,
            timezone: self.tz()?,
        })
    }
}

/// Configuration for which sensors to use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub activity: bool,
    pub steps: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            activity: true,
            steps: true,
        }
    }
}

impl SourceConfig {
    /// Parse source configuration from a comma-separated string.
    pub fn from_csv(s: &str) -> Self {
        let sources: Vec<String> = s.split(',').map(|s| s.trim().to_lowercase()).collect();

        Self {
            activity: sources.iter().any(|s| s == "activity" || s == "all"),
            steps: sources.iter().any(|s| s == "steps" || s == "all"),
        }
    }

    /// Check if at least one source is enabled.
    pub fn any_enabled(&self) -> bool {
        self.activity || self.steps
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(serde_json::Error),
    #[error("Serialize error: {0}")]
    Serialize(serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
