use anyhow::{Context, Result};
use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::AthleteMonitorError;
use crate::pmc::PmcConfig;
use crate::scores::ReadinessFormula;

/// Analytics configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Configuration metadata
    pub metadata: ConfigMetadata,

    /// Readiness weight table and sleep-duration scale
    pub readiness: ReadinessFormula,

    /// Load model settings
    pub pmc: PmcConfig,

    /// Statistics floors and windows
    pub statistics: StatisticsConfig,

    /// Insight rule thresholds
    pub insights: InsightConfig,

    /// Weekday and month labels
    pub locale: LocaleLabels,
}

/// Configuration metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// Statistics module settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsConfig {
    /// Fewest paired samples for a correlation (at least 2)
    pub min_correlation_samples: usize,

    /// Fewest samples for a normality test (at least 3)
    pub min_normality_samples: usize,

    /// Rolling window length in days
    pub rolling_window: usize,

    /// Finite values a rolling window needs before it yields a value
    pub rolling_min_periods: usize,

    /// Outlier detection threshold
    pub outlier_threshold: f64,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        StatisticsConfig {
            min_correlation_samples: 2,
            min_normality_samples: 3,
            rolling_window: 7,
            rolling_min_periods: 1,
            outlier_threshold: 2.0,
        }
    }
}

/// Thresholds of the insight rule table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightConfig {
    /// Readiness observations needed for the trend rule
    pub trend_min_observations: usize,

    /// Score change between the two halves that counts as a trend
    pub trend_delta: f64,

    /// |r| above which a correlation is reported
    pub correlation_threshold: f64,

    /// Observations a source needs before its rules run
    pub min_observations: usize,

    /// Most recent entries inspected by the weakest-component rules
    pub weakest_window: usize,

    /// TSB below which a fatigue warning is raised
    pub tsb_fatigue: f64,

    /// TSB above which the athlete is reported fresh
    pub tsb_fresh: f64,

    /// Monotony above which load variation is flagged
    pub monotony_threshold: f64,

    /// Mean DASS component (0-3) above which it is flagged
    pub dass_component_threshold: f64,

    /// |slope| in DASS points per assessment that counts as a trend
    pub dass_slope_threshold: f64,
}

impl Default for InsightConfig {
    fn default() -> Self {
        InsightConfig {
            trend_min_observations: 14,
            trend_delta: 5.0,
            correlation_threshold: 0.5,
            min_observations: 7,
            weakest_window: 3,
            tsb_fatigue: -20.0,
            tsb_fresh: 10.0,
            monotony_threshold: 1.5,
            dass_component_threshold: 1.5,
            dass_slope_threshold: 1.0,
        }
    }
}

/// Weekday (Monday first) and month labels used by calendar groupings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocaleLabels {
    pub weekdays: Vec<String>,
    pub months: Vec<String>,
}

impl LocaleLabels {
    fn from_strs(weekdays: [&str; 7], months: [&str; 12]) -> Self {
        LocaleLabels {
            weekdays: weekdays.iter().map(|s| s.to_string()).collect(),
            months: months.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn english() -> Self {
        Self::from_strs(
            [
                "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday",
            ],
            [
                "January", "February", "March", "April", "May", "June", "July", "August",
                "September", "October", "November", "December",
            ],
        )
    }

    pub fn portuguese() -> Self {
        Self::from_strs(
            [
                "Segunda", "Terça", "Quarta", "Quinta", "Sexta", "Sábado", "Domingo",
            ],
            [
                "Janeiro", "Fevereiro", "Março", "Abril", "Maio", "Junho", "Julho", "Agosto",
                "Setembro", "Outubro", "Novembro", "Dezembro",
            ],
        )
    }

    pub fn weekday(&self, day: Weekday) -> &str {
        self.weekday_by_index(day.num_days_from_monday())
    }

    /// Label for a Monday-based weekday index (0-6)
    pub fn weekday_by_index(&self, index: u32) -> &str {
        self.weekdays
            .get(index as usize)
            .map(String::as_str)
            .unwrap_or("?")
    }

    /// Label for a month number (1-12)
    pub fn month(&self, month: u32) -> &str {
        month
            .checked_sub(1)
            .and_then(|i| self.months.get(i as usize))
            .map(String::as_str)
            .unwrap_or("?")
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.weekdays.len() != 7 {
            return Err(format!("expected 7 weekday labels, got {}", self.weekdays.len()));
        }
        if self.months.len() != 12 {
            return Err(format!("expected 12 month labels, got {}", self.months.len()));
        }
        if self
            .weekdays
            .iter()
            .chain(&self.months)
            .any(|label| label.trim().is_empty())
        {
            return Err("locale labels must not be empty".to_string());
        }
        Ok(())
    }
}

impl Default for LocaleLabels {
    fn default() -> Self {
        Self::english()
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        let now = Utc::now();

        AnalyticsConfig {
            metadata: ConfigMetadata {
                version: "1.0".to_string(),
                created_at: now,
                updated_at: now,
            },
            readiness: ReadinessFormula::default(),
            pmc: PmcConfig::default(),
            statistics: StatisticsConfig::default(),
            insights: InsightConfig::default(),
            locale: LocaleLabels::default(),
        }
    }
}

impl AnalyticsConfig {
    /// Check every section, naming the first invalid one
    pub fn validate(&self) -> crate::error::Result<()> {
        let section = |name: &str, result: std::result::Result<(), String>| {
            result.map_err(|e| AthleteMonitorError::Configuration(format!("[{}] {}", name, e)))
        };

        section("readiness", self.readiness.validate())?;
        section("pmc", self.pmc.validate())?;
        section("locale", self.locale.validate())?;
        section(
            "statistics",
            if self.statistics.min_correlation_samples < 2 {
                Err("min_correlation_samples must be at least 2".to_string())
            } else if self.statistics.min_normality_samples < 3 {
                Err("min_normality_samples must be at least 3".to_string())
            } else if self.statistics.rolling_window == 0 || self.statistics.rolling_min_periods == 0 {
                Err("rolling window and min periods must be positive".to_string())
            } else {
                Ok(())
            },
        )?;
        section(
            "insights",
            if !(0.0..=1.0).contains(&self.insights.correlation_threshold) {
                Err("correlation_threshold must be within [0, 1]".to_string())
            } else if self.insights.min_observations == 0 || self.insights.weakest_window == 0 {
                Err("observation floors must be positive".to_string())
            } else if self.insights.tsb_fatigue >= self.insights.tsb_fresh {
                Err("tsb_fatigue must be below tsb_fresh".to_string())
            } else {
                Ok(())
            },
        )?;
        Ok(())
    }

    /// Load and validate configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AnalyticsConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;

        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".athlete-monitor")
            .join("config.toml")
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %config_path.display(), error = %e, "using default configuration");
                Self::default()
            }
        }
    }

    /// Save configuration to default location
    pub fn save_default(&mut self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to_file(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scores::{SleepDurationScale, WeightTable};
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = AnalyticsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.insights.min_observations, 7);
        assert_eq!(config.pmc.ctl_span, 42);
        assert_eq!(config.locale.weekday(Weekday::Sun), "Sunday");
    }

    #[test]
    fn test_config_serialization() {
        let config = AnalyticsConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: AnalyticsConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.metadata.version, deserialized.metadata.version);
        assert_eq!(config.readiness, deserialized.readiness);
        assert_eq!(config.pmc, deserialized.pmc);
    }

    #[test]
    fn test_config_file_io() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut original = AnalyticsConfig::default();
        original.readiness.weights = WeightTable::legacy_with_fatigue();
        original.readiness.sleep_scale = SleepDurationScale::Target { target_hours: 8.0 };
        original.locale = LocaleLabels::portuguese();

        original.save_to_file(&config_path).unwrap();
        let loaded = AnalyticsConfig::load_from_file(&config_path).unwrap();

        assert_eq!(loaded.readiness.weights.version, 1);
        assert_eq!(
            loaded.readiness.sleep_scale,
            SleepDurationScale::Target { target_hours: 8.0 }
        );
        assert_eq!(loaded.locale.month(3), "Março");
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let mut config = AnalyticsConfig::default();
        config.readiness.weights.energy = 0.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("[readiness]"));
    }

    #[test]
    fn test_invalid_file_rejected_on_load() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let mut config = AnalyticsConfig::default();
        config.insights.correlation_threshold = 1.5;
        config.save_to_file(&config_path).unwrap();

        assert!(AnalyticsConfig::load_from_file(&config_path).is_err());
    }

    #[test]
    fn test_locale_validation() {
        let mut labels = LocaleLabels::english();
        assert_eq!(labels.month(0), "?");
        assert_eq!(labels.weekday_by_index(9), "?");

        labels.weekdays.pop();
        assert!(labels.validate().is_err());
    }
}
