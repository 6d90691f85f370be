//! Farm runner configuration — every tunable threshold as an operator-editable
//! TOML value, with documented `Default` impls.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one farm scheduler deployment.
///
/// Load with `FarmRunnerConfig::load()`, which searches:
/// 1. `$FARM_RUNNER_CONFIG` env var
/// 2. `./farm_runner.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmRunnerConfig {
    #[serde(default)]
    pub quality_thresholds: QualityThresholds,

    #[serde(default)]
    pub regeneration_rules: RegenerationRules,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for FarmRunnerConfig {
    fn default() -> Self {
        Self {
            quality_thresholds: QualityThresholds::default(),
            regeneration_rules: RegenerationRules::default(),
            source: SourceConfig::default(),
            scheduler: SchedulerConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl FarmRunnerConfig {
    /// Load configuration using the standard search order:
    /// 1. `$FARM_RUNNER_CONFIG` environment variable
    /// 2. `./farm_runner.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("FARM_RUNNER_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded farm runner config from FARM_RUNNER_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from FARM_RUNNER_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "FARM_RUNNER_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from("farm_runner.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded farm runner config from ./farm_runner.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./farm_runner.toml, using defaults");
                }
            }
        }

        info!("No farm_runner.toml found — using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate internal consistency. Escalation thresholds and ratios must
    /// make physical sense; a config that fails validation is refused at
    /// load time rather than silently misbehaving at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();
        let q = &self.quality_thresholds;
        let r = &self.regeneration_rules;

        if !(q.excellent_max_age_hours < q.good_max_age_hours
            && q.good_max_age_hours < q.fair_max_age_hours)
        {
            errors.push(format!(
                "quality_thresholds age bands must be strictly increasing: excellent ({}) < good ({}) < fair ({})",
                q.excellent_max_age_hours, q.good_max_age_hours, q.fair_max_age_hours
            ));
        }
        if !(0.0..=1.0).contains(&q.min_confidence) {
            errors.push(format!(
                "quality_thresholds.min_confidence ({}) must be within [0, 1]",
                q.min_confidence
            ));
        }
        if q.min_water_level_mm >= q.max_water_level_mm {
            errors.push(format!(
                "quality_thresholds.min_water_level_mm ({}) must be less than max_water_level_mm ({})",
                q.min_water_level_mm, q.max_water_level_mm
            ));
        }
        if !(0.0..=1.0).contains(&r.max_duration_adjustment_ratio) {
            errors.push(format!(
                "regeneration_rules.max_duration_adjustment_ratio ({}) must be within [0, 1]",
                r.max_duration_adjustment_ratio
            ));
        }
        if r.min_irrigation_duration_minutes >= r.max_irrigation_duration_minutes {
            errors.push(format!(
                "regeneration_rules.min_irrigation_duration_minutes ({}) must be less than max ({})",
                r.min_irrigation_duration_minutes, r.max_irrigation_duration_minutes
            ));
        }
        if self.source.max_cache_age_hours == 0 {
            errors.push("source.max_cache_age_hours must be > 0".to_string());
        }
        if self.scheduler.tick_interval_s == 0 {
            errors.push("scheduler.tick_interval_s must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Age- and range-based reading-quality derivation thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityThresholds {
    pub excellent_max_age_hours: f64,
    pub good_max_age_hours: f64,
    pub fair_max_age_hours: f64,
    pub min_confidence: f64,
    pub min_water_level_mm: f64,
    pub max_water_level_mm: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            excellent_max_age_hours: 1.0,
            good_max_age_hours: 6.0,
            fair_max_age_hours: 24.0,
            min_confidence: 0.5,
            min_water_level_mm: crate::config::defaults::MIN_WATER_LEVEL_MM,
            max_water_level_mm: crate::config::defaults::MAX_WATER_LEVEL_MM,
        }
    }
}

/// Plan Regenerator tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegenerationRules {
    pub water_level_threshold_mm: f64,
    pub max_duration_adjustment_ratio: f64,
    pub min_irrigation_duration_minutes: f64,
    pub max_irrigation_duration_minutes: f64,
    pub water_level_target_mm: f64,
    pub water_level_tolerance_mm: f64,
    pub max_time_adjustment_s: f64,
    pub max_water_adjustment_m3: f64,
}

impl Default for RegenerationRules {
    fn default() -> Self {
        Self {
            water_level_threshold_mm: 10.0,
            max_duration_adjustment_ratio: 0.5,
            min_irrigation_duration_minutes: 5.0,
            max_irrigation_duration_minutes: 180.0,
            water_level_target_mm: 50.0,
            water_level_tolerance_mm: 5.0,
            max_time_adjustment_s: 3600.0,
            max_water_adjustment_m3: 100.0,
        }
    }
}

/// Water-Level Source fallback-chain tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub api_throttle_minutes: f64,
    pub max_cache_age_hours: u64,
    pub fetch_timeout_s: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_throttle_minutes: 5.0,
            max_cache_age_hours: 24,
            fetch_timeout_s: 30,
        }
    }
}

/// Batch Scheduler cadence tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub tick_interval_s: u64,
    pub pre_buffer_minutes: f64,
    pub completion_poll_interval_s: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_s: crate::config::defaults::DEFAULT_TICK_INTERVAL_S,
            pre_buffer_minutes: crate::config::defaults::DEFAULT_PRE_BUFFER_MINUTES,
            completion_poll_interval_s: crate::config::defaults::DEFAULT_COMPLETION_POLL_INTERVAL_S,
        }
    }
}

/// HTTP control surface configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8088".to_string(),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Io(PathBuf, std::io::Error),

    #[error("failed to parse config file {0}: {1}")]
    Parse(PathBuf, toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("config validation failed: {}", .0.join("; "))]
    Invalid(Vec<String>),
}
