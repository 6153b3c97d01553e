//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching config/default.toml.
//! Every section is optional; missing keys take the engine defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::strategy::params::{BandConfig, ClassifierConfig, EngineConfig, NormalizerConfig};

/// Environment override for `[storage] calibration_path`
pub const CALIBRATION_PATH_ENV: &str = "VALUATION_CALIBRATION_PATH";

/// Main configuration structure matching config/default.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub classifier: ClassifierSection,
    pub normalizer: NormalizerSection,
    pub bands: BandsSection,
    pub rebuild: RebuildSection,
    pub storage: StorageSection,
    pub logging: LoggingSection,
}

/// Zone thresholds and score model
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierSection {
    /// Risk below this is the low zone (long bias)
    pub low_threshold: f64,
    /// Risk at or above this is the high zone (short bias)
    pub high_threshold: f64,
    pub cheapness_weight: f64,
    pub rarity_weight: f64,
    pub win_rate_base: f64,
    pub win_rate_slope: f64,
}

impl Default for ClassifierSection {
    fn default() -> Self {
        let defaults = ClassifierConfig::default();
        Self {
            low_threshold: defaults.low_threshold,
            high_threshold: defaults.high_threshold,
            cheapness_weight: defaults.cheapness_weight,
            rarity_weight: defaults.rarity_weight,
            win_rate_base: defaults.win_rate_base,
            win_rate_slope: defaults.win_rate_slope,
        }
    }
}

/// Polynomial root search
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NormalizerSection {
    /// Relative price tolerance (1e-6 = 0.0001%)
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for NormalizerSection {
    fn default() -> Self {
        let defaults = NormalizerConfig::default();
        Self {
            tolerance: defaults.tolerance,
            max_iterations: defaults.max_iterations,
        }
    }
}

/// Rarity weight range
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BandsSection {
    pub min_coefficient: f64,
    pub max_coefficient: f64,
}

impl Default for BandsSection {
    fn default() -> Self {
        let defaults = BandConfig::default();
        Self {
            min_coefficient: defaults.min_coefficient,
            max_coefficient: defaults.max_coefficient,
        }
    }
}

/// Background grid rebuilds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RebuildSection {
    /// Seconds between rebuild passes
    pub interval_secs: u64,
    /// Run one pass right after loading calibrations
    pub on_startup: bool,
}

impl Default for RebuildSection {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            on_startup: true,
        }
    }
}

/// Calibration storage
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// JSON calibration file
    pub calibration_path: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            calibration_path: "data/calibrations.json".to_string(),
        }
    }
}

impl StorageSection {
    /// Calibration path with environment variable override and `~` expanded.
    /// Checks VALUATION_CALIBRATION_PATH env var first, falls back to config value
    pub fn get_calibration_path(&self) -> PathBuf {
        let raw = std::env::var(CALIBRATION_PATH_ENV)
            .unwrap_or_else(|_| self.calibration_path.clone());
        PathBuf::from(shellexpand::tilde(&raw).to_string())
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        EngineConfig::from(self)
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if self.rebuild.interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "rebuild interval_secs must be > 0".to_string(),
            ));
        }

        if self.storage.calibration_path.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "calibration_path cannot be empty".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging level must be one of {:?}, got '{}'",
                LOG_LEVELS, self.logging.level
            )));
        }

        Ok(())
    }
}

// Conversion from Config to EngineConfig
impl From<&Config> for EngineConfig {
    fn from(config: &Config) -> Self {
        EngineConfig {
            normalizer: NormalizerConfig {
                tolerance: config.normalizer.tolerance,
                max_iterations: config.normalizer.max_iterations,
            },
            bands: BandConfig {
                min_coefficient: config.bands.min_coefficient,
                max_coefficient: config.bands.max_coefficient,
            },
            classifier: ClassifierConfig {
                low_threshold: config.classifier.low_threshold,
                high_threshold: config.classifier.high_threshold,
                cheapness_weight: config.classifier.cheapness_weight,
                rarity_weight: config.classifier.rarity_weight,
                win_rate_base: config.classifier.win_rate_base,
                win_rate_slope: config.classifier.win_rate_slope,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_valid_config() -> String {
        r#"
[classifier]
low_threshold = 0.25
high_threshold = 0.75
cheapness_weight = 0.7
rarity_weight = 0.3
win_rate_base = 0.5
win_rate_slope = 0.6

[normalizer]
tolerance = 1e-6
max_iterations = 100

[bands]
min_coefficient = 1.0
max_coefficient = 1.6

[rebuild]
interval_secs = 900
on_startup = false

[storage]
calibration_path = "~/valuation/calibrations.json"

[logging]
level = "debug"
"#
        .to_string()
    }

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let file = write_config(&create_valid_config());
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.classifier.low_threshold, 0.25);
        assert_eq!(config.normalizer.max_iterations, 100);
        assert_eq!(config.rebuild.interval_secs, 900);
        assert!(!config.rebuild.on_startup);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/path/config.toml");
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), ConfigError::IoError(_)));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = write_config("");
        let config = load_config(file.path()).unwrap();

        assert_eq!(EngineConfig::from(&config), EngineConfig::default());
        assert_eq!(config.rebuild.interval_secs, 3600);
        assert_eq!(config.storage.calibration_path, "data/calibrations.json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_section() {
        let file = write_config("[classifier]\nlow_threshold = 0.2\n");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.classifier.low_threshold, 0.2);
        assert_eq!(config.classifier.high_threshold, 0.7);
    }

    #[test]
    fn test_invalid_thresholds() {
        let file = write_config("[classifier]\nlow_threshold = 0.8\nhigh_threshold = 0.4\n");
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_invalid_coefficient_range() {
        let file = write_config("[bands]\nmin_coefficient = 1.6\nmax_coefficient = 1.0\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_invalid_rebuild_interval() {
        let file = write_config("[rebuild]\ninterval_secs = 0\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let file = write_config("[logging]\nlevel = \"loud\"\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("loud"));
    }

    #[test]
    fn test_malformed_toml() {
        let file = write_config("[classifier\nlow_threshold = ");
        assert!(matches!(
            load_config(file.path()).unwrap_err(),
            ConfigError::ParseError(_)
        ));
    }

    #[test]
    fn test_config_to_engine_config() {
        let file = write_config(&create_valid_config());
        let config = load_config(file.path()).unwrap();
        let engine_config = EngineConfig::from(&config);

        assert_eq!(engine_config.classifier.low_threshold, 0.25);
        assert_eq!(engine_config.classifier.high_threshold, 0.75);
        assert_eq!(engine_config.normalizer.tolerance, 1e-6);
        assert_eq!(engine_config.bands.max_coefficient, 1.6);
    }

    #[test]
    fn test_calibration_path_tilde_expanded() {
        let file = write_config(&create_valid_config());
        let config = load_config(file.path()).unwrap();

        if std::env::var(CALIBRATION_PATH_ENV).is_err() && std::env::var("HOME").is_ok() {
            let path = config.storage.get_calibration_path();
            assert!(!path.to_string_lossy().starts_with('~'));
            assert!(path.ends_with("valuation/calibrations.json"));
        }
    }
}
