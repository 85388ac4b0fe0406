//! Service configuration.
//!
//! Loaded from a YAML file. Every section falls back to its defaults, so a
//! partial file (or none at all) still yields a usable configuration.

use crate::features::{Feature, FeatureRange};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default ring buffer capacity for the prediction log
pub const DEFAULT_LOG_CAPACITY: usize = 100;

/// Default minimum number of successful predictions before drift analysis
pub const DEFAULT_DRIFT_MIN_SAMPLES: usize = 5;

/// Default seed for the synthetic reference sample
pub const DEFAULT_SYNTHETIC_SEED: u64 = 42;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub models: ModelsConfig,
    pub reference: ReferenceConfig,
    pub validation: ValidationConfig,
    pub monitoring: MonitoringConfig,
}

impl Config {
    /// Load and validate configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&content)?;
        info!(path = %path.display(), "Configuration file parsed");
        Ok(config)
    }

    /// Load from a file when it exists, otherwise use defaults
    pub fn from_file_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            warn!(path = %path.display(), "Configuration file not found, using defaults");
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Parse and validate configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.server.request_timeout_secs == 0 {
            return Err(Error::config("server.request_timeout_secs must be greater than 0"));
        }
        for (feature, range) in &self.validation.ranges {
            if range.min > range.max {
                return Err(Error::config(format!(
                    "validation range for {} has min {} greater than max {}",
                    feature, range.min, range.max
                )));
            }
        }
        if self.monitoring.log_capacity == 0 {
            return Err(Error::config("monitoring.log_capacity must be greater than 0"));
        }
        if self.monitoring.drift_min_samples < 2 {
            return Err(Error::config("monitoring.drift_min_samples must be at least 2"));
        }
        if self.monitoring.drift_window < self.monitoring.drift_min_samples {
            return Err(Error::config(
                "monitoring.drift_window must not be smaller than drift_min_samples",
            ));
        }
        let alpha = self.monitoring.drift_significance;
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(Error::config("monitoring.drift_significance must be in (0, 1)"));
        }
        if self.reference.synthetic_size == 0 {
            return Err(Error::config("reference.synthetic_size must be greater than 0"));
        }
        Ok(())
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            request_timeout_secs: 30,
        }
    }
}

/// Locations of the trained model artifacts and their metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Primary model (model 1)
    pub primary_path: PathBuf,
    /// Backup model (model 2)
    pub secondary_path: PathBuf,
    /// Offline training metrics (r2 / mape per model)
    pub metrics_path: PathBuf,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            primary_path: PathBuf::from("models/model_1.json"),
            secondary_path: PathBuf::from("models/model_2.json"),
            metrics_path: PathBuf::from("models/metrics.json"),
        }
    }
}

/// Reference dataset sources, tried in order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    /// Processed training sample (JSON records)
    pub processed_path: PathBuf,
    /// Raw dataset (CSV with header)
    pub raw_path: PathBuf,
    pub synthetic_seed: u64,
    pub synthetic_size: usize,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            processed_path: PathBuf::from("data/processed/x_train.json"),
            raw_path: PathBuf::from("data/raw/data_rumah.csv"),
            synthetic_seed: DEFAULT_SYNTHETIC_SEED,
            synthetic_size: 100,
        }
    }
}

/// Admissible ranges for request features
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Reject out-of-range request values
    pub enforce: bool,
    pub ranges: BTreeMap<Feature, FeatureRange>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        let ranges = BTreeMap::from([
            (Feature::BuildingArea, FeatureRange::new(10, 2_000)),
            (Feature::LandArea, FeatureRange::new(10, 3_000)),
            (Feature::Bedrooms, FeatureRange::new(0, 20)),
            (Feature::Bathrooms, FeatureRange::new(0, 20)),
            (Feature::Garages, FeatureRange::new(0, 20)),
        ]);
        Self {
            enforce: true,
            ranges,
        }
    }
}

/// Prediction log and drift analysis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_capacity: usize,
    pub drift_min_samples: usize,
    /// Most recent successful predictions compared against the reference
    pub drift_window: usize,
    /// p-value below which a feature counts as drifted
    pub drift_significance: f64,
    /// Use the statistical tests; when false only the mean-shift method runs
    pub statistical_tests: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_capacity: DEFAULT_LOG_CAPACITY,
            drift_min_samples: DEFAULT_DRIFT_MIN_SAMPLES,
            drift_window: DEFAULT_LOG_CAPACITY,
            drift_significance: 0.05,
            statistical_tests: true,
        }
    }
}
