//! Pipeline configuration
//!
//! Every knob has a default matching the behaviour of the survey archive
//! exports; the `ORBITAL_*` environment variables and an optional JSON file
//! override them.

use crate::error::{OrbitalError, Result};
use crate::preprocessing::{ScalerType, TemperaturePreference};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Label column names the header locator looks for, in priority order.
pub const DEFAULT_TARGET_COLUMNS: [&str; 3] = ["koi_disposition", "tfopwg_disp", "disposition"];

/// Configuration for the ingestion / training pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of leading rows to try as header offset
    pub header_search_limit: usize,

    /// Number of data rows parsed when probing a header offset
    pub probe_rows: usize,

    /// Recognized label column names
    pub target_columns: Vec<String>,

    /// Minimum non-missing values for a column to count as a feature
    pub min_populated: usize,

    /// Which temperature feeds the engineered features
    pub temperature_preference: TemperaturePreference,

    pub scaler: ScalerType,

    /// Fraction of rows held out for evaluation
    pub test_fraction: f64,

    pub random_seed: u64,

    /// Rounds without validation improvement before the leaf-wise backend stops
    pub early_stopping_rounds: usize,

    /// Directory searched for model artifacts given by bare file name
    pub models_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            header_search_limit: 300,
            probe_rows: 5,
            target_columns: DEFAULT_TARGET_COLUMNS.iter().map(|s| s.to_string()).collect(),
            min_populated: 300,
            temperature_preference: TemperaturePreference::Stellar,
            scaler: ScalerType::Standard,
            test_fraction: 0.2,
            random_seed: 42,
            early_stopping_rounds: 20,
            models_dir: PathBuf::from("./models"),
        }
    }
}

impl PipelineConfig {
    /// Defaults overlaid with any `ORBITAL_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = env_parse::<usize>("ORBITAL_HEADER_SEARCH_LIMIT")? {
            config.header_search_limit = v;
        }
        if let Some(v) = env_parse::<usize>("ORBITAL_PROBE_ROWS")? {
            config.probe_rows = v;
        }
        if let Some(v) = env_parse::<usize>("ORBITAL_MIN_POPULATED")? {
            config.min_populated = v;
        }
        if let Some(v) = env_parse::<f64>("ORBITAL_TEST_FRACTION")? {
            config.test_fraction = v;
        }
        if let Some(v) = env_parse::<u64>("ORBITAL_RANDOM_SEED")? {
            config.random_seed = v;
        }
        if let Some(v) = env_parse::<usize>("ORBITAL_EARLY_STOPPING_ROUNDS")? {
            config.early_stopping_rounds = v;
        }
        if let Ok(v) = std::env::var("ORBITAL_TEMPERATURE_PREFERENCE") {
            config.temperature_preference = v.parse()?;
        }
        if let Ok(v) = std::env::var("ORBITAL_SCALER") {
            config.scaler = v.parse()?;
        }
        if let Ok(dir) = std::env::var("ORBITAL_MODELS_DIR") {
            config.models_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_columns.is_empty() {
            return Err(OrbitalError::ConfigError(
                "target_columns must not be empty".into(),
            ));
        }
        if self.probe_rows == 0 {
            return Err(invalid("probe_rows", &self.probe_rows, "must be at least 1"));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(invalid(
                "test_fraction",
                &self.test_fraction,
                "must lie strictly between 0 and 1",
            ));
        }
        Ok(())
    }

    /// Resolve a model artifact name: used as given when it exists,
    /// otherwise looked up under `models_dir`.
    pub fn resolve_model_path(&self, name: &Path) -> PathBuf {
        if name.is_absolute() || name.exists() {
            name.to_path_buf()
        } else {
            self.models_dir.join(name)
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| invalid(key, &raw, "could not be parsed")),
        Err(_) => Ok(None),
    }
}

fn invalid(name: &str, value: &dyn std::fmt::Display, reason: &str) -> OrbitalError {
    OrbitalError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
