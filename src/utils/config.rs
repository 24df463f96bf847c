//! Configuration management
//!
//! This module handles loading and managing configuration.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::explain::ExplainConfig;
use crate::model::ModelConfig;
use crate::training::TrainingConfig;

/// Data configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Window length W
    pub window_size: usize,
    /// Fit a min-max scaler on the training split
    pub normalize: bool,
    /// Fraction of the series (from the start) used for training
    pub train_ratio: f64,
    /// Columns ignored when reading CSV files
    pub skip_columns: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            window_size: 20,
            normalize: true,
            train_ratio: 0.8,
            skip_columns: vec!["timestamp".to_string()],
        }
    }
}

/// Detection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Percentile of training scores used as threshold
    pub threshold_percentile: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold_percentile: 99.0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub model: ModelConfig,
    pub training: TrainingConfig,
    pub detection: DetectionConfig,
    pub explain: ExplainConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from file or use default
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
