//! Utility module
//!
//! This module provides:
//! - Configuration management
//! - Logging setup

mod config;
mod logging;

pub use config::{Config, DataConfig, DetectionConfig, LoggingConfig};
pub use logging::{level_from_verbosity, setup_logging};
