//! Coordinator configuration
//!
//! A TOML file holding the enabled flag, the path sets and the log level:
//!
//! ```toml
//! enabled = true
//! include_paths = ["/usr/include"]
//! project_include_paths = ["include"]
//! project_files = ["src/main.c", "include/app.h"]
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Every key is optional. A missing file loads the defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::coordinator::ParserCoordinator;
use crate::engine::ParseEngine;
use crate::error::{CoordinatorError, Result};

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Whether parsing is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// System include directories
    #[serde(default)]
    pub include_paths: Vec<PathBuf>,

    /// Project include directories
    #[serde(default)]
    pub project_include_paths: Vec<PathBuf>,

    /// Files belonging to the project
    #[serde(default)]
    pub project_files: Vec<PathBuf>,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_enabled() -> bool {
    true
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            include_paths: Vec::new(),
            project_include_paths: Vec::new(),
            project_files: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl CoordinatorConfig {
    /// Load configuration from a TOML file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("[CONFIG] {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| match e {
            CoordinatorError::Config { message } => CoordinatorError::Config {
                message: format!("{}: {}", path.display(), message),
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| CoordinatorError::Config {
            message: format!("Failed to parse config: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML text
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CoordinatorError::Config {
            message: format!("Failed to serialize config: {}", e),
        })
    }

    fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(CoordinatorError::Config {
                message: format!(
                    "Invalid log level: {}. Must be one of: {}",
                    self.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            });
        }
        Ok(())
    }

    /// Push the enabled flag and path sets into a coordinator
    ///
    /// Paths are added through the coordinator's add operations, so existing
    /// entries are kept and duplicates ignored.
    pub fn apply<E: ParseEngine>(&self, coordinator: &ParserCoordinator<E>) {
        coordinator.set_enabled(self.enabled);
        coordinator.add_include_paths(&self.include_paths);
        coordinator.add_project_include_paths(&self.project_include_paths);
        coordinator.add_project_files(&self.project_files);
    }
}
