//! Configuration management for the CLI.

use crate::error::{CliError, Result};
use casegraph_coordinator::CoordinatorConfig;
use casegraph_gatekeeper::DedupConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding `staging.db` and `documents/`
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log filter used when neither `CASEGRAPH_LOG` nor `RUST_LOG` is set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Global settings
    #[serde(default)]
    pub settings: Settings,

    /// Locking and retry settings
    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    /// Duplicate search settings
    #[serde(default)]
    pub dedup: DedupConfig,
}

/// Global CLI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Default output format
    #[serde(default = "default_format")]
    pub format: OutputFormat,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format
    Table,
    /// JSON format
    Json,
    /// Quiet (minimal) format
    Quiet,
}

impl Config {
    /// Get the default configuration file path.
    pub fn path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
        Ok(home.join(".casegraph").join("config.toml"))
    }

    /// Load configuration from `explicit`, or from the default path.
    ///
    /// A missing default file yields the defaults; a missing explicit file is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::load_from(path)?,
            None => {
                let path = Self::path()?;
                if path.exists() {
                    Self::load_from(&path)?
                } else {
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| CliError::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Ok(toml::from_str(&contents)?)
    }

    /// Check the embedded service configurations.
    pub fn validate(&self) -> Result<()> {
        self.coordinator
            .validate()
            .map_err(|e| CliError::Config(e.to_string()))?;
        self.dedup.validate().map_err(CliError::Config)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            settings: Settings::default(),
            coordinator: CoordinatorConfig::default(),
            dedup: DedupConfig::default(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Table,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".casegraph").join("data"))
        .unwrap_or_else(|| PathBuf::from("casegraph-data"))
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_true() -> bool {
    true
}

fn default_format() -> OutputFormat {
    OutputFormat::Table
}
