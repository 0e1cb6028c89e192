//! SortBus configuration file types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::coordinator::SortConfig;

/// File name looked up in the working directory
pub const LOCAL_CONFIG: &str = ".sortbus.yml";

/// Outcome of [`Config::load`]
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Config,
    /// File the configuration came from; `None` means defaults
    pub source: Option<PathBuf>,
    /// Files found on the fallback chain that could not be loaded
    pub skipped: Vec<SkippedFile>,
}

/// A config file passed over during the fallback chain
#[derive(Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub error: eyre::Report,
}

/// Top-level SortBus configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Seed for the input generator; random when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Sort run options
    pub sort: SortConfig,
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        if let Some(level) = &self.log_level
            && level.parse::<tracing::Level>().is_err()
        {
            return Err(eyre::eyre!(
                "Unknown log-level: {}. Use: trace, debug, info, warn, or error",
                level
            ));
        }
        self.sort.validate().context("Invalid sort configuration")?;
        Ok(())
    }

    /// Load configuration with fallback chain
    ///
    /// An explicit path must load. Otherwise the first readable file among
    /// `./.sortbus.yml` and `~/.config/sortbus/sortbus.yml` wins, and the
    /// files that exist but fail to parse come back in `skipped`. Nothing is
    /// logged here since this runs before logging is set up.
    pub fn load(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
        match config_path {
            Some(path) => {
                let config =
                    Self::read(path).with_context(|| format!("Failed to load config from {}", path.display()))?;
                Ok(LoadedConfig {
                    config,
                    source: Some(path.clone()),
                    skipped: Vec::new(),
                })
            }
            None => Ok(Self::first_found(&search_paths())),
        }
    }

    fn first_found(candidates: &[PathBuf]) -> LoadedConfig {
        let mut skipped = Vec::new();
        for path in candidates.iter().filter(|path| path.exists()) {
            match Self::read(path) {
                Ok(config) => {
                    return LoadedConfig {
                        config,
                        source: Some(path.clone()),
                        skipped,
                    };
                }
                Err(error) => skipped.push(SkippedFile {
                    path: path.clone(),
                    error,
                }),
            }
        }
        LoadedConfig {
            config: Self::default(),
            source: None,
            skipped,
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        serde_yaml::from_str(&content).context("Failed to parse config file")
    }

    /// Render as YAML, the same shape `load` reads
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config")
    }
}

/// Project-local file first, then the user config directory
fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG)];
    paths.extend(dirs::config_dir().map(|dir| dir.join("sortbus").join("sortbus.yml")));
    paths
}
