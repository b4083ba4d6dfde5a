//! Configuration handling for the modgate CLI

use anyhow::{Context, Result};
use modgate_core::ModuleConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::Level;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub modules: ModuleConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl LogConfig {
    /// The configured level, falling back to `warn` for unrecognised names
    pub fn max_level(&self) -> Level {
        match self.level.to_ascii_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "error" => Level::ERROR,
            _ => Level::WARN,
        }
    }
}

fn default_level() -> String {
    "warn".to_string()
}

/// Load configuration from file or use defaults
pub fn load_config(path: Option<PathBuf>) -> Result<Config> {
    if let Some(path) = path {
        read_config(&path)
    } else if let Some(home) = dirs::home_dir() {
        let default_path = home.join(".modgate").join("config.toml");
        if default_path.exists() {
            read_config(&default_path)
        } else {
            Ok(Config::default())
        }
    } else {
        Ok(Config::default())
    }
}

fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    Ok(config)
}
