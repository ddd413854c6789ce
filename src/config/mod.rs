//! Configuration loading.
//!
//! Read from `~/.huti/config.json` (every section optional), then overridden
//! by `HUTI_*` environment variables. A `.env` file in the working directory
//! is loaded first when present.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HutiError, Result};

/// Output format for log lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines (default).
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Memoizing cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// When false, wrappers built with this config run every call uncached.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub cache: CacheConfig,
}

impl Config {
    /// `~/.huti/config.json`
    pub fn path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".huti")
            .join("config.json")
    }

    /// Load from the default path with environment overrides applied.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = Self::load_from_path(&Self::path())?;
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(data) => serde_json::from_str(&data)
                .map_err(|e| HutiError::Config(format!("{}: {}", path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(HutiError::Io(e)),
        }
    }

    /// Apply `HUTI_LOG_LEVEL`, `HUTI_LOG_FORMAT` and `HUTI_CACHE_ENABLED`.
    pub fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(level) = var("HUTI_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("HUTI_LOG_FORMAT") {
            self.logging.format = match format.to_ascii_lowercase().as_str() {
                "pretty" => LogFormat::Pretty,
                "json" => LogFormat::Json,
                other => {
                    return Err(HutiError::Config(format!(
                        "HUTI_LOG_FORMAT must be 'pretty' or 'json', got '{}'",
                        other
                    )))
                }
            };
        }
        if let Some(enabled) = var("HUTI_CACHE_ENABLED") {
            self.cache.enabled = parse_bool(&enabled).ok_or_else(|| {
                HutiError::Config(format!("HUTI_CACHE_ENABLED is not a boolean: '{}'", enabled))
            })?;
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
