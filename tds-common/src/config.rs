//! Configuration loading and resolution
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments (`--config`, `--resolution`, ...)
//! 2. Environment variables (`TDS_CONFIG`, `TDS_RESOLUTION`)
//! 3. TOML configuration file
//! 4. Compiled defaults
//!
//! A missing configuration file is never fatal: the resolver continues with
//! defaults and reports the missing path as a [`ConfigSource`]. A file that
//! exists but does not parse is an error.
//!
//! Configuration is resolved before logging is set up (the log level comes
//! from it), so [`ConfigResolver::resolve_with_source`] does not log; the
//! caller logs the returned source once the subscriber is installed.

use crate::loader::{DEFAULT_EXTENSION, DEFAULT_RESOLUTION};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "TDS_CONFIG";

/// Environment variable overriding the curve resolution
pub const RESOLUTION_ENV_VAR: &str = "TDS_RESOLUTION";

/// Analysis configuration loaded from TOML
///
/// Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Time steps per curve
    #[serde(default = "default_resolution")]
    pub resolution: usize,

    /// Extension of record files picked up from directories
    #[serde(default = "default_file_extension")]
    pub file_extension: String,

    /// Field delimiter for exported tables
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Smoothing level applied before export (fraction of the resolution);
    /// 0 disables smoothing
    #[serde(default)]
    pub smoothing: f64,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_resolution() -> usize {
    DEFAULT_RESOLUTION
}

fn default_file_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

fn default_delimiter() -> String {
    "\t".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
            file_extension: default_file_extension(),
            delimiter: default_delimiter(),
            smoothing: 0.0,
            logging: LoggingConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Read and parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Reject values no analysis can run with
    pub fn validate(&self) -> Result<()> {
        if self.resolution == 0 {
            return Err(Error::Config("resolution must be at least 1".to_string()));
        }
        if self.file_extension.trim_start_matches('.').is_empty() {
            return Err(Error::Config("file_extension must not be empty".to_string()));
        }
        if !(self.smoothing.is_finite() && self.smoothing >= 0.0) {
            return Err(Error::Config(format!(
                "smoothing must be a non-negative number, got {}",
                self.smoothing
            )));
        }
        Ok(())
    }
}

/// Platform config file location (`<config dir>/tds/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tds").join("config.toml"))
}

/// Where the resolved configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// This file was requested but does not exist; defaults were used
    Missing(PathBuf),
    /// No file was requested or found
    Defaults,
}

impl ConfigSource {
    /// Report the source through `tracing`
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => {
                info!("Loaded configuration from {}", path.display())
            }
            ConfigSource::Missing(path) => warn!(
                "Config file {} not found, using default configuration",
                path.display()
            ),
            ConfigSource::Defaults => info!("No config file, using default configuration"),
        }
    }
}

/// Resolves the effective configuration
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
    cli_resolution: Option<usize>,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Config file given on the command line
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.cli_path = path;
        self
    }

    /// Resolution given on the command line
    pub fn with_resolution(mut self, resolution: Option<usize>) -> Self {
        self.cli_resolution = resolution;
        self
    }

    /// Config file to read, if any
    ///
    /// An explicit path (CLI, then `TDS_CONFIG`) is returned even if it does
    /// not exist, so the caller can report it. The platform file is only
    /// returned when present.
    pub fn config_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        default_config_path().filter(|p| p.exists())
    }

    /// Effective configuration, validated, and logs where it came from
    ///
    /// Use [`resolve_with_source`](Self::resolve_with_source) when no
    /// subscriber is installed yet.
    pub fn resolve(&self) -> Result<TomlConfig> {
        let (config, source) = self.resolve_with_source()?;
        source.log();
        Ok(config)
    }

    /// Effective configuration, validated, plus its source; does not log
    ///
    /// # Errors
    /// - [`Error::Config`] if a config file exists but fails to parse, if
    ///   `TDS_RESOLUTION` is not a number, or if the result fails
    ///   [`TomlConfig::validate`]
    pub fn resolve_with_source(&self) -> Result<(TomlConfig, ConfigSource)> {
        let (mut config, source) = match self.config_path() {
            Some(path) if path.is_file() => {
                (TomlConfig::from_file(&path)?, ConfigSource::File(path))
            }
            Some(path) => (TomlConfig::default(), ConfigSource::Missing(path)),
            None => (TomlConfig::default(), ConfigSource::Defaults),
        };

        if let Ok(value) = std::env::var(RESOLUTION_ENV_VAR) {
            config.resolution = value.trim().parse().map_err(|_| {
                Error::Config(format!(
                    "{} must be a positive integer, got \"{}\"",
                    RESOLUTION_ENV_VAR, value
                ))
            })?;
        }
        if let Some(resolution) = self.cli_resolution {
            config.resolution = resolution;
        }

        config.validate()?;
        Ok((config, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.resolution, 1000);
        assert_eq!(config.file_extension, "yml");
        assert_eq!(config.delimiter, "\t");
        assert_eq!(config.smoothing, 0.0);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.file.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let text = "resolution = 250\n[logging]\nlevel = \"debug\"\n";
        let config = TomlConfig::from_toml_str(text).unwrap();
        assert_eq!(config.resolution, 250);
        assert_eq!(config.file_extension, "yml");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(TomlConfig::from_toml_str("").unwrap(), TomlConfig::default());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            TomlConfig::from_toml_str("resolution = \"many\""),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero = TomlConfig {
            resolution: 0,
            ..TomlConfig::default()
        };
        assert!(zero.validate().is_err());

        let no_ext = TomlConfig {
            file_extension: ".".to_string(),
            ..TomlConfig::default()
        };
        assert!(no_ext.validate().is_err());

        let negative = TomlConfig {
            smoothing: -0.1,
            ..TomlConfig::default()
        };
        assert!(negative.validate().is_err());
    }
}
