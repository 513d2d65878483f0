//! Core configuration.
//!
//! # Responsibility
//! - Hold logging and sentinel settings in one serde-friendly shape.
//! - Validate settings before any native store is touched.
//!
//! # Invariants
//! - A validated config has an absolute `log_dir` and `scratch_dir` when set.
//! - `1 <= port_floor <= port_ceiling`.

use crate::logging::normalize_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const DEFAULT_SENTINEL_PORT_FLOOR: u16 = 49152;
const DEFAULT_SENTINEL_PORT_CEILING: u16 = u16::MAX;

/// Top-level configuration for core callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub logging: LoggingConfig,
    pub sentinel: SentinelConfig,
}

/// Rolling file log settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Logging stays off when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            log_dir: None,
        }
    }
}

/// Settings for the temporary identities used during guarded removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    /// Lowest port a port sentinel may take.
    pub port_floor: u16,
    /// Highest port a port sentinel may take; scanning starts here.
    pub port_ceiling: u16,
    /// Directory for application sentinel scratch files; system temp if unset.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            port_floor: DEFAULT_SENTINEL_PORT_FLOOR,
            port_ceiling: DEFAULT_SENTINEL_PORT_CEILING,
            scratch_dir: None,
        }
    }
}

impl SentinelConfig {
    /// Directory scratch files are created in.
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Configuration parse/validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Parse(String),
    InvalidLevel(String),
    RelativePath {
        field: &'static str,
        path: PathBuf,
    },
    InvalidPortRange {
        floor: u16,
        ceiling: u16,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(message) => write!(f, "invalid config document: {message}"),
            Self::InvalidLevel(message) => write!(f, "{message}"),
            Self::RelativePath { field, path } => write!(
                f,
                "{field} must be an absolute path, got `{}`",
                path.display()
            ),
            Self::InvalidPortRange { floor, ceiling } => write!(
                f,
                "sentinel port range {floor}..={ceiling} is empty or includes port 0"
            ),
        }
    }
}

impl Error for ConfigError {}

impl CoreConfig {
    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        let config: CoreConfig =
            serde_json::from_str(document).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        normalize_level(&self.logging.level).map_err(ConfigError::InvalidLevel)?;
        if let Some(dir) = &self.logging.log_dir {
            require_absolute("logging.log_dir", dir)?;
        }
        if let Some(dir) = &self.sentinel.scratch_dir {
            require_absolute("sentinel.scratch_dir", dir)?;
        }
        let (port_floor, port_ceiling) = (self.sentinel.port_floor, self.sentinel.port_ceiling);
        if port_floor == 0 || port_floor > port_ceiling {
            return Err(ConfigError::InvalidPortRange {
                floor: port_floor,
                ceiling: port_ceiling,
            });
        }
        Ok(())
    }
}

fn require_absolute(field: &'static str, path: &Path) -> Result<(), ConfigError> {
    if path.is_absolute() {
        Ok(())
    } else {
        Err(ConfigError::RelativePath {
            field,
            path: path.to_path_buf(),
        })
    }
}
