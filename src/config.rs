//! Engine Configuration
//!
//! Read from a JSON file. Every field has a default, so a missing file or a
//! partial one is fine; unknown keys are rejected.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, DEFAULT_TASK_POINTS};
use crate::ordering::RearmPolicy;

/// Database file name that selects an in-memory database
pub const MEMORY_DB: &str = ":memory:";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<ConfigError> for DomainError {
    fn from(e: ConfigError) -> Self {
        DomainError::InvalidInput(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Directory holding the database (and logs, unless `log_dir` is set)
    pub data_dir: PathBuf,
    /// File name inside `data_dir`, or `:memory:`
    pub db_file: String,
    pub log_dir: Option<PathBuf>,
    pub app_name: String,
    /// Points for tasks created without an explicit value
    pub default_points: i64,
    pub rearm_policy: RearmPolicy,
    pub log_retention_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            db_file: "mindboard.db".to_string(),
            log_dir: None,
            app_name: "mindboard".to_string(),
            default_points: DEFAULT_TASK_POINTS,
            rearm_policy: RearmPolicy::default(),
            log_retention_days: rolling_logger::DEFAULT_RETENTION_DAYS,
        }
    }
}

impl EngineConfig {
    /// Config with an in-memory database, for tests and throwaway sessions
    pub fn in_memory() -> Self {
        Self {
            db_file: MEMORY_DB.to_string(),
            ..Self::default()
        }
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("no config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let body = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, body).map_err(io_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_name.trim().is_empty() {
            return Err(ConfigError::Invalid("app_name is empty".to_string()));
        }
        if self.db_file.trim().is_empty() {
            return Err(ConfigError::Invalid("db_file is empty".to_string()));
        }
        if self.default_points < 0 {
            return Err(ConfigError::Invalid(format!(
                "default_points must not be negative, got {}",
                self.default_points
            )));
        }
        Ok(())
    }

    pub fn is_in_memory(&self) -> bool {
        self.db_file == MEMORY_DB
    }

    pub fn db_path(&self) -> PathBuf {
        if self.is_in_memory() {
            PathBuf::from(MEMORY_DB)
        } else {
            self.data_dir.join(&self.db_file)
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| self.data_dir.join("logs"))
    }
}
