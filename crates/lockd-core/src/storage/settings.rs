//! Host runtime settings (`lockd.toml`).
//!
//! These tune the process that drives the engine, not the governed sites.
//! Site policies live in the state store so the extension and the CLI
//! see the same values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub flush_interval_secs: u64,
    /// Database file. Defaults to `lockd.db` in the data directory.
    pub database: Option<PathBuf>,
    /// `tracing` filter used when `LOCKD_LOG` is unset.
    pub log_filter: Option<String>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            flush_interval_secs: 15,
            database: None,
            log_filter: None,
        }
    }
}

impl RuntimeSettings {
    pub fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("lockd.toml"),
            message: e.to_string(),
        })?;
        Ok(dir.join("lockd.toml"))
    }

    /// Load from the data directory, writing defaults when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed,
    /// or if the default file cannot be written.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let settings = Self::default();
                settings.save_to(path)?;
                Ok(settings)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs.max(1))
    }

    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.database {
            Some(path) => Ok(path.clone()),
            None => data_dir()
                .map(|dir| dir.join("lockd.db"))
                .map_err(|e| ConfigError::LoadFailed {
                    path: PathBuf::from("lockd.db"),
                    message: e.to_string(),
                }),
        }
    }
}
