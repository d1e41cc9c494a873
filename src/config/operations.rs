//! Config loading, validation, and utility operations.

use super::model::Config;
use super::types::MIN_STALE_TO_HEARTBEAT_RATIO;
use crate::error::{FolioError, Result};
use std::path::Path;
use std::time::Duration;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(FolioError::UserError)` - Read error, parse error, or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            FolioError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load config if the file exists, otherwise return the defaults.
    ///
    /// A present but invalid file is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // serde_yaml maps an empty document to unit, not to an empty map.
        let config: Config = if yaml.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(yaml)
                .map_err(|e| FolioError::UserError(format!("failed to parse config YAML: {}", e)))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| FolioError::UserError(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `lock_stale_seconds` must be positive
    /// - `heartbeat_interval_seconds` must be positive
    /// - `lock_stale_seconds` must be at least 3x `heartbeat_interval_seconds`
    pub fn validate(&self) -> Result<()> {
        if self.lock_stale_seconds == 0 {
            return Err(FolioError::UserError(
                "config validation failed: lock_stale_seconds must be greater than 0".to_string(),
            ));
        }

        if self.heartbeat_interval_seconds == 0 {
            return Err(FolioError::UserError(
                "config validation failed: heartbeat_interval_seconds must be greater than 0"
                    .to_string(),
            ));
        }

        let min_stale = self
            .heartbeat_interval_seconds
            .saturating_mul(MIN_STALE_TO_HEARTBEAT_RATIO);
        if self.lock_stale_seconds < min_stale {
            return Err(FolioError::UserError(format!(
                "config validation failed: lock_stale_seconds ({}) must be at least {}x heartbeat_interval_seconds ({}); use {} or more",
                self.lock_stale_seconds,
                MIN_STALE_TO_HEARTBEAT_RATIO,
                self.heartbeat_interval_seconds,
                min_stale
            )));
        }

        Ok(())
    }

    /// Staleness threshold as a chrono duration.
    pub fn stale_threshold(&self) -> chrono::Duration {
        i64::try_from(self.lock_stale_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    /// Heartbeat interval as a std duration.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds)
    }

    /// Per-operation I/O deadline, or `None` when disabled.
    pub fn io_timeout(&self) -> Option<Duration> {
        (self.io_timeout_seconds > 0).then(|| Duration::from_secs(self.io_timeout_seconds))
    }
}
