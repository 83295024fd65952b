//! Configuration for a Tandem installation
//!
//! Typed structs mapping to the YAML configuration file, with loading,
//! validation, and defaults. Per-root settings (mode, solve mode, rule
//! files) live on [`SyncRoot`](crate::domain::SyncRoot); this file holds
//! per-installation settings only.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Top-level configuration for Tandem
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub scan: ScanConfig,
    pub transfers: TransferConfig,
    pub debris: DebrisConfig,
    pub logging: LoggingConfig,
}

/// Scanning settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Seconds between full rescans of each root
    pub rescan_interval: u64,
    /// Seconds a transient stall may hide before surfacing to the user
    pub transient_patience: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            rescan_interval: 300,
            transient_patience: 60,
        }
    }
}

/// Transfer queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Remote quota in bytes; 0 means unlimited
    pub quota_bytes: u64,
    /// Maximum concurrently active transfer tasks
    pub max_active: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            quota_bytes: 0,
            max_active: 4,
        }
    }
}

/// Debris retention settings (per installation, not per root)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebrisConfig {
    /// Days a debris entry is retained before the age-based purge
    pub retention_days: u32,
}

impl Default for DebrisConfig {
    fn default() -> Self {
        Self { retention_days: 30 }
    }
}

/// Logging / tracing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`
    pub level: String,
    /// Path to the log file
    pub file: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: PathBuf::from("tandem.log"),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ValidationFailed` if the file cannot be
    /// read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self, DomainError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DomainError::ValidationFailed(format!("cannot read config {}: {e}", path.display()))
        })?;
        let config: Config = serde_yaml::from_str(&raw).map_err(|e| {
            DomainError::ValidationFailed(format!("cannot parse config {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save(&self, path: &Path) -> Result<(), DomainError> {
        let raw = serde_yaml::to_string(self)
            .map_err(|e| DomainError::ValidationFailed(format!("cannot serialize config: {e}")))?;
        std::fs::write(path, raw).map_err(|e| {
            DomainError::ValidationFailed(format!("cannot write config {}: {e}", path.display()))
        })
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.transfers.max_active == 0 {
            return Err(DomainError::ValidationFailed(
                "transfers.max_active must be at least 1".to_string(),
            ));
        }
        if self.debris.retention_days == 0 {
            return Err(DomainError::ValidationFailed(
                "debris.retention_days must be at least 1".to_string(),
            ));
        }
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(DomainError::ValidationFailed(format!(
                "unknown logging.level: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_validation_rejects_zero_retention() {
        let mut config = Config::default();
        config.debris.retention_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let mut config = Config::default();
        config.debris.retention_days = 7;
        config.transfers.quota_bytes = 1_000_000;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.debris.retention_days, 7);
        assert_eq!(loaded.transfers.quota_bytes, 1_000_000);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "scan: [not, a, map]").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
