//! Application configuration module
//!
//! Handles loading and validating configuration from environment variables.

use std::path::PathBuf;
use thiserror::Error;

use crate::reconcile::DEFAULT_CONCURRENCY;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Where snapshots and diffs live
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub snapshot_dir: PathBuf,
    pub old_snapshot_key: String,
    pub new_snapshot_key: String,
    pub diff_output_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: PathBuf::from("./snapshots"),
            old_snapshot_key: "previous.json".to_string(),
            new_snapshot_key: "current.json".to_string(),
            diff_output_key: "diff.json".to_string(),
        }
    }
}

/// Live store and reconciliation settings
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub live_catalog_path: PathBuf,
    pub concurrency: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            live_catalog_path: PathBuf::from("./live_catalog.json"),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Complete application settings
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub storage: StorageConfig,
    pub reconcile: ReconcileConfig,
    pub log_format: LogFormat,
}

impl Settings {
    /// Load settings from `.env` and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();

        let storage = StorageConfig {
            snapshot_dir: lookup("SNAPSHOT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage.snapshot_dir),
            old_snapshot_key: lookup("OLD_SNAPSHOT_KEY")
                .unwrap_or(defaults.storage.old_snapshot_key),
            new_snapshot_key: lookup("NEW_SNAPSHOT_KEY")
                .unwrap_or(defaults.storage.new_snapshot_key),
            diff_output_key: lookup("DIFF_OUTPUT_KEY")
                .unwrap_or(defaults.storage.diff_output_key),
        };

        let concurrency = match lookup("RECONCILE_CONCURRENCY") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue(format!(
                        "RECONCILE_CONCURRENCY must be a positive integer, got {:?}",
                        raw
                    )))
                }
            },
            None => defaults.reconcile.concurrency,
        };

        let reconcile = ReconcileConfig {
            live_catalog_path: lookup("LIVE_CATALOG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.reconcile.live_catalog_path),
            concurrency,
        };

        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("") | Some("compact") => LogFormat::Compact,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidValue(format!(
                    "LOG_FORMAT must be 'compact' or 'json', got {:?}",
                    other
                )))
            }
        };

        Ok(Self {
            storage,
            reconcile,
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_settings() {
        let settings = settings_from(&[]).unwrap();
        assert_eq!(settings.storage.old_snapshot_key, "previous.json");
        assert_eq!(settings.storage.new_snapshot_key, "current.json");
        assert_eq!(settings.reconcile.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(settings.log_format, LogFormat::Compact);
    }

    #[test]
    fn test_overrides() {
        let settings = settings_from(&[
            ("SNAPSHOT_DIR", "/data/snapshots"),
            ("RECONCILE_CONCURRENCY", "2"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();

        assert_eq!(settings.storage.snapshot_dir, PathBuf::from("/data/snapshots"));
        assert_eq!(settings.reconcile.concurrency, 2);
        assert_eq!(settings.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_concurrency() {
        assert!(settings_from(&[("RECONCILE_CONCURRENCY", "0")]).is_err());
        assert!(settings_from(&[("RECONCILE_CONCURRENCY", "many")]).is_err());
    }

    #[test]
    fn test_invalid_log_format() {
        assert!(settings_from(&[("LOG_FORMAT", "xml")]).is_err());
    }
}
