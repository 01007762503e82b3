//! Runtime configuration for the CRM core.
//!
//! # Responsibility
//! - Describe database, logging and daily-log sync settings.
//! - Load them from a JSON file with environment overrides.
//!
//! # Invariants
//! - Every field has a default; an empty JSON object is a valid config.
//! - `sync.max_backoff_ms >= sync.base_backoff_ms` after validation.

use crate::logging::{default_log_level, normalize_level};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_DB_PATH: &str = "CRM_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "CRM_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "CRM_LOG_DIR";

const DEFAULT_DB_FILE_NAME: &str = "crm.sqlite3";

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config JSON: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub database_path: PathBuf,
    pub logging: LoggingConfig,
    pub sync: SyncConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DB_FILE_NAME),
            logging: LoggingConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

/// Rolling file log settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of `trace|debug|info|warn|error`.
    pub level: String,
    /// Absolute directory; file logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    pub max_file_bytes: u64,
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            log_dir: None,
            max_file_bytes: 10 * 1024 * 1024,
            max_files: 5,
        }
    }
}

/// Retry and pacing settings for daily-log reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Pause between sequential single-entry appends.
    pub entry_delay_ms: u64,
    /// Append extra entries with one batch call instead of sequential calls.
    pub use_batch: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff_ms: 500,
            max_backoff_ms: 8_000,
            entry_delay_ms: 300,
            use_batch: true,
        }
    }
}

impl SyncConfig {
    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`,
    /// capped at `max_backoff_ms`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1_u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let millis = self
            .base_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }

    pub fn entry_delay(&self) -> Duration {
        Duration::from_millis(self.entry_delay_ms)
    }

    /// Settings with every pause set to zero.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_backoff_ms: 0,
            max_backoff_ms: 0,
            entry_delay_ms: 0,
            use_batch: true,
        }
    }
}

impl CoreConfig {
    /// Applies `CRM_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(ENV_DB_PATH).filter(|value| !value.trim().is_empty()) {
            self.database_path = PathBuf::from(path.trim());
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|value| !value.trim().is_empty()) {
            self.logging.level = level.trim().to_string();
        }
        if let Some(dir) = lookup(ENV_LOG_DIR).filter(|value| !value.trim().is_empty()) {
            self.logging.log_dir = Some(PathBuf::from(dir.trim()));
        }
    }

    /// Normalizes the log level and checks numeric bounds.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.logging.level = normalize_level(&self.logging.level)
            .map_err(|err| ConfigError::Invalid(err.to_string()))?
            .to_string();
        if let Some(dir) = &self.logging.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "logging.log_dir must be absolute, got `{}`",
                    dir.display()
                )));
            }
        }
        if self.logging.max_files == 0 {
            return Err(ConfigError::Invalid(
                "logging.max_files must be at least 1".to_string(),
            ));
        }
        if self.sync.max_backoff_ms < self.sync.base_backoff_ms {
            return Err(ConfigError::Invalid(format!(
                "sync.max_backoff_ms ({}) is below sync.base_backoff_ms ({})",
                self.sync.max_backoff_ms, self.sync.base_backoff_ms
            )));
        }
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "database_path must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Parses a JSON document, applies overrides and validates.
    pub fn from_json_str(
        text: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(text)?;
        config.apply_overrides(lookup);
        config.validate()?;
        Ok(config)
    }
}

/// Loads configuration from `path` (when given) and the process environment.
pub fn load_config(path: Option<&Path>) -> Result<CoreConfig, ConfigError> {
    let env_lookup = |key: &str| std::env::var(key).ok();
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            CoreConfig::from_json_str(&text, env_lookup)
        }
        None => {
            let mut config = CoreConfig::default();
            config.apply_overrides(env_lookup);
            config.validate()?;
            Ok(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{load_config, ConfigError, CoreConfig, SyncConfig, ENV_DB_PATH, ENV_LOG_LEVEL};
    use std::path::PathBuf;
    use std::time::Duration;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn empty_object_uses_defaults() {
        let config = CoreConfig::from_json_str("{}", no_env).unwrap();
        assert_eq!(config.sync, SyncConfig::default());
        assert_eq!(config.database_path, PathBuf::from("crm.sqlite3"));
    }

    #[test]
    fn partial_sync_section_keeps_other_defaults() {
        let config =
            CoreConfig::from_json_str(r#"{"sync": {"max_retries": 5}}"#, no_env).unwrap();
        assert_eq!(config.sync.max_retries, 5);
        assert_eq!(config.sync.base_backoff_ms, 500);
        assert!(config.sync.use_batch);
    }

    #[test]
    fn env_overrides_file_values() {
        let config = CoreConfig::from_json_str(
            r#"{"database_path": "from-file.db", "logging": {"level": "info"}}"#,
            |key| match key {
                ENV_DB_PATH => Some("/tmp/from-env.db".to_string()),
                ENV_LOG_LEVEL => Some("WARNING".to_string()),
                _ => None,
            },
        )
        .unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/from-env.db"));
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn inverted_backoff_bounds_are_rejected() {
        let err = CoreConfig::from_json_str(
            r#"{"sync": {"base_backoff_ms": 900, "max_backoff_ms": 100}}"#,
            no_env,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn relative_log_dir_is_rejected() {
        let err = CoreConfig::from_json_str(r#"{"logging": {"log_dir": "logs"}}"#, no_env)
            .unwrap_err();
        assert!(err.to_string().contains("absolute"));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let sync = SyncConfig {
            base_backoff_ms: 100,
            max_backoff_ms: 700,
            ..SyncConfig::default()
        };
        assert_eq!(sync.backoff_for(0), Duration::from_millis(100));
        assert_eq!(sync.backoff_for(1), Duration::from_millis(200));
        assert_eq!(sync.backoff_for(2), Duration::from_millis(400));
        assert_eq!(sync.backoff_for(3), Duration::from_millis(700));
        assert_eq!(sync.backoff_for(80), Duration::from_millis(700));
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("absent.json"));
    }
}
