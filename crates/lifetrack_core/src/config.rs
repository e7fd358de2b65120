//! Startup configuration.
//!
//! Defaults suit tests and headless runs: in-memory database, no file logs.
//! Hosts overlay `LIFETRACK_*` environment variables with [`AppConfig::from_env`].

use crate::logging::default_log_level;
use crate::schema::{StoreName, DB_VERSION};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "LIFETRACK_DB_PATH";
pub const ENV_DB_VERSION: &str = "LIFETRACK_DB_VERSION";
pub const ENV_LOG_LEVEL: &str = "LIFETRACK_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "LIFETRACK_LOG_DIR";
pub const ENV_DEFAULT_MODULE: &str = "LIFETRACK_DEFAULT_MODULE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Database file; `None` opens an in-memory database.
    pub db_path: Option<PathBuf>,
    pub db_version: u32,
    pub log_level: String,
    /// Directory for rolling log files; `None` leaves logging untouched.
    pub log_dir: Option<PathBuf>,
    /// Module loaded right after startup.
    pub default_module: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            db_version: DB_VERSION,
            log_level: default_log_level().to_string(),
            log_dir: None,
            default_module: StoreName::Meal.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        variable: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue {
                variable,
                value,
                expected,
            } => write!(f, "{variable}=`{value}` is invalid; expected {expected}"),
        }
    }
}

impl Error for ConfigError {}

impl AppConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overlaid with values from `lookup`. Blank values are ignored.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(path) = read(ENV_DB_PATH) {
            config.db_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = read(ENV_DB_VERSION) {
            config.db_version = match raw.parse::<u32>() {
                Ok(version) if version > 0 => version,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        variable: ENV_DB_VERSION,
                        value: raw,
                        expected: "a positive integer",
                    })
                }
            };
        }
        if let Some(level) = read(ENV_LOG_LEVEL) {
            let known = ["trace", "debug", "info", "warn", "warning", "error"];
            if !known.contains(&level.to_ascii_lowercase().as_str()) {
                return Err(ConfigError::InvalidValue {
                    variable: ENV_LOG_LEVEL,
                    value: level,
                    expected: "trace|debug|info|warn|error",
                });
            }
            config.log_level = level;
        }
        if let Some(dir) = read(ENV_LOG_DIR) {
            let dir = PathBuf::from(dir);
            if !dir.is_absolute() {
                return Err(ConfigError::InvalidValue {
                    variable: ENV_LOG_DIR,
                    value: dir.display().to_string(),
                    expected: "an absolute path",
                });
            }
            config.log_dir = Some(dir);
        }
        if let Some(module) = read(ENV_DEFAULT_MODULE) {
            config.default_module = module;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ConfigError, ENV_DB_PATH, ENV_DB_VERSION, ENV_DEFAULT_MODULE};
    use crate::schema::DB_VERSION;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_are_in_memory_and_start_on_meal() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.db_path, None);
        assert_eq!(config.db_version, DB_VERSION);
        assert_eq!(config.default_module, "meal");
    }

    #[test]
    fn variables_overlay_defaults_and_blanks_are_ignored() {
        let config = AppConfig::from_lookup(lookup(&[
            (ENV_DB_PATH, " /tmp/lifetrack.sqlite3 "),
            (ENV_DB_VERSION, "3"),
            (ENV_DEFAULT_MODULE, "  "),
        ]))
        .unwrap();
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/lifetrack.sqlite3")));
        assert_eq!(config.db_version, 3);
        assert_eq!(config.default_module, "meal");
    }

    #[test]
    fn invalid_values_are_reported_with_the_variable() {
        let err = AppConfig::from_lookup(lookup(&[(ENV_DB_VERSION, "zero")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { variable, .. } if variable == ENV_DB_VERSION
        ));
        assert!(AppConfig::from_lookup(lookup(&[(ENV_DB_VERSION, "0")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("LIFETRACK_LOG_LEVEL", "loud")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("LIFETRACK_LOG_DIR", "logs")])).is_err());
    }
}
