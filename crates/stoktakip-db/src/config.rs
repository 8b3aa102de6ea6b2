//! Process configuration.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//!
//! | Variable                             | Default          |
//! |--------------------------------------|------------------|
//! | `STOKTAKIP_DB_PATH`                  | `./stoktakip.db` |
//! | `STOKTAKIP_DB_MAX_CONNECTIONS`       | `5`              |
//! | `STOKTAKIP_DB_CONNECT_TIMEOUT_SECS`  | `30`             |
//! | `STOKTAKIP_DB_BUSY_TIMEOUT_SECS`     | `10`             |
//! | `STOKTAKIP_RUN_MIGRATIONS`           | `true`           |

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::pool::DbConfig;

/// Default database file when `STOKTAKIP_DB_PATH` is unset.
pub const DEFAULT_DB_PATH: &str = "./stoktakip.db";

/// Back office process configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite database file
    pub database_path: String,

    /// Pool size
    pub max_connections: u32,

    /// Seconds to wait for a pooled connection
    pub connect_timeout_secs: u64,

    /// Seconds a writer waits for another writer
    pub busy_timeout_secs: u64,

    /// Apply embedded migrations on connect
    pub run_migrations: bool,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup` (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = AppConfig {
            database_path: lookup("STOKTAKIP_DB_PATH")
                .unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),

            max_connections: parsed(&lookup, "STOKTAKIP_DB_MAX_CONNECTIONS", 5)?,

            connect_timeout_secs: parsed(&lookup, "STOKTAKIP_DB_CONNECT_TIMEOUT_SECS", 30)?,

            busy_timeout_secs: parsed(&lookup, "STOKTAKIP_DB_BUSY_TIMEOUT_SECS", 10)?,

            run_migrations: parsed(&lookup, "STOKTAKIP_RUN_MIGRATIONS", true)?,
        };

        if config.database_path.trim().is_empty() {
            return Err(ConfigError::MissingRequired("STOKTAKIP_DB_PATH".to_string()));
        }
        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "STOKTAKIP_DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(config)
    }

    /// Pool settings for [`crate::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path)
            .max_connections(self.max_connections)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .busy_timeout(Duration::from_secs(self.busy_timeout_secs))
            .run_migrations(self.run_migrations)
    }
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from(&[]).unwrap();
        assert_eq!(config.database_path, DEFAULT_DB_PATH);
        assert_eq!(config.max_connections, 5);
        assert!(config.run_migrations);

        let db = config.db_config();
        assert_eq!(db.connect_timeout, Duration::from_secs(30));
        assert_eq!(db.busy_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let config = from(&[
            ("STOKTAKIP_DB_PATH", "/var/lib/stoktakip/magaza.db"),
            ("STOKTAKIP_DB_MAX_CONNECTIONS", "8"),
            ("STOKTAKIP_RUN_MIGRATIONS", "false"),
        ])
        .unwrap();
        assert_eq!(config.max_connections, 8);
        assert!(!config.run_migrations);
        assert_eq!(
            config.db_config().database_path.to_str(),
            Some("/var/lib/stoktakip/magaza.db")
        );
    }

    #[test]
    fn test_invalid_values() {
        let err = from(&[("STOKTAKIP_DB_MAX_CONNECTIONS", "many")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref key) if key == "STOKTAKIP_DB_MAX_CONNECTIONS"));

        let err = from(&[("STOKTAKIP_DB_MAX_CONNECTIONS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));

        let err = from(&[("STOKTAKIP_DB_PATH", "  ")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired(_)));
    }
}
