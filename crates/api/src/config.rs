//! Process configuration from environment variables.
//!
//! | variable | default |
//! |---|---|
//! | `USE_PERSISTENT_STORES` | `false` |
//! | `DATABASE_URL` | required when persistent stores are on |
//! | `DATABASE_MAX_CONNECTIONS` | `5` |
//! | `FULFILLMENT_PAGE_SIZE` | `1000` |
//! | `LOG_FORMAT` | `json` |

use std::str::FromStr;

use thiserror::Error;

use fulfillment_core::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use fulfillment_observability::LogFormat;

pub const USE_PERSISTENT_STORES: &str = "USE_PERSISTENT_STORES";
pub const DATABASE_URL: &str = "DATABASE_URL";
pub const DATABASE_MAX_CONNECTIONS: &str = "DATABASE_MAX_CONNECTIONS";
pub const FULFILLMENT_PAGE_SIZE: &str = "FULFILLMENT_PAGE_SIZE";
pub const LOG_FORMAT: &str = "LOG_FORMAT";

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),

    #[error("invalid value '{value}' for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub page_size: u32,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            use_persistent_stores: false,
            database_url: None,
            database_max_connections: DEFAULT_MAX_CONNECTIONS,
            page_size: DEFAULT_PAGE_SIZE,
            log_format: LogFormat::Json,
        }
    }
}

impl AppConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let use_persistent_stores = parse_or(get(USE_PERSISTENT_STORES), USE_PERSISTENT_STORES, false)?;
        let database_url = get(DATABASE_URL);
        if use_persistent_stores && database_url.is_none() {
            return Err(ConfigError::Missing(DATABASE_URL));
        }

        let database_max_connections = parse_or(
            get(DATABASE_MAX_CONNECTIONS),
            DATABASE_MAX_CONNECTIONS,
            defaults.database_max_connections,
        )?;
        if database_max_connections == 0 {
            return Err(invalid(DATABASE_MAX_CONNECTIONS, "0", "must be at least 1"));
        }

        let page_size = parse_or(get(FULFILLMENT_PAGE_SIZE), FULFILLMENT_PAGE_SIZE, defaults.page_size)?;
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(invalid(
                FULFILLMENT_PAGE_SIZE,
                &page_size.to_string(),
                &format!("must be within 1..={MAX_PAGE_SIZE}"),
            ));
        }

        let log_format = parse_or(get(LOG_FORMAT), LOG_FORMAT, defaults.log_format)?;

        Ok(Self {
            use_persistent_stores,
            database_url,
            database_max_connections,
            page_size,
            log_format,
        })
    }
}

fn invalid(var: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_or<T>(raw: Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(var, &value, &e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(load(&[]).unwrap(), AppConfig::default());
    }

    #[test]
    fn persistent_stores_need_a_database_url() {
        let err = load(&[(USE_PERSISTENT_STORES, "true")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing(DATABASE_URL));

        let cfg = load(&[
            (USE_PERSISTENT_STORES, "true"),
            (DATABASE_URL, "postgres://localhost/fulfillment"),
            (DATABASE_MAX_CONNECTIONS, "12"),
        ])
        .unwrap();
        assert!(cfg.use_persistent_stores);
        assert_eq!(cfg.database_max_connections, 12);
    }

    #[test]
    fn malformed_values_are_reported() {
        let err = load(&[(USE_PERSISTENT_STORES, "yes")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: USE_PERSISTENT_STORES, .. }));

        let err = load(&[(FULFILLMENT_PAGE_SIZE, "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: FULFILLMENT_PAGE_SIZE, .. }));

        let err = load(&[(LOG_FORMAT, "xml")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: LOG_FORMAT, .. }));
    }

    #[test]
    fn page_size_and_format_are_read() {
        let cfg = load(&[(FULFILLMENT_PAGE_SIZE, "250"), (LOG_FORMAT, "pretty")]).unwrap();
        assert_eq!(cfg.page_size, 250);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }
}
