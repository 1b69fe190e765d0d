//! Configuration management utilities

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// Error raised while reading a typed environment variable
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    /// The variable is set but its value does not parse
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Application-level configuration shared by the binaries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name
    pub app_name: String,
    /// Environment (development, production, ...)
    pub environment: String,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "tw-stock-bot".to_string(),
            environment: "development".to_string(),
            log_filter: "warn,stock_query=info".to_string(),
        }
    }
}

impl AppConfig {
    /// Read `APP_ENV` and `APP_LOG_FILTER` on top of the defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            environment: std::env::var("APP_ENV").unwrap_or(defaults.environment),
            log_filter: std::env::var("APP_LOG_FILTER").unwrap_or(defaults.log_filter),
            ..defaults
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

/// Read and parse an environment variable.
///
/// Unset or blank variables yield `Ok(None)`.
pub fn env_var<T>(key: &str) -> Result<Option<T>, EnvError>
where
    T: FromStr,
    T::Err: Display,
{
    parse_var(key, std::env::var(key).ok())
}

/// Parse a raw variable value the same way [`env_var`] does
pub fn parse_var<T>(key: &str, raw: Option<String>) -> Result<Option<T>, EnvError>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value = raw.trim();
    if value.is_empty() {
        return Ok(None);
    }

    value.parse::<T>().map(Some).map_err(|e| EnvError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a boolean flag accepting `1/0`, `true/false`, `yes/no`, `on/off`
pub fn parse_flag(key: &str, raw: Option<String>) -> Result<Option<bool>, EnvError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        other => Err(EnvError::Invalid {
            key: key.to_string(),
            value: other.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

/// Read a boolean flag from the environment
pub fn env_flag(key: &str) -> Result<Option<bool>, EnvError> {
    parse_flag(key, std::env::var(key).ok())
}
