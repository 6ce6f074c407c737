//! Application configuration loaded from environment variables.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use order_store::StoreConfig;
use thiserror::Error;

/// Error returned when an environment variable holds an unusable value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value {value:?} for {key}: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL URL; the in-memory store is used when unset
/// - `DB_MAX_CONNS` (20), `DB_MIN_CONNS` (2): pool size bounds
/// - `DB_MAX_CONN_LIFETIME_SECS` (1800), `DB_ACQUIRE_TIMEOUT_SECS` (5)
/// - `RUN_MIGRATIONS`: apply migrations on startup (default: `true`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database: Option<StoreConfig>,
    pub run_migrations: bool,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("") | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError {
                    key: "LOG_FORMAT",
                    value: other.to_string(),
                    reason: "expected \"text\" or \"json\"".to_string(),
                });
            }
        };

        let database = match lookup("DATABASE_URL").filter(|url| !url.is_empty()) {
            Some(url) => Some(store_config(&lookup, url)?),
            None => None,
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT", defaults.port)?,
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            database,
            run_migrations: parse_bool(&lookup, "RUN_MIGRATIONS", defaults.run_migrations)?,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database: None,
            run_migrations: true,
        }
    }
}

fn store_config<F>(lookup: &F, url: String) -> Result<StoreConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = StoreConfig::new(url);
    config.max_connections = parse_var(lookup, "DB_MAX_CONNS", config.max_connections)?;
    config.min_connections = parse_var(lookup, "DB_MIN_CONNS", config.min_connections)?;
    config.max_lifetime = Duration::from_secs(parse_var(
        lookup,
        "DB_MAX_CONN_LIFETIME_SECS",
        config.max_lifetime.as_secs(),
    )?);
    config.acquire_timeout = Duration::from_secs(parse_var(
        lookup,
        "DB_ACQUIRE_TIMEOUT_SECS",
        config.acquire_timeout.as_secs(),
    )?);

    if config.max_connections == 0 {
        return Err(ConfigError {
            key: "DB_MAX_CONNS",
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if config.min_connections > config.max_connections {
        return Err(ConfigError {
            key: "DB_MIN_CONNS",
            value: config.min_connections.to_string(),
            reason: format!("exceeds DB_MAX_CONNS ({})", config.max_connections),
        });
    }
    Ok(config)
}

fn parse_var<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|err| ConfigError {
                key,
                reason: err.to_string(),
                value,
            })
        }
    }
}

fn parse_bool<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).as_deref().map(str::trim) {
        None => Ok(default),
        Some("true" | "1" | "yes") => Ok(true),
        Some("false" | "0" | "no") => Ok(false),
        Some(other) => Err(ConfigError {
            key,
            value: other.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
