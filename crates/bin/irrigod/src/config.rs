//! Daemon configuration.
//!
//! Read from `irrigo.toml` (or the file named by `IRRIGO_CONFIG`); a
//! missing file means all defaults. Environment variables from
//! [`ENV_OVERRIDES`] are applied on top, then the result is validated.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use irrigo_app::diagnostics::{DEFAULT_ERROR_CAPACITY, RetryPolicy};
use irrigo_app::engine::EngineConfig;
use irrigo_domain::entity::EntityRef;
use serde::Deserialize;

const DEFAULT_PATH: &str = "irrigo.toml";

/// Environment variables that replace file values. Applied in order, so
/// `RUST_LOG` wins over `IRRIGO_LOG`.
const ENV_OVERRIDES: [&str; 6] = [
    "IRRIGO_BIND",
    "IRRIGO_DATABASE_URL",
    "IRRIGO_DB_MAX_CONNECTIONS",
    "IRRIGO_RETRY_MAX_ATTEMPTS",
    "IRRIGO_LOG",
    "RUST_LOG",
];

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP listen address.
    pub bind: SocketAddr,
    /// `EnvFilter` directive for the tracing subscriber.
    pub log: String,
    pub database: DatabaseConfig,
    pub hardware: HardwareConfig,
    pub recovery: RecoveryConfig,
    /// Number of recent errors kept for diagnostics.
    pub error_history_capacity: usize,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

/// Simulated switches.
///
/// Entities of the rooms stored at startup are always simulated; this
/// section adds more, e.g. for rooms created later through the API.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HardwareConfig {
    /// Extra switches, starting `off`.
    pub switches: Vec<EntityRef>,
    /// Entities forced `unavailable` at startup.
    pub unavailable: Vec<EntityRef>,
}

/// Backoff of the recovery pass that follows a failed run.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecoveryConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
    /// Wait before re-checking entity availability.
    pub entity_settle_delay_ms: u64,
}

impl Config {
    /// Read the file, apply the environment and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed, an
    /// override does not parse, or the result is inconsistent.
    pub fn load() -> Result<Self, ConfigError> {
        let env = |key: &str| std::env::var(key).ok();
        let path = env("IRRIGO_CONFIG").map_or_else(|| PathBuf::from(DEFAULT_PATH), PathBuf::from);
        let mut config = Self::read(&path)?;
        config.apply_overrides(env)?;
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        for key in ENV_OVERRIDES {
            let Some(value) = lookup(key) else {
                continue;
            };
            match key {
                "IRRIGO_BIND" => self.bind = parse_env(key, &value)?,
                "IRRIGO_DATABASE_URL" => self.database.url = value,
                "IRRIGO_DB_MAX_CONNECTIONS" => {
                    self.database.max_connections = parse_env(key, &value)?;
                }
                "IRRIGO_RETRY_MAX_ATTEMPTS" => self.recovery.max_attempts = parse_env(key, &value)?,
                _ => self.log = value,
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| Err(ConfigError::Validation(reason.to_string()));
        if self.bind.port() == 0 {
            return invalid("bind port must be non-zero");
        }
        if self.database.max_connections == 0 {
            return invalid("database.max_connections must be non-zero");
        }
        if self.error_history_capacity == 0 {
            return invalid("error_history_capacity must be non-zero");
        }
        if self.recovery.base_delay_ms > self.recovery.max_delay_ms {
            return invalid("recovery.base_delay_ms must not exceed recovery.max_delay_ms");
        }
        Ok(())
    }

    /// Options for the `SQLite` pool.
    #[must_use]
    pub fn database(&self) -> irrigo_adapter_storage_sqlite_sqlx::Config {
        irrigo_adapter_storage_sqlite_sqlx::Config {
            database_url: self.database.url.clone(),
            max_connections: self.database.max_connections,
            busy_timeout: Duration::from_millis(self.database.busy_timeout_ms),
        }
    }

    /// Engine tunables in the form the engine expects.
    #[must_use]
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            retry: RetryPolicy {
                base_delay: Duration::from_millis(self.recovery.base_delay_ms),
                max_delay: Duration::from_millis(self.recovery.max_delay_ms),
                max_attempts: self.recovery.max_attempts,
            },
            entity_settle_delay: Duration::from_millis(self.recovery.entity_settle_delay_ms),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Env {
        key,
        value: value.to_string(),
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
            log: "irrigod=info,irrigo_app=info,irrigo_adapter_virtual=info,tower_http=debug"
                .to_string(),
            database: DatabaseConfig::default(),
            hardware: HardwareConfig::default(),
            recovery: RecoveryConfig::default(),
            error_history_capacity: DEFAULT_ERROR_CAPACITY,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let pool = irrigo_adapter_storage_sqlite_sqlx::Config::new("sqlite:irrigo.db?mode=rwc");
        Self {
            url: pool.database_url,
            max_connections: pool.max_connections,
            busy_timeout_ms: millis(pool.busy_timeout),
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            base_delay_ms: millis(engine.retry.base_delay),
            max_delay_ms: millis(engine.retry.max_delay),
            max_attempts: engine.retry.max_attempts,
            entity_settle_delay_ms: millis(engine.entity_settle_delay),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    #[error("environment variable {key} has an invalid value {value:?}")]
    Env { key: &'static str, value: String },
    #[error("invalid configuration: {0}")]
    Validation(String),
}
