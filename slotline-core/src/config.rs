use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{ConfigError, SlotlineError};

/// Slot length in minutes; the polling interval may never exceed it.
const MAX_TICK_SECS: u64 = 80 * 60;

/// Runtime environment used by the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    fn from_str(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            _ => Environment::Development,
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

/// Remote mirror settings. Absent when no endpoint is configured.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncEndpoint {
    pub url: String,
    pub key: String,
    pub realtime_url: Option<String>,
}

/// Process configuration for the tracker and its sync driver.
#[derive(Debug, Clone)]
pub struct SlotlineConfig {
    pub environment: Environment,
    pub data_dir: PathBuf,
    pub log_level: String,
    pub tick_interval: Duration,
    pub sync_debounce: Duration,
    pub sync_endpoint: Option<SyncEndpoint>,
    pub sync_row_id: String,
    pub default_goal: f64,
}

impl SlotlineConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env_with_prefix("SLOTLINE_")
    }

    /// Loads configuration from env vars prefixed with the provided value (e.g. `SLOTLINE_`).
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        let key = |suffix: &str| format!("{}{}", prefix, suffix);

        let environment = env::var(key("ENV"))
            .map(|raw| Environment::from_str(&raw))
            .unwrap_or_default();

        let data_dir = match env::var(key("DATA_DIR")) {
            Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir.trim()),
            _ => default_data_dir()?,
        };

        let log_level = env::var(key("LOG")).unwrap_or_else(|_| "info".to_string());

        let tick_secs = parse_number(&key("TICK_SECS"), 60u64)?;
        if tick_secs == 0 || tick_secs > MAX_TICK_SECS {
            return Err(ConfigError::InvalidValue {
                key: key("TICK_SECS"),
                message: format!("must be between 1 and {MAX_TICK_SECS}"),
            });
        }

        let debounce_ms = parse_number(&key("SYNC_DEBOUNCE_MS"), 2000u64)?;
        let default_goal = parse_number(&key("DEFAULT_GOAL"), 35.0f64)?;
        if !default_goal.is_finite() || default_goal < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: key("DEFAULT_GOAL"),
                message: "must be a non-negative number".into(),
            });
        }

        let sync_endpoint = match (env::var(key("SYNC_URL")), env::var(key("SYNC_KEY"))) {
            (Ok(url), Ok(secret)) if !url.trim().is_empty() && !secret.trim().is_empty() => {
                Some(SyncEndpoint {
                    url: url.trim().to_string(),
                    key: secret.trim().to_string(),
                    realtime_url: env::var(key("SYNC_REALTIME_URL"))
                        .ok()
                        .filter(|value| !value.trim().is_empty()),
                })
            }
            _ => None,
        };

        let sync_row_id = env::var(key("SYNC_ROW")).unwrap_or_else(|_| "sole-user".to_string());

        Ok(Self {
            environment,
            data_dir,
            log_level,
            tick_interval: Duration::from_secs(tick_secs),
            sync_debounce: Duration::from_millis(debounce_ms),
            sync_endpoint,
            sync_row_id,
            default_goal,
        })
    }

    /// Directory holding one JSON document per stored key.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("store")
    }

    /// Whether the process is running in production.
    pub fn is_production(&self) -> bool {
        matches!(self.environment, Environment::Production)
    }
}

impl Default for SlotlineConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            data_dir: PathBuf::from(".slotline"),
            log_level: "info".to_string(),
            tick_interval: Duration::from_secs(60),
            sync_debounce: Duration::from_millis(2000),
            sync_endpoint: None,
            sync_row_id: "sole-user".to_string(),
            default_goal: 35.0,
        }
    }
}

fn default_data_dir() -> Result<PathBuf, ConfigError> {
    dirs::data_dir()
        .map(|dir| dir.join("slotline"))
        .ok_or(ConfigError::NoDataDir)
}

fn parse_number<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse::<T>()
                .map_err(|err| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: err.to_string(),
                })
        }
        _ => Ok(default),
    }
}

/// Helper that loads config and converts to the canonical Slotline error type.
pub fn load_config() -> Result<SlotlineConfig, SlotlineError> {
    Ok(SlotlineConfig::from_env()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_defaults_for_unset_prefix() {
        std::env::set_var("CFGTEST_A_DATA_DIR", "/tmp/slotline-test");
        let cfg = SlotlineConfig::from_env_with_prefix("CFGTEST_A_").expect("config should load");
        assert_eq!(cfg.environment, Environment::Development);
        assert_eq!(cfg.tick_interval, Duration::from_secs(60));
        assert_eq!(cfg.sync_row_id, "sole-user");
        assert!(cfg.sync_endpoint.is_none());
        assert_eq!(cfg.store_path(), PathBuf::from("/tmp/slotline-test/store"));
    }

    #[test]
    fn rejects_tick_longer_than_slot() {
        std::env::set_var("CFGTEST_B_DATA_DIR", "/tmp/slotline-test");
        std::env::set_var("CFGTEST_B_TICK_SECS", "9000");
        let err = SlotlineConfig::from_env_with_prefix("CFGTEST_B_").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn sync_endpoint_requires_url_and_key() {
        std::env::set_var("CFGTEST_C_DATA_DIR", "/tmp/slotline-test");
        std::env::set_var("CFGTEST_C_SYNC_URL", "https://bridge.example");
        let cfg = SlotlineConfig::from_env_with_prefix("CFGTEST_C_").expect("config");
        assert!(cfg.sync_endpoint.is_none());

        std::env::set_var("CFGTEST_C_SYNC_KEY", "anon");
        let cfg = SlotlineConfig::from_env_with_prefix("CFGTEST_C_").expect("config");
        let endpoint = cfg.sync_endpoint.expect("endpoint");
        assert_eq!(endpoint.url, "https://bridge.example");
        assert!(endpoint.realtime_url.is_none());
    }
}
