use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::core::RollingWindow;
use crate::services::{BrokerTables, RetryPolicy};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub api: ApiSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub retry: RetrySettings,
}

/// Hosted data API reachable for plan/load/mapping reads
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    pub endpoint: String,
    pub api_key: String,
    #[serde(default)]
    pub tables: TableSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableSettings {
    #[serde(default = "default_hunt_plans_table")]
    pub hunt_plans: String,
    #[serde(default = "default_load_candidates_table")]
    pub load_candidates: String,
    #[serde(default = "default_vehicle_type_mappings_table")]
    pub vehicle_type_mappings: String,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            hunt_plans: default_hunt_plans_table(),
            load_candidates: default_load_candidates_table(),
            vehicle_type_mappings: default_vehicle_type_mappings_table(),
        }
    }
}

fn default_hunt_plans_table() -> String {
    "hunt_plans".to_string()
}
fn default_load_candidates_table() -> String {
    "load_candidates".to_string()
}
fn default_vehicle_type_mappings_table() -> String {
    "vehicle_type_mappings".to_string()
}

impl From<TableSettings> for BrokerTables {
    fn from(value: TableSettings) -> Self {
        Self {
            hunt_plans: value.hunt_plans,
            load_candidates: value.load_candidates,
            vehicle_type_mappings: value.vehicle_type_mappings,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    /// Rolling freshness window name: "30m", "6h" or "24h".
    #[serde(default = "default_rolling_window")]
    pub rolling_window: String,
    /// Upper bound on candidate loads fetched per aggregation pass.
    #[serde(default = "default_load_limit")]
    pub load_limit: usize,
}

impl MatchingSettings {
    /// Configured window, falling back to 30 minutes on an unknown name.
    pub fn window(&self) -> RollingWindow {
        match RollingWindow::from_config(&self.rolling_window) {
            Some(window) => window,
            None => {
                tracing::warn!(
                    "Unknown rolling window {:?}, defaulting to 30m",
                    self.rolling_window
                );
                RollingWindow::ThirtyMinutes
            }
        }
    }
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            rolling_window: default_rolling_window(),
            load_limit: default_load_limit(),
        }
    }
}

fn default_rolling_window() -> String {
    "30m".to_string()
}
fn default_load_limit() -> usize {
    500
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_cache_capacity")]
    pub vehicle_table_capacity: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub vehicle_table_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            vehicle_table_capacity: default_cache_capacity(),
            vehicle_table_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_cache_capacity() -> u64 {
    1000
}
fn default_cache_ttl_secs() -> u64 {
    1800
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    250
}
fn default_max_delay_ms() -> u64 {
    5000
}

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Environment variables (prefixed with LOADHUNTER__)
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            // Local overrides for development
            .add_source(File::with_name("config/local").required(false))
            // e.g. LOADHUNTER__DATABASE__URL -> database.url
            .add_source(
                Environment::with_prefix("LOADHUNTER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("LOADHUNTER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matching_settings() {
        let matching = MatchingSettings::default();
        assert_eq!(matching.window(), RollingWindow::ThirtyMinutes);
        assert_eq!(matching.load_limit, 500);
    }

    #[test]
    fn test_unknown_window_falls_back() {
        let matching = MatchingSettings {
            rolling_window: "90s".to_string(),
            load_limit: 100,
        };
        assert_eq!(matching.window(), RollingWindow::ThirtyMinutes);
    }

    #[test]
    fn test_default_retry_policy() {
        let policy = RetrySettings::default().policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
        assert_eq!(policy.max_delay, Duration::from_millis(5000));
    }
}
