//! # Costify Configuration
//!
//! Configuration for the database, the cascade, the event gateway and logging.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     COSTIFY_DB_PATH=/var/lib/costify/costify.db                        │
//! │     COSTIFY_CASCADE_CONCURRENCY=16                                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/costify/costify.toml (Linux)                             │
//! │     ~/Library/Application Support/com.costify.costify/costify.toml     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # costify.toml
//! [database]
//! path = "./costify.db"
//! max_connections = 9
//!
//! [cascade]
//! max_concurrent_recipes = 8
//! max_conflict_retries = 3
//!
//! [gateway]
//! channel_capacity = 256
//! relay_interval_secs = 30
//! relay_grace_secs = 10
//! claim_lease_secs = 300
//! relay_batch_size = 100
//! max_delivery_attempts = 5
//! retention_days = 30
//!
//! [logging]
//! filter = "info,costify=debug,sqlx=warn"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. `:memory:` opens a throwaway database.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "costify", "costify")
        .map(|dirs| dirs.data_dir().join("costify.db"))
        .unwrap_or_else(|| PathBuf::from("./costify.db"))
}

fn default_max_connections() -> u32 {
    9
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Cascade Settings
// =============================================================================

/// How the cascade fans out over affected recipes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeSettings {
    /// Recipes recomputed at the same time for one event.
    #[serde(default = "default_max_concurrent_recipes")]
    pub max_concurrent_recipes: usize,

    /// Re-reads allowed after a version conflict before the recipe is
    /// reported as failed.
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
}

fn default_max_concurrent_recipes() -> usize {
    8
}

fn default_max_conflict_retries() -> u32 {
    3
}

impl Default for CascadeSettings {
    fn default() -> Self {
        CascadeSettings {
            max_concurrent_recipes: default_max_concurrent_recipes(),
            max_conflict_retries: default_max_conflict_retries(),
        }
    }
}

// =============================================================================
// Gateway Settings
// =============================================================================

/// Post-commit delivery and outbox relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    /// Released events buffered for the dispatcher. Overflow waits for the relay.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Interval between relay sweeps (seconds).
    #[serde(default = "default_relay_interval")]
    pub relay_interval_secs: u64,

    /// Age an undispatched event must reach before the relay takes it (seconds).
    #[serde(default = "default_relay_grace")]
    pub relay_grace_secs: u64,

    /// A claim that has not completed after this long is treated as
    /// abandoned (crashed dispatcher) and can be claimed again (seconds).
    #[serde(default = "default_claim_lease")]
    pub claim_lease_secs: u64,

    /// Outbox rows claimed per sweep.
    #[serde(default = "default_relay_batch_size")]
    pub relay_batch_size: u32,

    /// Claims allowed for one event before it is left failed.
    #[serde(default = "default_max_delivery_attempts")]
    pub max_delivery_attempts: i64,

    /// Dispatched events older than this are pruned (days).
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

fn default_channel_capacity() -> usize {
    256
}
fn default_relay_interval() -> u64 {
    30
}
fn default_relay_grace() -> u64 {
    10
}
fn default_claim_lease() -> u64 {
    300
}
fn default_relay_batch_size() -> u32 {
    100
}
fn default_max_delivery_attempts() -> i64 {
    5
}
fn default_retention_days() -> i64 {
    30
}

impl Default for GatewaySettings {
    fn default() -> Self {
        GatewaySettings {
            channel_capacity: default_channel_capacity(),
            relay_interval_secs: default_relay_interval(),
            relay_grace_secs: default_relay_grace(),
            claim_lease_secs: default_claim_lease(),
            relay_batch_size: default_relay_batch_size(),
            max_delivery_attempts: default_max_delivery_attempts(),
            retention_days: default_retention_days(),
        }
    }
}

impl GatewaySettings {
    pub fn relay_interval(&self) -> Duration {
        Duration::from_secs(self.relay_interval_secs)
    }

    pub fn relay_grace(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.relay_grace_secs as i64)
    }

    pub fn claim_lease(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.claim_lease_secs as i64)
    }
}

// =============================================================================
// Logging Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directives, used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "info,costify=debug,sqlx=warn".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_log_filter(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete configuration. Every field has a default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostifyConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub cascade: CascadeSettings,

    #[serde(default)]
    pub gateway: GatewaySettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl CostifyConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (costify.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::SaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;

        info!(?path, "Config saved");
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.cascade.max_concurrent_recipes == 0 {
            return Err(ConfigError::Invalid(
                "cascade.max_concurrent_recipes must be greater than 0".into(),
            ));
        }
        if self.gateway.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "gateway.channel_capacity must be greater than 0".into(),
            ));
        }
        if self.gateway.relay_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "gateway.relay_interval_secs must be greater than 0".into(),
            ));
        }
        if self.gateway.claim_lease_secs == 0 {
            return Err(ConfigError::Invalid(
                "gateway.claim_lease_secs must be greater than 0".into(),
            ));
        }
        if self.gateway.relay_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "gateway.relay_batch_size must be greater than 0".into(),
            ));
        }
        if self.gateway.max_delivery_attempts < 1 {
            return Err(ConfigError::Invalid(
                "gateway.max_delivery_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Applies `COSTIFY_*` overrides read through `lookup`.
    ///
    /// Unparseable numbers are logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("COSTIFY_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(filter) = lookup("COSTIFY_LOG") {
            self.logging.filter = filter;
        }

        if let Some(value) = lookup("COSTIFY_CASCADE_CONCURRENCY") {
            match value.parse() {
                Ok(n) => self.cascade.max_concurrent_recipes = n,
                Err(_) => warn!(value = %value, "Invalid COSTIFY_CASCADE_CONCURRENCY"),
            }
        }

        if let Some(value) = lookup("COSTIFY_CONFLICT_RETRIES") {
            match value.parse() {
                Ok(n) => self.cascade.max_conflict_retries = n,
                Err(_) => warn!(value = %value, "Invalid COSTIFY_CONFLICT_RETRIES"),
            }
        }

        if let Some(value) = lookup("COSTIFY_RELAY_INTERVAL_SECS") {
            match value.parse() {
                Ok(n) => self.gateway.relay_interval_secs = n,
                Err(_) => warn!(value = %value, "Invalid COSTIFY_RELAY_INTERVAL_SECS"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "costify", "costify")
            .map(|dirs| dirs.config_dir().join("costify.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        let config = CostifyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cascade.max_concurrent_recipes, 8);
        assert_eq!(config.gateway.max_delivery_attempts, 5);
        assert_eq!(config.gateway.claim_lease(), chrono::Duration::minutes(5));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: CostifyConfig = toml::from_str(
            r#"
            [database]
            path = "/tmp/costify.db"

            [cascade]
            max_conflict_retries = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/tmp/costify.db"));
        assert_eq!(config.database.max_connections, 9);
        assert_eq!(config.cascade.max_conflict_retries, 7);
        assert_eq!(config.cascade.max_concurrent_recipes, 8);
        assert_eq!(config.gateway.relay_interval_secs, 30);
    }

    #[test]
    fn test_overrides_win_and_bad_numbers_are_ignored() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("COSTIFY_DB_PATH", ":memory:"),
            ("COSTIFY_CASCADE_CONCURRENCY", "16"),
            ("COSTIFY_CONFLICT_RETRIES", "lots"),
        ]);

        let mut config = CostifyConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from(":memory:"));
        assert_eq!(config.cascade.max_concurrent_recipes, 16);
        assert_eq!(config.cascade.max_conflict_retries, 3);
    }

    #[test]
    fn test_validation_rejects_zero_concurrency() {
        let mut config = CostifyConfig::default();
        config.cascade.max_concurrent_recipes = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&CostifyConfig::default()).unwrap();
        assert!(toml_str.contains("[database]"));
        assert!(toml_str.contains("[gateway]"));
    }
}
