//! Configuration management for Scout.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use crate::types::{AccountConfig, ScanLocation, VisitOrder};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration.
///
/// This is loaded from `~/.config/scout/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// General application settings
    pub general: GeneralConfig,
    /// Scan cycle and worker settings
    pub scanning: ScanningConfig,
    /// Remote API client settings
    pub rpc: RpcConfig,
    /// Storage settings
    pub storage: StorageConfig,
    /// Scanning accounts
    pub accounts: Vec<AccountConfig>,
    /// Locations covered on every cycle
    pub locations: Vec<ScanLocation>,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, falling back to defaults if not found.
    pub fn load_from(config_path: &Path) -> ConfigResult<Self> {
        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `SCOUT_DATABASE_PATH`: Override the SQLite database path
    /// - `SCOUT_CELL_RADIUS_M`: Override the coverage cell radius
    /// - `SCOUT_LOG`: Override the log filter
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `SCOUT_*` environment overrides in place.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SCOUT_DATABASE_PATH") {
            tracing::debug!("Override storage.database_path from env: {}", val);
            self.storage.database_path = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("SCOUT_CELL_RADIUS_M") {
            if let Ok(radius) = val.parse() {
                self.scanning.cell_radius_m = radius;
                tracing::debug!("Override scanning.cell_radius_m from env: {}", radius);
            }
        }

        if let Ok(val) = std::env::var("SCOUT_LOG") {
            tracing::debug!("Override general.log_filter from env: {}", val);
            self.general.log_filter = val;
        }
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path.
    pub fn save_to(&self, config_path: &Path) -> ConfigResult<()> {
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Check value ranges that would otherwise fail deep inside a scan.
    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |field: &str, reason: &str| ConfigError::InvalidValue {
            field: field.to_string(),
            reason: reason.to_string(),
        };

        if !(self.scanning.cell_radius_m.is_finite() && self.scanning.cell_radius_m > 0.0) {
            return Err(invalid("scanning.cell_radius_m", "must be positive"));
        }
        if self.scanning.accounts_per_worker == 0 {
            return Err(invalid("scanning.accounts_per_worker", "must be at least 1"));
        }
        if self.scanning.max_item_attempts == 0 {
            return Err(invalid("scanning.max_item_attempts", "must be at least 1"));
        }
        if self.rpc.retry_budget == 0 {
            return Err(invalid("rpc.retry_budget", "must be at least 1"));
        }
        if self.storage.batch_size == 0 {
            return Err(invalid("storage.batch_size", "must be at least 1"));
        }
        for location in &self.locations {
            if !(location.radius_m.is_finite() && location.radius_m > 0.0) {
                return Err(invalid(
                    &format!("locations.{}.radius_m", location.name),
                    "must be positive",
                ));
            }
        }
        for account in &self.accounts {
            account
                .validate()
                .map_err(|e| invalid("accounts", &e.to_string()))?;
        }
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/scout/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "scout", "scout").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/scout`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "scout", "scout").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }

    /// Database path, defaulting to `<data dir>/scout.db`.
    pub fn database_path(&self) -> ConfigResult<PathBuf> {
        match &self.storage.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("scout.db")),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_filter: "info,scout=debug".to_string(),
        }
    }
}

/// Scan cycle and worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanningConfig {
    /// Radius of one hex cell in meters
    pub cell_radius_m: f64,
    /// Seconds an account rests between calls
    pub throttle_secs: u64,
    /// Seconds an account rests after a failed call
    pub failure_delay_secs: u64,
    /// Seconds an account is sidelined after an authentication failure
    pub sideline_secs: u64,
    /// Accounts further out than this are treated as sidelined
    pub scheduler_lookahead_secs: u64,
    /// Poll interval while idle
    pub idle_poll_secs: u64,
    /// Poll interval for the restart signal while waiting for a drain
    pub drain_check_secs: u64,
    /// Lower bound on the duration of one full scan cycle
    pub min_seconds_per_scan: u64,
    /// Accounts served by one worker
    pub accounts_per_worker: usize,
    /// Lower bound on the worker count
    pub min_workers: usize,
    /// Failures before a work item is escalated
    pub max_item_attempts: u32,
    /// Order in which coverage points are visited
    pub visit_order: VisitOrder,
}

impl ScanningConfig {
    /// Normal throttle window.
    #[must_use]
    pub fn throttle(&self) -> Duration {
        Duration::from_secs(self.throttle_secs)
    }

    /// Delay applied after a failed call.
    #[must_use]
    pub fn failure_delay(&self) -> Duration {
        Duration::from_secs(self.failure_delay_secs)
    }

    /// Cooldown applied after an authentication failure.
    #[must_use]
    pub fn sideline(&self) -> Duration {
        Duration::from_secs(self.sideline_secs)
    }

    /// Scheduler lookahead window.
    #[must_use]
    pub fn scheduler_lookahead(&self) -> Duration {
        Duration::from_secs(self.scheduler_lookahead_secs)
    }

    /// Idle poll interval.
    #[must_use]
    pub fn idle_poll(&self) -> Duration {
        Duration::from_secs(self.idle_poll_secs)
    }

    /// Restart check interval while draining.
    #[must_use]
    pub fn drain_check(&self) -> Duration {
        Duration::from_secs(self.drain_check_secs)
    }

    /// Minimum full scan duration.
    #[must_use]
    pub fn min_scan_duration(&self) -> Duration {
        Duration::from_secs(self.min_seconds_per_scan)
    }
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            cell_radius_m: 70.0,
            throttle_secs: 10,
            failure_delay_secs: 10,
            sideline_secs: 300,
            scheduler_lookahead_secs: 30,
            idle_poll_secs: 5,
            drain_check_secs: 2,
            min_seconds_per_scan: 0,
            accounts_per_worker: 23,
            min_workers: 3,
            max_item_attempts: 3,
            visit_order: VisitOrder::default(),
        }
    }
}

/// Remote API client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Endpoint used before the first redirect
    pub initial_endpoint: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// User agent string
    pub user_agent: String,
    /// Attempts allowed for generic failures per call
    pub retry_budget: u32,
    /// Identity provider login URL
    pub identity_url: String,
}

impl RpcConfig {
    /// Request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            initial_endpoint: "https://pgorelease.nianticlabs.com/plfe/rpc".to_string(),
            timeout_secs: 10,
            user_agent: "Niantic App".to_string(),
            retry_budget: 5,
            identity_url: "http://localhost:8510/login".to_string(),
        }
    }
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path; `None` uses the data directory
    pub database_path: Option<PathBuf>,
    /// Rows per upsert transaction
    pub batch_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            batch_size: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AuthProvider;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.general.log_filter, "info,scout=debug");
        assert!((config.scanning.cell_radius_m - 70.0).abs() < f64::EPSILON);
        assert_eq!(config.scanning.throttle(), Duration::from_secs(10));
        assert_eq!(config.scanning.sideline(), Duration::from_secs(300));
        assert_eq!(config.scanning.accounts_per_worker, 23);
        assert_eq!(config.scanning.max_item_attempts, 3);
        assert_eq!(config.rpc.retry_budget, 5);
        assert_eq!(config.storage.batch_size, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let mut config = AppConfig::default();
        config.scanning.visit_order = VisitOrder::Shuffled { seed: 7 };
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[scanning]"));
        assert!(toml_str.contains("[rpc]"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(parsed.general.log_filter, config.general.log_filter);
        assert_eq!(parsed.scanning.visit_order, VisitOrder::Shuffled { seed: 7 });
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.scanning.throttle_secs = 20;
        config
            .accounts
            .push(AccountConfig::new("ash", "pikachu", AuthProvider::Google));
        config
            .locations
            .push(ScanLocation::from_coordinates(48.0, 11.0, 500.0));

        config.save_to(&config_path).expect("save config");
        let loaded = AppConfig::load_from(&config_path).expect("load config");

        assert_eq!(loaded.scanning.throttle_secs, 20);
        assert_eq!(loaded.accounts, config.accounts);
        assert_eq!(loaded.locations, config.locations);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let tmp = TempDir::new().expect("create temp dir");
        let loaded =
            AppConfig::load_from(&tmp.path().join("absent.toml")).expect("load defaults");
        assert!(loaded.accounts.is_empty());
        assert_eq!(loaded.rpc.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("SCOUT_DATABASE_PATH", "/tmp/scout-test.db");
        std::env::set_var("SCOUT_CELL_RADIUS_M", "100");
        std::env::set_var("SCOUT_LOG", "warn");

        let mut config = AppConfig::default();
        config.apply_env_overrides();

        std::env::remove_var("SCOUT_DATABASE_PATH");
        std::env::remove_var("SCOUT_CELL_RADIUS_M");
        std::env::remove_var("SCOUT_LOG");

        assert_eq!(
            config.database_path().expect("database path"),
            PathBuf::from("/tmp/scout-test.db")
        );
        assert!((config.scanning.cell_radius_m - 100.0).abs() < f64::EPSILON);
        assert_eq!(config.general.log_filter, "warn");
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[scanning]
throttle_secs = 15

[[accounts]]
username = "misty"
password = "starmie"

[[locations]]
name = "home"
latitude = 48.0
longitude = 11.0
radius_m = 250.0
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.scanning.throttle_secs, 15);
        assert_eq!(config.accounts[0].provider, AuthProvider::Ptc);
        assert_eq!(config.locations[0].name, "home");
        assert!(config.locations[0].altitude.abs() < f64::EPSILON);
        // These should be defaults
        assert_eq!(config.scanning.min_workers, 3);
        assert_eq!(config.scanning.visit_order, VisitOrder::RingOrder);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.scanning.cell_radius_m = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config
            .locations
            .push(ScanLocation::from_coordinates(48.0, 11.0, -5.0));
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config
            .accounts
            .push(AccountConfig::new("", "secret", AuthProvider::Ptc));
        assert!(config.validate().is_err());
    }
}
