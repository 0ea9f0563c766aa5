//! Configuration management for FieldLens.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration.
///
/// This is loaded from `~/.config/fieldlens/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Salesforce API settings
    pub api: ApiConfig,
    /// Result cache settings
    pub cache: CacheConfig,
    /// Scan behavior settings
    pub scanning: ScanningConfig,
    /// Browser session settings
    pub browser: BrowserConfig,
    /// Logging settings
    pub logging: LoggingConfig,
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

    /// Load configuration from an explicit path, defaults if it is missing.
    pub fn load_from(config_path: &Path) -> ConfigResult<Self> {
        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(config_path)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `FIELDLENS_API_VERSION`: Override the REST API version (e.g. `v61.0`)
    /// - `FIELDLENS_CACHE_TTL_SECS`: Override the result cache TTL
    /// - `FIELDLENS_DETAIL_FETCH_LIMIT`: Override the per-category detail fetch cap
    /// - `FIELDLENS_CDP_URL`: Attach to a Chrome DevTools endpoint
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides in place.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("FIELDLENS_API_VERSION") {
            tracing::debug!("Override api.api_version from env: {}", val);
            self.api.api_version = val;
        }

        if let Ok(val) = std::env::var("FIELDLENS_CACHE_TTL_SECS") {
            if let Ok(secs) = val.parse() {
                self.cache.ttl_secs = secs;
                tracing::debug!("Override cache.ttl_secs from env: {}", secs);
            }
        }

        if let Ok(val) = std::env::var("FIELDLENS_DETAIL_FETCH_LIMIT") {
            if let Ok(limit) = val.parse() {
                self.scanning.detail_fetch_limit = limit;
                tracing::debug!("Override scanning.detail_fetch_limit from env: {}", limit);
            }
        }

        if let Ok(val) = std::env::var("FIELDLENS_CDP_URL") {
            if !val.is_empty() {
                tracing::debug!("Override browser.cdp_url from env");
                self.browser.cdp_url = Some(val);
            }
        }
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.ttl_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if !(1..=500).contains(&self.scanning.detail_fetch_limit) {
            return Err(ConfigError::InvalidValue {
                field: "scanning.detail_fetch_limit".to_string(),
                reason: format!(
                    "must be between 1 and 500, got {}",
                    self.scanning.detail_fetch_limit
                ),
            });
        }
        if !matches!(self.scanning.default_mode.as_str(), "quick" | "deep") {
            return Err(ConfigError::InvalidValue {
                field: "scanning.default_mode".to_string(),
                reason: format!(
                    "expected \"quick\" or \"deep\", got '{}'",
                    self.scanning.default_mode
                ),
            });
        }
        if !self.api.api_version.starts_with('v') {
            return Err(ConfigError::InvalidValue {
                field: "api.api_version".to_string(),
                reason: format!("expected a version like v60.0, got '{}'", self.api.api_version),
            });
        }
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/fieldlens/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "fieldlens", "fieldlens").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/fieldlens`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "fieldlens", "fieldlens").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }

    /// Resolved cache database path: explicit setting or `<data_dir>/cache.db`.
    pub fn cache_database_path(&self) -> ConfigResult<PathBuf> {
        match &self.cache.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("cache.db")),
        }
    }
}

/// Salesforce REST API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// REST API version segment
    pub api_version: String,
    /// Per-request timeout for direct fetches, in seconds
    pub request_timeout_secs: u64,
    /// User agent for direct fetches
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_version: "v60.0".to_string(),
            request_timeout_secs: 60,
            user_agent: concat!("FieldLens/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ApiConfig {
    /// Request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Result cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry lifetime in seconds
    pub ttl_secs: u64,
    /// SQLite file; defaults to `<data_dir>/cache.db`
    pub database_path: Option<PathBuf>,
    /// Keep the cache in process memory only
    pub in_memory: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 600,
            database_path: None,
            in_memory: false,
        }
    }
}

impl CacheConfig {
    /// TTL in milliseconds, as compared against `cachedAt`.
    #[must_use]
    pub fn ttl_ms(&self) -> i64 {
        i64::try_from(self.ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX)
    }
}

/// Scan behavior settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanningConfig {
    /// Cap on per-record detail fetches per best-effort category
    pub detail_fetch_limit: usize,
    /// Mode used when a request does not name one: `quick` or `deep`
    pub default_mode: String,
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            detail_fetch_limit: 80,
            default_mode: "quick".to_string(),
        }
    }
}

/// Browser session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// DevTools websocket/HTTP endpoint of a running Chrome, when attaching over CDP
    pub cdp_url: Option<String>,
    /// Deadline for one delegated tab round trip, in seconds
    pub relay_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            cdp_url: None,
            relay_timeout_secs: 30,
        }
    }
}

impl BrowserConfig {
    /// Relay deadline as a `Duration`.
    #[must_use]
    pub fn relay_timeout(&self) -> Duration {
        Duration::from_secs(self.relay_timeout_secs)
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,fieldlens=debug".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.api.api_version, "v60.0");
        assert_eq!(config.cache.ttl_secs, 600);
        assert_eq!(config.cache.ttl_ms(), 600_000);
        assert_eq!(config.scanning.detail_fetch_limit, 80);
        assert!(config.browser.cdp_url.is_none());
        assert_eq!(config.browser.relay_timeout_secs, 30);
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[api]"));
        assert!(toml_str.contains("[cache]"));
        assert!(toml_str.contains("[scanning]"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_config_load_from_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");

        let mut config = AppConfig::default();
        config.cache.ttl_secs = 120;
        config.browser.cdp_url = Some("http://127.0.0.1:9222".to_string());
        fs::write(
            &config_path,
            toml::to_string_pretty(&config).expect("serialize config"),
        )
        .expect("write config file");

        let loaded = AppConfig::load_from(&config_path).expect("load config");
        assert_eq!(loaded.cache.ttl_secs, 120);
        assert_eq!(
            loaded.browser.cdp_url.as_deref(),
            Some("http://127.0.0.1:9222")
        );
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let tmp = TempDir::new().expect("create temp dir");
        let loaded = AppConfig::load_from(&tmp.path().join("absent.toml")).expect("load");
        assert_eq!(loaded, AppConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[scanning]
detail_fetch_limit = 25

[logging]
json = true
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.scanning.detail_fetch_limit, 25);
        assert!(config.logging.json);
        assert_eq!(config.cache.ttl_secs, 600);
        assert_eq!(config.api.api_version, "v60.0");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.cache.ttl_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scanning.detail_fetch_limit = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.api.api_version = "60.0".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scanning.default_mode = "Deep".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");
        fs::write(&config_path, "[cache]\nttl_secs = 0\n").expect("write config");
        assert!(matches!(
            AppConfig::load_from(&config_path),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
