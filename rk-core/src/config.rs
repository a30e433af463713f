//! Application configuration management.
//!
//! Handles loading, saving, and accessing the client configuration: REST and
//! WebSocket endpoints, reconnect policy, push channel settings, the device
//! profile, local storage, and logging. Configuration is persisted as TOML.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::constants;
use crate::error::{RkError, RkResult};
use crate::platform::{DeviceOs, Platform};

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend endpoints.
    #[serde(default)]
    pub server: ServerConfig,

    /// WebSocket reconnect policy.
    #[serde(default)]
    pub socket: SocketConfig,

    /// Push and local notification settings.
    #[serde(default)]
    pub push: PushConfig,

    /// Device profile the notification pipeline targets.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Local key-value storage.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which backend deployment the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

/// Backend endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Deployment the defaults are derived from.
    #[serde(default = "default_environment")]
    pub environment: Environment,

    /// REST API base URL (e.g. "https://example.com/api"). Empty means
    /// derive from `environment` and the device profile.
    #[serde(default)]
    pub api_base_url: String,

    /// WebSocket URL (e.g. "wss://example.com/ws"). Empty means derive.
    #[serde(default)]
    pub ws_url: String,

    /// REST request timeout in milliseconds.
    #[serde(default = "default_api_timeout")]
    pub api_timeout_ms: u64,
}

/// Reconnect policy for the WebSocket transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketConfig {
    /// Reconnect attempts after an unexpected close before giving up.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Linear backoff step: attempt `n` waits `n * reconnect_base_delay_ms`.
    #[serde(default = "default_reconnect_base_delay")]
    pub reconnect_base_delay_ms: u64,
}

/// Push registration and local notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// Whether local notifications are presented at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Notification channel id (Android).
    #[serde(default = "default_channel_id")]
    pub channel_id: String,

    /// Notification channel display name (Android).
    #[serde(default = "default_channel_name")]
    pub channel_name: String,
}

/// Device profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Operating system family.
    #[serde(default = "default_device_os")]
    pub os: DeviceOs,

    /// OS version: Android API level, iOS major version, 0 on desktop.
    #[serde(default)]
    pub os_version: u32,
}

/// Local storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite file. If empty, uses the default location.
    #[serde(default)]
    pub path: String,

    /// Enable WAL (Write-Ahead Logging) mode.
    #[serde(default = "default_true")]
    pub wal_mode: bool,

    /// Maximum number of connections in the pool.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Run integrity check on startup.
    #[serde(default = "default_true")]
    pub integrity_check_on_startup: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for log files. If empty, uses the default location.
    #[serde(default)]
    pub directory: String,

    /// Enable JSON structured logging output.
    #[serde(default)]
    pub json_output: bool,
}

// Default value functions for serde

fn default_environment() -> Environment {
    Environment::Development
}

fn default_api_timeout() -> u64 {
    constants::DEFAULT_API_TIMEOUT_MS
}

fn default_max_reconnect_attempts() -> u32 {
    constants::DEFAULT_MAX_RECONNECT_ATTEMPTS
}

fn default_reconnect_base_delay() -> u64 {
    constants::DEFAULT_RECONNECT_BASE_DELAY_MS
}

fn default_true() -> bool {
    true
}

fn default_channel_id() -> String {
    constants::DEFAULT_CHANNEL_ID.to_string()
}

fn default_channel_name() -> String {
    constants::DEFAULT_CHANNEL_NAME.to_string()
}

fn default_device_os() -> DeviceOs {
    DeviceOs::Desktop
}

fn default_pool_size() -> u32 {
    2
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            api_base_url: String::new(),
            ws_url: String::new(),
            api_timeout_ms: default_api_timeout(),
        }
    }
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_base_delay_ms: default_reconnect_base_delay(),
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channel_id: default_channel_id(),
            channel_name: default_channel_name(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            os: default_device_os(),
            os_version: 0,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            wal_mode: true,
            pool_size: default_pool_size(),
            integrity_check_on_startup: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
            json_output: false,
        }
    }
}

impl ServerConfig {
    /// REST base URL: the configured one, or the environment default.
    pub fn effective_api_base_url(&self, os: DeviceOs) -> String {
        if !self.api_base_url.is_empty() {
            return self.api_base_url.trim_end_matches('/').to_string();
        }
        match self.environment {
            Environment::Development => format!("http://{}:8080/api", os.dev_host()),
            Environment::Production => constants::production::API_BASE_URL.to_string(),
        }
    }

    /// WebSocket URL: the configured one, or the environment default.
    pub fn effective_ws_url(&self, os: DeviceOs) -> String {
        if !self.ws_url.is_empty() {
            return self.ws_url.trim_end_matches('/').to_string();
        }
        match self.environment {
            Environment::Development => format!("ws://{}:8080/ws", os.dev_host()),
            Environment::Production => constants::production::WS_URL.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default config file path.
    pub fn load_default() -> RkResult<Self> {
        let path = Self::default_config_path()?;
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> RkResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific file path.
    pub fn save_to_file(&self, path: &Path) -> RkResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RkError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> RkResult<PathBuf> {
        Ok(Platform::config_dir()?.join("config.toml"))
    }

    /// Get the effective storage path, using the configured path or the default.
    pub fn effective_storage_path(&self) -> RkResult<PathBuf> {
        if self.storage.path.is_empty() {
            Ok(Platform::data_dir()?.join("rentkar.db"))
        } else {
            Ok(PathBuf::from(&self.storage.path))
        }
    }

    /// Get the effective log directory, using the configured path or the default.
    pub fn effective_log_dir(&self) -> RkResult<PathBuf> {
        if self.logging.directory.is_empty() {
            Ok(Platform::data_dir()?.join("logs"))
        } else {
            Ok(PathBuf::from(&self.logging.directory))
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> RkResult<()> {
        if self.socket.reconnect_base_delay_ms == 0 {
            return Err(RkError::Config(
                "socket.reconnect_base_delay_ms must be greater than zero".into(),
            ));
        }
        if self.server.api_timeout_ms == 0 {
            return Err(RkError::Config(
                "server.api_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.push.channel_id.trim().is_empty() {
            return Err(RkError::MissingConfig("push.channel_id".into()));
        }
        Ok(())
    }
}

/// Thread-safe configuration holder for shared access across services.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<AppConfig>>,
}

impl ConfigHandle {
    /// Create a new configuration handle.
    pub fn new(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Read the configuration.
    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, AppConfig> {
        self.inner.read().await
    }

    /// Write/update the configuration.
    pub async fn write(&self) -> tokio::sync::RwLockWriteGuard<'_, AppConfig> {
        self.inner.write().await
    }

    /// Clone out the current configuration.
    pub async fn snapshot(&self) -> AppConfig {
        self.inner.read().await.clone()
    }
}
