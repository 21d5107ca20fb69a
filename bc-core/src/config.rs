//! Application configuration management.
//!
//! Handles loading, saving, and accessing application configuration including
//! the backend address, stored credentials, push channel tuning and the
//! fallback poll. Configuration is persisted as TOML on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{BcError, BcResult};
use crate::platform::Platform;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend connection settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Stored credentials.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Push channel settings.
    #[serde(default)]
    pub channel: ChannelConfig,

    /// Notification feed and fallback poll settings.
    #[serde(default)]
    pub feed: FeedConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Backend base address (e.g., "https://api.example.com").
    #[serde(default)]
    pub address: String,

    /// Custom HTTP headers as key-value pairs.
    #[serde(default)]
    pub custom_headers: std::collections::HashMap<String, String>,

    /// API request timeout in milliseconds.
    #[serde(default = "default_api_timeout")]
    pub api_timeout_ms: u64,

    /// Whether to accept self-signed TLS certificates from the server.
    #[serde(default)]
    pub accept_self_signed_certs: bool,
}

/// Stored credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Username used for the last login.
    #[serde(default)]
    pub username: String,

    /// Bearer token obtained from the backend. Empty when logged out.
    #[serde(default)]
    pub token: String,
}

/// Push channel tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel path appended to the server address.
    #[serde(default = "default_channel_path")]
    pub path: String,

    /// First reconnect wait in milliseconds.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Backoff ceiling in milliseconds.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Connection attempts after which reconnecting stops. Unbounded if absent.
    #[serde(default)]
    pub max_retries: Option<u32>,

    /// Keepalive period in milliseconds. Zero disables heartbeats.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,

    /// Random jitter applied to reconnect waits, 0.0 to 1.0.
    #[serde(default)]
    pub jitter_factor: f64,
}

/// Notification feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Period of the fallback poll in seconds (at least one).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Number of notifications fetched per poll.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for log files. If empty, uses default location.
    #[serde(default)]
    pub directory: String,

    /// Enable JSON structured logging output.
    #[serde(default)]
    pub json_output: bool,
}

// Default value functions for serde

fn default_api_timeout() -> u64 {
    constants::DEFAULT_API_TIMEOUT_MS
}

fn default_channel_path() -> String {
    constants::DEFAULT_CHANNEL_PATH.to_string()
}

fn default_initial_delay() -> u64 {
    constants::DEFAULT_INITIAL_DELAY_MS
}

fn default_max_delay() -> u64 {
    constants::DEFAULT_MAX_DELAY_MS
}

fn default_heartbeat_interval() -> u64 {
    constants::DEFAULT_HEARTBEAT_INTERVAL_MS
}

fn default_poll_interval() -> u64 {
    constants::DEFAULT_POLL_INTERVAL_SECS
}

fn default_page_size() -> u32 {
    constants::DEFAULT_FEED_PAGE_SIZE
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            custom_headers: std::collections::HashMap::new(),
            api_timeout_ms: default_api_timeout(),
            accept_self_signed_certs: false,
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            path: default_channel_path(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            max_retries: None,
            heartbeat_interval_ms: default_heartbeat_interval(),
            jitter_factor: 0.0,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            page_size: default_page_size(),
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

impl AppConfig {
    /// Load configuration from the default config file path.
    pub fn load_default() -> BcResult<Self> {
        let path = Self::default_config_path()?;
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> BcResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: AppConfig = toml::from_str(&contents)?;
        config.server.address = Self::sanitize_server_address(&config.server.address);
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific file path.
    pub fn save_to_file(&self, path: &Path) -> BcResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| BcError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> BcResult<PathBuf> {
        Ok(Platform::config_dir()?.join("config.toml"))
    }

    /// Get the effective log directory, using the configured path or the default.
    pub fn effective_log_dir(&self) -> BcResult<PathBuf> {
        if self.logging.directory.is_empty() {
            Ok(Platform::data_dir()?.join("logs"))
        } else {
            Ok(PathBuf::from(&self.logging.directory))
        }
    }

    /// Check whether the backend address is configured.
    pub fn is_server_configured(&self) -> bool {
        !self.server.address.is_empty()
    }

    /// Check whether a credential is stored.
    pub fn is_logged_in(&self) -> bool {
        !self.auth.token.is_empty()
    }

    /// Reject values that would make the channel misbehave.
    pub fn validate(&self) -> BcResult<()> {
        if self.channel.initial_delay_ms == 0 {
            return Err(BcError::Config("channel.initial_delay_ms must be positive".into()));
        }
        if self.channel.max_delay_ms < self.channel.initial_delay_ms {
            return Err(BcError::Config(
                "channel.max_delay_ms must not be below channel.initial_delay_ms".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.channel.jitter_factor) {
            return Err(BcError::Config("channel.jitter_factor must be within 0.0..=1.0".into()));
        }
        Ok(())
    }

    /// Sanitize and normalize a server address.
    ///
    /// Trims whitespace and quotes, adds `https://` when no scheme is given
    /// (plain `http://` only for localhost-style hosts), and strips trailing
    /// slashes.
    pub fn sanitize_server_address(address: &str) -> String {
        let trimmed = address.trim().trim_matches('"').trim();
        if trimmed.is_empty() {
            return String::new();
        }

        let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else if trimmed.starts_with("localhost")
            || trimmed.starts_with("127.")
            || trimmed.starts_with("10.")
            || trimmed.starts_with("192.168.")
        {
            format!("http://{trimmed}")
        } else {
            format!("https://{trimmed}")
        };

        with_scheme.trim_end_matches('/').to_string()
    }
}

/// Thread-safe configuration holder for shared access across services.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<AppConfig>>,
    path: Option<PathBuf>,
}

impl ConfigHandle {
    /// Create a new configuration handle that saves to the default path.
    pub fn new(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
            path: None,
        }
    }

    /// Create a handle bound to an explicit config file.
    pub fn with_path(config: AppConfig, path: PathBuf) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
            path: Some(path),
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

    /// Path the configuration is saved to.
    pub fn path(&self) -> BcResult<PathBuf> {
        match &self.path {
            Some(p) => Ok(p.clone()),
            None => AppConfig::default_config_path(),
        }
    }

    /// Save the current configuration to disk.
    pub async fn save(&self) -> BcResult<()> {
        let path = self.path()?;
        let config = self.inner.read().await;
        config.save_to_file(&path)
    }
}
