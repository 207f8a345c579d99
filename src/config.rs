//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::telemetry::Reading;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub hub: HubSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_permissive")]
    pub cors_permissive: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_permissive() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_permissive: default_cors_permissive(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Telemetry behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Mock generator tick interval
    #[serde(default = "default_interval_ms")]
    pub mock_interval_ms: u64,

    /// Per-viewer push interval
    #[serde(default = "default_interval_ms")]
    pub viewer_interval_ms: u64,

    /// Start with synthetic data
    #[serde(default = "default_start_in_mock")]
    pub start_in_mock: bool,

    /// Reading served before any data arrives
    #[serde(default)]
    pub initial_reading: Reading,

    /// Directory served under `/static`
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

fn default_interval_ms() -> u64 {
    3000
}

fn default_start_in_mock() -> bool {
    true
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            mock_interval_ms: default_interval_ms(),
            viewer_interval_ms: default_interval_ms(),
            start_in_mock: default_start_in_mock(),
            initial_reading: Reading::default(),
            static_dir: default_static_dir(),
        }
    }
}

impl MonitorConfig {
    pub fn mock_interval(&self) -> Duration {
        Duration::from_millis(self.mock_interval_ms)
    }

    pub fn viewer_interval(&self) -> Duration {
        Duration::from_millis(self.viewer_interval_ms)
    }
}

/// Pub/sub hub limits
#[derive(Debug, Clone, Deserialize)]
pub struct HubSettings {
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_max_connections() -> usize {
    1000
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        config.apply_overrides(var);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from default locations or environment
    ///
    /// A file that fails to load is skipped; invalid environment overrides
    /// on the fallback path are an error.
    pub fn load_default() -> Result<Self, ConfigError> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("water-monitor").join("config.toml")),
            Some(PathBuf::from("/etc/water-monitor/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.mock_interval_ms == 0 {
            return Err(ConfigError::Invalid("monitor.mock_interval_ms must be > 0".into()));
        }
        if self.monitor.viewer_interval_ms == 0 {
            return Err(ConfigError::Invalid("monitor.viewer_interval_ms must be > 0".into()));
        }
        Ok(())
    }

    /// Apply environment variable overrides to an existing config
    ///
    /// Bare `HOST` / `PORT` are honoured; the prefixed variables win.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = var("WATER_MONITOR_HOST").or_else(|| var("HOST")) {
            self.server.host = host;
        }
        if let Some(port) = var("WATER_MONITOR_PORT").or_else(|| var("PORT")) {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }

        if let Some(ms) = var("WATER_MONITOR_MOCK_INTERVAL_MS") {
            if let Ok(ms) = ms.parse() {
                self.monitor.mock_interval_ms = ms;
            }
        }
        if let Some(ms) = var("WATER_MONITOR_VIEWER_INTERVAL_MS") {
            if let Ok(ms) = ms.parse() {
                self.monitor.viewer_interval_ms = ms;
            }
        }

        if let Some(level) = var("WATER_MONITOR_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("WATER_MONITOR_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Water Monitor Configuration
#
# Environment variables override these settings:
# - WATER_MONITOR_HOST (or HOST)
# - WATER_MONITOR_PORT (or PORT)
# - WATER_MONITOR_MOCK_INTERVAL_MS
# - WATER_MONITOR_VIEWER_INTERVAL_MS
# - WATER_MONITOR_LOG_LEVEL
# - WATER_MONITOR_LOG_FORMAT

[server]
# Server host
host = "0.0.0.0"

# Server port
port = 8000

# Allow any origin (CORS)
cors_permissive = true

[monitor]
# How often the mock generator runs and publishes (ms)
mock_interval_ms = 3000

# How often each viewer receives the latest reading (ms)
viewer_interval_ms = 3000

# Start with synthetic data; switch with {"command":"use_mock_data","value":false}
start_in_mock = true

# Directory served under /static (ws_client.html lives here)
static_dir = "static"

# Reading served before any data arrives
[monitor.initial_reading]
T = 25.0
PH = 7.0
C = 300.0

[hub]
# Maximum concurrent /water-pubsub connections
max_connections = 1000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
