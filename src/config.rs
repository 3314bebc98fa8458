//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::live::RefreshScope;
use crate::ranking::TieBreak;
use crate::store::RestStoreConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub live: LiveConfig,

    #[serde(default)]
    pub ranking: RankingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which campaign store backend to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Rest,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(StoreBackend::Sqlite),
            "rest" => Ok(StoreBackend::Rest),
            other => Err(format!("unknown store backend: {}", other)),
        }
    }
}

/// Campaign store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,

    /// Capacity of the sales change broadcast channel
    #[serde(default = "default_change_buffer")]
    pub change_buffer: usize,

    #[serde(default)]
    pub rest: RestConfig,
}

fn default_sqlite_path() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("podium").join("podium.db").to_string_lossy().to_string())
        .unwrap_or_else(|| "./podium_data/podium.db".to_string())
}

fn default_change_buffer() -> usize {
    256
}

impl StoreConfig {
    /// SQLite path with a leading `~` resolved to the home directory
    pub fn resolved_sqlite_path(&self) -> PathBuf {
        match self.sqlite_path.strip_prefix("~/") {
            Some(rest) => match dirs::home_dir() {
                Some(home) => home.join(rest),
                None => PathBuf::from(&self.sqlite_path),
            },
            None => PathBuf::from(&self.sqlite_path),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            sqlite_path: default_sqlite_path(),
            change_buffer: default_change_buffer(),
            rest: RestConfig::default(),
        }
    }
}

/// Hosted backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RestConfig {
    #[serde(default = "default_rest_url")]
    pub url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_rest_timeout")]
    pub timeout_ms: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_rest_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_rest_timeout() -> u64 {
    10_000
}

fn default_poll_interval() -> u64 {
    2_000
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            url: default_rest_url(),
            api_key: None,
            timeout_ms: default_rest_timeout(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl From<&RestConfig> for RestStoreConfig {
    fn from(config: &RestConfig) -> Self {
        Self {
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            timeout_ms: config.timeout_ms,
            poll_interval_ms: config.poll_interval_ms,
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Live display configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LiveConfig {
    /// Which sale changes trigger a recompute of a displayed campaign
    #[serde(default)]
    pub scope: RefreshScope,

    #[serde(default = "default_notification_visible")]
    pub notification_visible_ms: u64,

    #[serde(default = "default_notification_fade")]
    pub notification_fade_ms: u64,
}

fn default_notification_visible() -> u64 {
    4_000
}

fn default_notification_fade() -> u64 {
    300
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            scope: RefreshScope::default(),
            notification_visible_ms: default_notification_visible(),
            notification_fade_ms: default_notification_fade(),
        }
    }
}

/// Ranking configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RankingConfig {
    #[serde(default)]
    pub tie_break: TieBreak,
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

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("podium").join("config.toml")),
            Some(PathBuf::from("/etc/podium/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
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

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        // Store overrides
        if let Ok(backend) = std::env::var("PODIUM_STORE_BACKEND") {
            match backend.parse() {
                Ok(b) => self.store.backend = b,
                Err(e) => tracing::warn!("Ignoring PODIUM_STORE_BACKEND: {}", e),
            }
        }
        if let Ok(path) = std::env::var("PODIUM_DB_PATH") {
            self.store.sqlite_path = path;
        }
        if let Ok(url) = std::env::var("PODIUM_REST_URL") {
            self.store.rest.url = url;
        }
        if let Ok(key) = std::env::var("PODIUM_REST_API_KEY") {
            self.store.rest.api_key = Some(key);
        }

        // API overrides
        if let Ok(host) = std::env::var("PODIUM_API_HOST") {
            self.api.host = host;
        }
        if let Ok(port) = std::env::var("PODIUM_API_PORT") {
            if let Ok(p) = port.parse() {
                self.api.port = p;
            }
        }

        // Live overrides
        if let Ok(scope) = std::env::var("PODIUM_LIVE_SCOPE") {
            match scope.parse() {
                Ok(s) => self.live.scope = s,
                Err(e) => tracing::warn!("Ignoring PODIUM_LIVE_SCOPE: {}", e),
            }
        }

        // Logging overrides
        if let Ok(level) = std::env::var("PODIUM_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("PODIUM_LOG_FORMAT") {
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
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Podium Configuration
#
# Environment variables override these settings:
# - PODIUM_STORE_BACKEND
# - PODIUM_DB_PATH
# - PODIUM_REST_URL
# - PODIUM_REST_API_KEY
# - PODIUM_API_HOST
# - PODIUM_API_PORT
# - PODIUM_LIVE_SCOPE
# - PODIUM_LOG_LEVEL
# - PODIUM_LOG_FORMAT

[store]
# Backend: sqlite (embedded) or rest (hosted PostgREST-style service)
backend = "sqlite"

# SQLite database file
sqlite_path = "~/.local/share/podium/podium.db"

# Buffered sale change notifications per subscriber
change_buffer = 256

[store.rest]
# Base URL of the hosted REST endpoint
url = "http://localhost:3000"

# Project API key (sent as apikey and bearer token)
# api_key = ""

# Request timeout (ms)
timeout_ms = 10000

# Poll interval for sales inserted by other writers (ms, 0 disables)
poll_interval_ms = 2000

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8082

# Allowed CORS origins (empty allows any)
cors_origins = []

# Request timeout in seconds
request_timeout_secs = 30

[live]
# Which sale changes refresh a displayed campaign: campaign or table
scope = "campaign"

# Celebration overlay timing (ms)
notification_visible_ms = 4000
notification_fade_ms = 300

[ranking]
# Order of tied participants: fetch_order or participant_id
tie_break = "fetch_order"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store.change_buffer, 256);
        assert_eq!(config.api.port, 8082);
        assert_eq!(config.live.scope, RefreshScope::Campaign);
        assert_eq!(config.live.notification_visible_ms, 4000);
        assert_eq!(config.live.notification_fade_ms, 300);
        assert_eq!(config.ranking.tie_break, TieBreak::FetchOrder);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_resolved_sqlite_path() {
        let mut store = StoreConfig::default();
        store.sqlite_path = "/var/lib/podium.db".to_string();
        assert_eq!(store.resolved_sqlite_path(), PathBuf::from("/var/lib/podium.db"));

        store.sqlite_path = "~/podium.db".to_string();
        if let Some(home) = dirs::home_dir() {
            assert_eq!(store.resolved_sqlite_path(), home.join("podium.db"));
        }
    }

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.store.rest.poll_interval_ms, 2000);
        assert_eq!(config.api.request_timeout_secs, 30);
        assert_eq!(config.ranking.tie_break, TieBreak::FetchOrder);
    }

    #[test]
    fn test_partial_file() {
        let config = Config::parse(
            r#"
            [store]
            backend = "rest"

            [store.rest]
            url = "https://project.example.co/rest/v1"

            [live]
            scope = "table"

            [ranking]
            tie_break = "participant_id"
            "#,
        )
        .unwrap();

        assert_eq!(config.store.backend, StoreBackend::Rest);
        assert_eq!(config.store.rest.url, "https://project.example.co/rest/v1");
        assert_eq!(config.store.rest.timeout_ms, 10_000);
        assert_eq!(config.live.scope, RefreshScope::Table);
        assert_eq!(config.ranking.tie_break, TieBreak::ParticipantId);
        assert_eq!(config.api.port, 8082);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[api]\nport = 9000").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api.port, 9000);

        let missing = Config::load(&dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_invalid_file() {
        assert!(Config::parse("[api]\nport = \"high\"").is_err());
    }
}
