//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::display::OverlayTiming;
use crate::live::RefreshScope;
use crate::ranking::{RankingAggregator, TieBreak};
use crate::store::CampaignStore;
use crate::websocket::{ConnectionHub, HubConfig};

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Campaign store (SQLite or hosted)
    pub store: Arc<dyn CampaignStore>,
    /// Ranking aggregator over the same store
    pub aggregator: Arc<RankingAggregator>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
    /// WebSocket connection hub for live displays
    pub ws_hub: Arc<ConnectionHub>,
}

impl AppState {
    pub fn new(store: Arc<dyn CampaignStore>, config: ApiConfig) -> Self {
        Self::with_ws_config(store, config, HubConfig::default())
    }

    /// Create AppState with custom WebSocket hub configuration
    pub fn with_ws_config(
        store: Arc<dyn CampaignStore>,
        config: ApiConfig,
        hub_config: HubConfig,
    ) -> Self {
        let aggregator = Arc::new(RankingAggregator::new(
            Arc::clone(&store),
            config.tie_break,
        ));
        Self {
            store,
            aggregator,
            config: Arc::new(config),
            start_time: Instant::now(),
            ws_hub: Arc::new(ConnectionHub::new(hub_config)),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Get WebSocket connection count
    pub async fn ws_connection_count(&self) -> usize {
        self.ws_hub.connection_count().await
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Allowed CORS origins; empty allows any
    pub cors_origins: Vec<String>,
    /// Request timeout
    pub request_timeout: Duration,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// Which sale changes refresh a live display
    pub scope: RefreshScope,
    /// Celebration overlay timing
    pub overlay: OverlayTiming,
    /// Order of participants with equal totals
    pub tie_break: TieBreak,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8082,
            cors_origins: Vec::new(),
            request_timeout: Duration::from_secs(30),
            max_body_size: 1024 * 1024, // 1MB
            scope: RefreshScope::default(),
            overlay: OverlayTiming::default(),
            tie_break: TieBreak::default(),
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<&Config> for ApiConfig {
    fn from(config: &Config) -> Self {
        Self {
            host: config.api.host.clone(),
            port: config.api.port,
            cors_origins: config.api.cors_origins.clone(),
            request_timeout: Duration::from_secs(config.api.request_timeout_secs),
            scope: config.live.scope,
            overlay: OverlayTiming::from(&config.live),
            tie_break: config.ranking.tie_break,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.api.port = 9000;
        config.live.scope = RefreshScope::Table;
        config.live.notification_visible_ms = 1000;

        let api = ApiConfig::from(&config);
        assert_eq!(api.addr(), "0.0.0.0:9000");
        assert_eq!(api.scope, RefreshScope::Table);
        assert_eq!(api.overlay.visible, Duration::from_millis(1000));
        assert_eq!(api.request_timeout, Duration::from_secs(30));
    }
}
