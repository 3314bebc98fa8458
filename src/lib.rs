//! # Podium
//!
//! Sales campaign leaderboard: participants ranked by the sum of their
//! sales, shown as a podium with live updates and celebration overlays.
//!
//! ## Features
//!
//! - **Campaign store**: embedded SQLite or a hosted PostgREST-style service
//! - **Rankings**: per-seller totals, stable tie order, team total and goals
//! - **Live displays**: a sale change re-ranks the campaign being shown
//! - **Celebrations**: overtakes and reached goals queue as timed overlays
//! - **Builder**: draft, validate and create campaigns
//!
//! ## Modules
//!
//! - [`store`]: Campaign store trait and backends
//! - [`ranking`]: Ranking aggregation
//! - [`live`]: Live ranking refresh
//! - [`display`]: Scoreboard composition, formatting and overlays
//! - [`builder`]: Campaign drafts and submission
//! - [`export`]: Ranking export as CSV or JSON
//! - [`websocket`]: Live display feed over WebSocket
//! - [`api`]: REST API server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use podium::store::{CampaignStore, NewSale, SqliteStore};
//! use podium::ranking::{RankingAggregator, TieBreak};
//! use std::sync::Arc;
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store: Arc<dyn CampaignStore> = Arc::new(SqliteStore::open("podium.db", 256)?);
//!     let aggregator = RankingAggregator::new(Arc::clone(&store), TieBreak::default());
//!
//!     let campaign_id: Uuid = "6f1c1a4e-8f0e-4f7c-9a59-2d8b6a0f1c11".parse()?;
//!     let ranking = aggregator.rank(campaign_id).await?;
//!
//!     for entry in ranking.podium() {
//!         println!("{}º {} {}", entry.rank, entry.name, entry.value);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod builder;
pub mod config;
pub mod display;
pub mod export;
pub mod live;
pub mod logging;
pub mod ranking;
pub mod store;
pub mod websocket;

// Re-export top-level types for convenience
pub use store::{
    open_store, Campaign, CampaignStore, MetricType, OpenedStore, Participant, RestStore, Sale,
    SaleChange, Seller, SqliteStore, StoreError, StoreResult,
};

pub use ranking::{RankedEntry, Ranking, RankingAggregator, RankingError, TieBreak};

pub use live::{BoardState, LiveRanking, RefreshScope};

pub use display::{compose, detect, Notification, NotificationOverlay, Scoreboard};

pub use builder::{submit, BuilderError, CampaignDraft, DraftEdit, ValidationError};

pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use websocket::{
    ClientMessage, ConnectionHub, DisplayFeed, HubConfig, HubError, ServerMessage, WsEvent,
    websocket_handler,
};

pub use config::{Config, ConfigError, LoggingConfig};
