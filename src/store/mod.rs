//! Campaign Store
//!
//! Persistence for sellers, campaigns, campaign participants and sales,
//! plus a change stream for the sales table.
//!
//! - **types**: Row types shared by every backend
//! - **sqlite**: Embedded backend on SQLite (default)
//! - **rest**: Hosted backend speaking PostgREST conventions
//! - **error**: Error types
//!
//! # Example
//!
//! ```rust,no_run
//! use podium::store::{CampaignStore, NewCampaign, NewParticipant, SqliteStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SqliteStore::open("./podium.db", 256)?;
//!     let ana = store.add_seller("Ana Costa", None).await?;
//!
//!     let campaign = store
//!         .create_campaign(
//!             NewCampaign { name: "Outubro".into(), ..Default::default() },
//!             &[NewParticipant { seller_id: ana.id, individual_goal: Some(150_000.0) }],
//!         )
//!         .await?;
//!
//!     let mut changes = store.subscribe_sales();
//!     println!("Created {}", campaign.id);
//!     # let _ = changes.try_recv();
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod rest;
pub mod sqlite;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use rest::{RestStore, RestStoreConfig};
pub use sqlite::SqliteStore;
pub use types::{
    Campaign, ChangeKind, MetricType, NewCampaign, NewParticipant, NewSale, Participant, Prizes,
    Sale, SaleChange, Seller,
};

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::{StoreBackend, StoreConfig};

/// Queryable, subscribable source of campaign data
#[async_trait]
pub trait CampaignStore: Send + Sync {
    /// Short backend name for logs and health output
    fn backend(&self) -> &'static str;

    /// Cheap round trip used by readiness probes
    async fn ping(&self) -> StoreResult<()>;

    /// All sellers, ordered by name
    async fn list_sellers(&self) -> StoreResult<Vec<Seller>>;

    /// Add a seller to the roster
    async fn add_seller(&self, name: &str, avatar_url: Option<&str>) -> StoreResult<Seller>;

    /// All campaigns, newest first
    async fn list_campaigns(&self) -> StoreResult<Vec<Campaign>>;

    /// A single campaign, `None` when absent
    async fn get_campaign(&self, id: Uuid) -> StoreResult<Option<Campaign>>;

    /// Write one campaign row plus its participant rows
    async fn create_campaign(
        &self,
        campaign: NewCampaign,
        participants: &[NewParticipant],
    ) -> StoreResult<Campaign>;

    /// Participants of a campaign in selection order
    async fn list_participants(&self, campaign_id: Uuid) -> StoreResult<Vec<Participant>>;

    /// Every sale of one participant in one campaign
    async fn list_sales(&self, campaign_id: Uuid, seller_id: Uuid) -> StoreResult<Vec<Sale>>;

    /// Append a sale; the pair must be a participant of the campaign
    async fn record_sale(&self, sale: NewSale) -> StoreResult<Sale>;

    /// Replace the value of an existing sale
    async fn update_sale(&self, id: Uuid, value: f64) -> StoreResult<Sale>;

    /// Remove a sale
    async fn delete_sale(&self, id: Uuid) -> StoreResult<()>;

    /// Change notifications for the whole sales table
    fn subscribe_sales(&self) -> broadcast::Receiver<SaleChange>;
}

/// An opened backend plus its change poller, if one runs
///
/// Dropping it stops the poller.
pub struct OpenedStore {
    pub store: Arc<dyn CampaignStore>,
    pub poller: Option<JoinHandle<()>>,
}

impl OpenedStore {
    /// Shared handle to the store
    pub fn store(&self) -> Arc<dyn CampaignStore> {
        Arc::clone(&self.store)
    }
}

impl Drop for OpenedStore {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}

/// Open the backend selected in configuration
///
/// With `watch_changes`, the REST backend also starts its change poller,
/// which must happen inside a Tokio runtime. One-shot commands pass false.
pub fn open_store(config: &StoreConfig, watch_changes: bool) -> StoreResult<OpenedStore> {
    match config.backend {
        StoreBackend::Sqlite => {
            let path = config.resolved_sqlite_path();
            let store = SqliteStore::open(&path, config.change_buffer)?;
            tracing::info!(path = %path.display(), "Opened SQLite campaign store");
            Ok(OpenedStore {
                store: Arc::new(store),
                poller: None,
            })
        }
        StoreBackend::Rest => {
            let rest_config = RestStoreConfig::from(&config.rest);
            let store = Arc::new(RestStore::new(rest_config, config.change_buffer)?);
            tracing::info!(url = %config.rest.url, "Using hosted campaign store");
            let poller = if watch_changes {
                Arc::clone(&store).spawn_change_poller()
            } else {
                None
            };
            Ok(OpenedStore { store, poller })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RestConfig;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_sqlite_has_no_poller() {
        let dir = tempdir().unwrap();
        let config = StoreConfig {
            sqlite_path: dir.path().join("podium.db").to_string_lossy().to_string(),
            ..Default::default()
        };

        let opened = open_store(&config, true).unwrap();
        assert_eq!(opened.store().backend(), "sqlite");
        assert!(opened.poller.is_none());
    }

    #[tokio::test]
    async fn test_open_rest_poller_follows_flag() {
        let config = StoreConfig {
            backend: StoreBackend::Rest,
            rest: RestConfig {
                url: "http://127.0.0.1:9".to_string(),
                poll_interval_ms: 60_000,
                ..Default::default()
            },
            ..Default::default()
        };

        let one_shot = open_store(&config, false).unwrap();
        assert_eq!(one_shot.store().backend(), "rest");
        assert!(one_shot.poller.is_none());

        let serving = open_store(&config, true).unwrap();
        assert!(serving.poller.is_some());
    }
}
