//! Hosted Campaign Store
//!
//! HTTP client for a hosted backend-as-a-service that exposes the
//! campaign tables through PostgREST conventions
//! (`GET /sales?campaign_id=eq.<id>`, `Prefer: return=representation`).
//!
//! Changes made through this client are published immediately. Inserts
//! made by other processes are picked up by a polling task, see
//! [`RestStore::spawn_change_poller`]. A sale id is published as an insert
//! at most once, whichever path sees it first.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::error::{StoreError, StoreResult};
use super::types::{
    Campaign, ChangeKind, MetricType, NewCampaign, NewParticipant, NewSale, Participant, Prizes,
    Sale, SaleChange, Seller,
};
use super::CampaignStore;

/// Connection settings for the hosted backend
#[derive(Debug, Clone)]
pub struct RestStoreConfig {
    /// Base URL of the REST endpoint (e.g., "https://project.example.co/rest/v1")
    pub url: String,
    /// Project API key, sent as `apikey` and bearer token
    pub api_key: Option<String>,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// How often to poll the sales table for foreign inserts (0 disables)
    pub poll_interval_ms: u64,
}

impl Default for RestStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000".to_string(),
            api_key: None,
            timeout_ms: 10_000,
            poll_interval_ms: 2_000,
        }
    }
}

/// Sale ids already announced as inserts
const RECENT_SALES_CAPACITY: usize = 4096;

/// Bounded set of recently published sale ids, oldest evicted first
#[derive(Debug)]
struct RecentSales {
    order: VecDeque<Uuid>,
    ids: HashSet<Uuid>,
    capacity: usize,
}

impl RecentSales {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            ids: HashSet::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Returns false when `id` was already present
    fn insert(&mut self, id: Uuid) -> bool {
        if !self.ids.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.ids.remove(&evicted);
            }
        }
        true
    }
}

/// Campaign store backed by a hosted REST API
pub struct RestStore {
    client: Client,
    config: RestStoreConfig,
    changes: broadcast::Sender<SaleChange>,
    published: Mutex<RecentSales>,
}

impl RestStore {
    pub fn new(config: RestStoreConfig, change_buffer: usize) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .default_headers(auth_headers(config.api_key.as_deref())?)
            .build()?;

        let (changes, _) = broadcast::channel(change_buffer.max(1));
        Ok(Self {
            client,
            config,
            changes,
            published: Mutex::new(RecentSales::new(RECENT_SALES_CAPACITY)),
        })
    }

    pub fn config(&self) -> &RestStoreConfig {
        &self.config
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.config.url.trim_end_matches('/'), table)
    }

    fn publish(&self, change: SaleChange) {
        let _ = self.changes.send(change);
    }

    /// Publish an insert unless this sale id was already announced
    fn publish_insert(&self, sale: &Sale) -> bool {
        let fresh = match self.published.lock() {
            Ok(mut recent) => recent.insert(sale.id),
            Err(poisoned) => poisoned.into_inner().insert(sale.id),
        };
        if fresh {
            self.publish(SaleChange::new(ChangeKind::Insert, sale));
        }
        fresh
    }

    async fn fetch<T: DeserializeOwned>(&self, table: &str, query: &str) -> StoreResult<Vec<T>> {
        let url = format!("{}?{}", self.table_url(table), query);
        let response = self.client.get(&url).send().await?;
        read_rows(response).await
    }

    async fn insert<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
    ) -> StoreResult<Vec<T>> {
        let request = self.client.post(self.table_url(table)).json(body);
        read_rows(representation(request).send().await?).await
    }

    async fn patch<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
        body: &B,
    ) -> StoreResult<Vec<T>> {
        let url = format!("{}?{}", self.table_url(table), query);
        let request = self.client.patch(&url).json(body);
        read_rows(representation(request).send().await?).await
    }

    async fn remove<T: DeserializeOwned>(&self, table: &str, query: &str) -> StoreResult<Vec<T>> {
        let url = format!("{}?{}", self.table_url(table), query);
        let request = self.client.delete(&url);
        read_rows(representation(request).send().await?).await
    }

    /// Start polling the sales table for rows inserted by other writers
    ///
    /// Every row not yet announced is published as an insert. Updates and
    /// deletes made by other writers are not observed by polling. The task
    /// holds only a weak reference and ends once the store is dropped.
    pub fn spawn_change_poller(self: Arc<Self>) -> Option<JoinHandle<()>> {
        if self.config.poll_interval_ms == 0 {
            tracing::info!("Sales change polling disabled");
            return None;
        }

        let period = Duration::from_millis(self.config.poll_interval_ms);
        let store: Weak<Self> = Arc::downgrade(&self);
        drop(self);

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut last_seen = Utc::now();

            loop {
                ticker.tick().await;

                let Some(strong) = store.upgrade() else {
                    tracing::debug!("Campaign store dropped, stopping sales poller");
                    break;
                };
                if let Err(e) = strong.poll_once(&mut last_seen).await {
                    tracing::warn!(error = %e, "Sales change poll failed");
                }
            }
        }))
    }

    /// One poll: publish unseen sales created at or after `since`
    ///
    /// `gte` re-reads rows sharing the last timestamp; already announced
    /// ids are skipped. Returns the number of inserts published.
    async fn poll_once(&self, since: &mut DateTime<Utc>) -> StoreResult<usize> {
        let sales = self.poll_new_sales(*since).await?;

        let mut published = 0;
        for sale in &sales {
            *since = (*since).max(sale.created_at);
            if self.publish_insert(sale) {
                published += 1;
            }
        }
        if published > 0 {
            tracing::debug!(count = published, "Polled new sales");
        }
        Ok(published)
    }

    async fn poll_new_sales(&self, since: DateTime<Utc>) -> StoreResult<Vec<Sale>> {
        let query = format!(
            "select=*&created_at=gte.{}&order=created_at.asc",
            urlencoding::encode(&since.to_rfc3339())
        );
        self.fetch("sales", &query).await
    }
}

#[async_trait]
impl CampaignStore for RestStore {
    fn backend(&self) -> &'static str {
        "rest"
    }

    async fn ping(&self) -> StoreResult<()> {
        let _: Vec<Seller> = self.fetch("sellers", "select=id,name&limit=1").await?;
        Ok(())
    }

    async fn list_sellers(&self) -> StoreResult<Vec<Seller>> {
        self.fetch("sellers", "select=id,name,avatar_url&order=name.asc")
            .await
    }

    async fn add_seller(&self, name: &str, avatar_url: Option<&str>) -> StoreResult<Seller> {
        let seller = Seller {
            id: Uuid::new_v4(),
            name: name.to_string(),
            avatar_url: avatar_url.map(str::to_string),
        };
        let rows: Vec<Seller> = self.insert("sellers", &seller).await?;
        first_row(rows, "seller")
    }

    async fn list_campaigns(&self) -> StoreResult<Vec<Campaign>> {
        let rows: Vec<CampaignRow> = self
            .fetch("campaigns", "select=*&order=created_at.desc")
            .await?;
        Ok(rows.into_iter().map(Campaign::from).collect())
    }

    async fn get_campaign(&self, id: Uuid) -> StoreResult<Option<Campaign>> {
        let rows: Vec<CampaignRow> = self
            .fetch("campaigns", &format!("select=*&id=eq.{}", id))
            .await?;
        Ok(rows.into_iter().next().map(Campaign::from))
    }

    async fn create_campaign(
        &self,
        campaign: NewCampaign,
        participants: &[NewParticipant],
    ) -> StoreResult<Campaign> {
        let campaign = campaign.into_campaign();
        let rows: Vec<CampaignRow> = self
            .insert("campaigns", &CampaignRow::from(&campaign))
            .await?;
        let created = Campaign::from(first_row(rows, "campaign")?);

        let links: Vec<ParticipantRow> = participants
            .iter()
            .enumerate()
            .map(|(position, p)| ParticipantRow {
                campaign_id: created.id,
                seller_id: p.seller_id,
                individual_goal: p.individual_goal,
                position: position as i64,
            })
            .collect();

        let written: StoreResult<Vec<ParticipantRow>> =
            self.insert("campaign_participants", &links).await;

        if let Err(e) = written {
            tracing::warn!(
                campaign_id = %created.id,
                error = %e,
                "Participant write failed, removing campaign row"
            );
            let query = format!("id=eq.{}", created.id);
            if let Err(cleanup) = self.remove::<CampaignRow>("campaigns", &query).await {
                tracing::error!(
                    campaign_id = %created.id,
                    error = %cleanup,
                    "Failed to remove partially created campaign"
                );
            }
            return Err(e);
        }

        tracing::info!(
            campaign_id = %created.id,
            participants = participants.len(),
            "Created campaign"
        );
        Ok(created)
    }

    async fn list_participants(&self, campaign_id: Uuid) -> StoreResult<Vec<Participant>> {
        let query = format!(
            "select=seller_id,individual_goal,position,sellers(name,avatar_url)\
             &campaign_id=eq.{}&order=position.asc",
            campaign_id
        );
        let rows: Vec<ParticipantJoinRow> = self.fetch("campaign_participants", &query).await?;

        rows.into_iter()
            .map(|row| {
                let seller = row.sellers.ok_or_else(|| {
                    StoreError::Corrupt(format!("participant {} has no seller", row.seller_id))
                })?;
                Ok(Participant {
                    campaign_id,
                    seller_id: row.seller_id,
                    name: seller.name,
                    avatar_url: seller.avatar_url,
                    individual_goal: row.individual_goal,
                })
            })
            .collect()
    }

    async fn list_sales(&self, campaign_id: Uuid, seller_id: Uuid) -> StoreResult<Vec<Sale>> {
        let query = format!(
            "select=*&campaign_id=eq.{}&seller_id=eq.{}&order=created_at.asc",
            campaign_id, seller_id
        );
        self.fetch("sales", &query).await
    }

    async fn record_sale(&self, sale: NewSale) -> StoreResult<Sale> {
        let sale = Sale {
            id: Uuid::new_v4(),
            campaign_id: sale.campaign_id,
            seller_id: sale.seller_id,
            value: sale.value,
            created_at: Utc::now(),
        };
        let rows: Vec<Sale> = self.insert("sales", &sale).await?;
        let stored = first_row(rows, "sale")?;

        self.publish_insert(&stored);
        Ok(stored)
    }

    async fn update_sale(&self, id: Uuid, value: f64) -> StoreResult<Sale> {
        let rows: Vec<Sale> = self
            .patch(
                "sales",
                &format!("id=eq.{}", id),
                &serde_json::json!({ "value": value }),
            )
            .await?;
        let sale = rows
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("sale {}", id)))?;

        self.publish(SaleChange::new(ChangeKind::Update, &sale));
        Ok(sale)
    }

    async fn delete_sale(&self, id: Uuid) -> StoreResult<()> {
        let rows: Vec<Sale> = self.remove("sales", &format!("id=eq.{}", id)).await?;
        let sale = rows
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("sale {}", id)))?;

        self.publish(SaleChange::new(ChangeKind::Delete, &sale));
        Ok(())
    }

    fn subscribe_sales(&self) -> broadcast::Receiver<SaleChange> {
        self.changes.subscribe()
    }
}

/// Build the `apikey` and bearer headers
fn auth_headers(api_key: Option<&str>) -> StoreResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    if let Some(key) = api_key {
        let invalid = |_| StoreError::Upstream("API key is not a valid header value".to_string());
        headers.insert("apikey", HeaderValue::from_str(key).map_err(invalid)?);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", key)).map_err(invalid)?,
        );
    }
    Ok(headers)
}

fn representation(request: RequestBuilder) -> RequestBuilder {
    request.header("Prefer", "return=representation")
}

async fn read_rows<T: DeserializeOwned>(response: Response) -> StoreResult<Vec<T>> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(status_error(status, text));
    }
    Ok(response.json().await?)
}

/// Map a failed response onto the store taxonomy
fn status_error(status: StatusCode, message: String) -> StoreError {
    match status {
        StatusCode::NOT_FOUND => StoreError::NotFound(message),
        StatusCode::CONFLICT => StoreError::Conflict(message),
        _ => StoreError::UpstreamStatus {
            status: status.as_u16(),
            message,
        },
    }
}

fn first_row<T>(rows: Vec<T>, what: &str) -> StoreResult<T> {
    rows.into_iter()
        .next()
        .ok_or_else(|| StoreError::Upstream(format!("backend returned no {} row", what)))
}

// ============================================
// Wire rows
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct CampaignRow {
    id: Uuid,
    name: String,
    #[serde(default)]
    start_date: Option<NaiveDate>,
    #[serde(default)]
    end_date: Option<NaiveDate>,
    metric_type: MetricType,
    #[serde(default)]
    team_goal: Option<f64>,
    #[serde(default)]
    prize_first: Option<String>,
    #[serde(default)]
    prize_second: Option<String>,
    #[serde(default)]
    prize_third: Option<String>,
    #[serde(default)]
    created_by: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<&Campaign> for CampaignRow {
    fn from(c: &Campaign) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            start_date: c.start_date,
            end_date: c.end_date,
            metric_type: c.metric_type,
            team_goal: c.team_goal,
            prize_first: c.prizes.first.clone(),
            prize_second: c.prizes.second.clone(),
            prize_third: c.prizes.third.clone(),
            created_by: c.created_by.clone(),
            created_at: c.created_at,
        }
    }
}

impl From<CampaignRow> for Campaign {
    fn from(row: CampaignRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            start_date: row.start_date,
            end_date: row.end_date,
            metric_type: row.metric_type,
            team_goal: row.team_goal,
            prizes: Prizes {
                first: row.prize_first,
                second: row.prize_second,
                third: row.prize_third,
            },
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ParticipantRow {
    campaign_id: Uuid,
    seller_id: Uuid,
    individual_goal: Option<f64>,
    position: i64,
}

#[derive(Debug, Deserialize)]
struct ParticipantJoinRow {
    seller_id: Uuid,
    #[serde(default)]
    individual_goal: Option<f64>,
    #[serde(default)]
    sellers: Option<SellerEmbed>,
}

#[derive(Debug, Deserialize)]
struct SellerEmbed {
    name: String,
    #[serde(default)]
    avatar_url: Option<String>,
}
