//! SQLite Campaign Store
//!
//! Embedded backend. One connection guarded by a `std::sync::Mutex`
//! (the connection is `Send` but not `Sync`), with a broadcast channel
//! carrying sale change notifications to live rankings.
//!
//! Campaign and participant rows are written in a single transaction,
//! so a failed participant insert never leaves a campaign behind.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::error::{StoreError, StoreResult};
use super::types::{
    Campaign, ChangeKind, MetricType, NewCampaign, NewParticipant, NewSale, Participant, Prizes,
    Sale, SaleChange, Seller,
};
use super::CampaignStore;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sellers (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    avatar_url TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS campaigns (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    start_date TEXT,
    end_date TEXT,
    metric_type TEXT NOT NULL,
    team_goal REAL,
    prize_first TEXT,
    prize_second TEXT,
    prize_third TEXT,
    created_by TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS campaign_participants (
    campaign_id TEXT NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
    seller_id TEXT NOT NULL REFERENCES sellers(id),
    individual_goal REAL,
    position INTEGER NOT NULL,
    PRIMARY KEY (campaign_id, seller_id)
);

CREATE TABLE IF NOT EXISTS sales (
    id TEXT PRIMARY KEY,
    campaign_id TEXT NOT NULL,
    seller_id TEXT NOT NULL,
    value REAL NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (campaign_id, seller_id)
        REFERENCES campaign_participants(campaign_id, seller_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_sales_participant ON sales(campaign_id, seller_id);
";

/// Campaign store on an embedded SQLite database
pub struct SqliteStore {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<SaleChange>,
}

impl SqliteStore {
    /// Create or open a store at `path`
    pub fn open(path: impl AsRef<Path>, change_buffer: usize) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;
        Self::init(conn, change_buffer)
    }

    /// Create a throwaway store (tests, demos)
    pub fn open_in_memory(change_buffer: usize) -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?, change_buffer)
    }

    fn init(conn: Connection, change_buffer: usize) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;

        let (changes, _) = broadcast::channel(change_buffer.max(1));
        Ok(Self {
            conn: Mutex::new(conn),
            changes,
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }

    fn publish(&self, change: SaleChange) {
        // No receivers just means nobody is displaying a ranking right now
        let _ = self.changes.send(change);
        tracing::debug!(
            sale_id = %change.sale_id,
            campaign_id = %change.campaign_id,
            kind = ?change.kind,
            "Published sale change"
        );
    }

    /// Number of live subscriptions to the sales change stream
    pub fn sale_subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }

    fn fetch_sale(conn: &Connection, id: Uuid) -> StoreResult<Option<Sale>> {
        let row = conn
            .query_row(
                "SELECT id, campaign_id, seller_id, value, created_at FROM sales WHERE id = ?1",
                params![id.to_string()],
                SaleRow::from_row,
            )
            .optional()?;
        row.map(SaleRow::into_sale).transpose()
    }
}

#[async_trait]
impl CampaignStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn ping(&self) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    async fn list_sellers(&self) -> StoreResult<Vec<Seller>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare_cached("SELECT id, name, avatar_url FROM sellers ORDER BY name, rowid")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, name, avatar_url)| {
                Ok(Seller {
                    id: parse_uuid(&id)?,
                    name,
                    avatar_url,
                })
            })
            .collect()
    }

    async fn add_seller(&self, name: &str, avatar_url: Option<&str>) -> StoreResult<Seller> {
        let seller = Seller {
            id: Uuid::new_v4(),
            name: name.to_string(),
            avatar_url: avatar_url.map(str::to_string),
        };

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sellers (id, name, avatar_url, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                seller.id.to_string(),
                seller.name,
                seller.avatar_url,
                Utc::now().to_rfc3339()
            ],
        )?;

        tracing::info!(seller_id = %seller.id, name = %seller.name, "Added seller");
        Ok(seller)
    }

    async fn list_campaigns(&self) -> StoreResult<Vec<Campaign>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM campaigns ORDER BY created_at DESC, rowid DESC",
            CampaignRow::COLUMNS
        ))?;
        let rows = stmt
            .query_map([], CampaignRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(CampaignRow::into_campaign).collect()
    }

    async fn get_campaign(&self, id: Uuid) -> StoreResult<Option<Campaign>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM campaigns WHERE id = ?1", CampaignRow::COLUMNS),
                params![id.to_string()],
                CampaignRow::from_row,
            )
            .optional()?;

        row.map(CampaignRow::into_campaign).transpose()
    }

    async fn create_campaign(
        &self,
        campaign: NewCampaign,
        participants: &[NewParticipant],
    ) -> StoreResult<Campaign> {
        let campaign = campaign.into_campaign();

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO campaigns (id, name, start_date, end_date, metric_type, team_goal,
                                    prize_first, prize_second, prize_third, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                campaign.id.to_string(),
                campaign.name,
                campaign.start_date.map(format_date),
                campaign.end_date.map(format_date),
                campaign.metric_type.as_str(),
                campaign.team_goal,
                campaign.prizes.first,
                campaign.prizes.second,
                campaign.prizes.third,
                campaign.created_by,
                campaign.created_at.to_rfc3339(),
            ],
        )?;

        {
            let mut insert = tx.prepare_cached(
                "INSERT INTO campaign_participants (campaign_id, seller_id, individual_goal, position)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;

            for (position, participant) in participants.iter().enumerate() {
                let known: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM sellers WHERE id = ?1)",
                    params![participant.seller_id.to_string()],
                    |row| row.get(0),
                )?;
                if !known {
                    // Dropping the transaction rolls back the campaign row
                    return Err(StoreError::NotFound(format!(
                        "seller {}",
                        participant.seller_id
                    )));
                }

                insert.execute(params![
                    campaign.id.to_string(),
                    participant.seller_id.to_string(),
                    participant.individual_goal,
                    position as i64,
                ])?;
            }
        }

        tx.commit()?;

        tracing::info!(
            campaign_id = %campaign.id,
            name = %campaign.name,
            participants = participants.len(),
            "Created campaign"
        );
        Ok(campaign)
    }

    async fn list_participants(&self, campaign_id: Uuid) -> StoreResult<Vec<Participant>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT cp.seller_id, s.name, s.avatar_url, cp.individual_goal
             FROM campaign_participants cp
             JOIN sellers s ON s.id = cp.seller_id
             WHERE cp.campaign_id = ?1
             ORDER BY cp.position",
        )?;
        let rows = stmt
            .query_map(params![campaign_id.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(seller_id, name, avatar_url, individual_goal)| {
                Ok(Participant {
                    campaign_id,
                    seller_id: parse_uuid(&seller_id)?,
                    name,
                    avatar_url,
                    individual_goal,
                })
            })
            .collect()
    }

    async fn list_sales(&self, campaign_id: Uuid, seller_id: Uuid) -> StoreResult<Vec<Sale>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, campaign_id, seller_id, value, created_at FROM sales
             WHERE campaign_id = ?1 AND seller_id = ?2
             ORDER BY created_at, rowid",
        )?;
        let rows = stmt
            .query_map(
                params![campaign_id.to_string(), seller_id.to_string()],
                SaleRow::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(SaleRow::into_sale).collect()
    }

    async fn record_sale(&self, sale: NewSale) -> StoreResult<Sale> {
        let sale = Sale {
            id: Uuid::new_v4(),
            campaign_id: sale.campaign_id,
            seller_id: sale.seller_id,
            value: sale.value,
            created_at: Utc::now(),
        };

        {
            let conn = self.conn()?;
            let participating: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM campaign_participants
                               WHERE campaign_id = ?1 AND seller_id = ?2)",
                params![sale.campaign_id.to_string(), sale.seller_id.to_string()],
                |row| row.get(0),
            )?;
            if !participating {
                return Err(StoreError::NotFound(format!(
                    "seller {} is not a participant of campaign {}",
                    sale.seller_id, sale.campaign_id
                )));
            }

            conn.execute(
                "INSERT INTO sales (id, campaign_id, seller_id, value, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    sale.id.to_string(),
                    sale.campaign_id.to_string(),
                    sale.seller_id.to_string(),
                    sale.value,
                    sale.created_at.to_rfc3339(),
                ],
            )?;
        }

        self.publish(SaleChange::new(ChangeKind::Insert, &sale));
        Ok(sale)
    }

    async fn update_sale(&self, id: Uuid, value: f64) -> StoreResult<Sale> {
        let sale = {
            let conn = self.conn()?;
            let changed = conn.execute(
                "UPDATE sales SET value = ?1 WHERE id = ?2",
                params![value, id.to_string()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("sale {}", id)));
            }
            Self::fetch_sale(&conn, id)?
                .ok_or_else(|| StoreError::NotFound(format!("sale {}", id)))?
        };

        self.publish(SaleChange::new(ChangeKind::Update, &sale));
        Ok(sale)
    }

    async fn delete_sale(&self, id: Uuid) -> StoreResult<()> {
        let sale = {
            let conn = self.conn()?;
            let sale = Self::fetch_sale(&conn, id)?
                .ok_or_else(|| StoreError::NotFound(format!("sale {}", id)))?;
            conn.execute("DELETE FROM sales WHERE id = ?1", params![id.to_string()])?;
            sale
        };

        self.publish(SaleChange::new(ChangeKind::Delete, &sale));
        Ok(())
    }

    fn subscribe_sales(&self) -> broadcast::Receiver<SaleChange> {
        self.changes.subscribe()
    }
}

/// Raw campaign row before decoding ids, dates and enums
struct CampaignRow {
    id: String,
    name: String,
    start_date: Option<String>,
    end_date: Option<String>,
    metric_type: String,
    team_goal: Option<f64>,
    prize_first: Option<String>,
    prize_second: Option<String>,
    prize_third: Option<String>,
    created_by: Option<String>,
    created_at: String,
}

impl CampaignRow {
    const COLUMNS: &'static str = "id, name, start_date, end_date, metric_type, team_goal, \
                                   prize_first, prize_second, prize_third, created_by, created_at";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            start_date: row.get(2)?,
            end_date: row.get(3)?,
            metric_type: row.get(4)?,
            team_goal: row.get(5)?,
            prize_first: row.get(6)?,
            prize_second: row.get(7)?,
            prize_third: row.get(8)?,
            created_by: row.get(9)?,
            created_at: row.get(10)?,
        })
    }

    fn into_campaign(self) -> StoreResult<Campaign> {
        Ok(Campaign {
            id: parse_uuid(&self.id)?,
            name: self.name,
            start_date: self.start_date.as_deref().map(parse_date).transpose()?,
            end_date: self.end_date.as_deref().map(parse_date).transpose()?,
            metric_type: self
                .metric_type
                .parse::<MetricType>()
                .map_err(StoreError::Corrupt)?,
            team_goal: self.team_goal,
            prizes: Prizes {
                first: self.prize_first,
                second: self.prize_second,
                third: self.prize_third,
            },
            created_by: self.created_by,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

/// Raw sale row
struct SaleRow {
    id: String,
    campaign_id: String,
    seller_id: String,
    value: f64,
    created_at: String,
}

impl SaleRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            campaign_id: row.get(1)?,
            seller_id: row.get(2)?,
            value: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn into_sale(self) -> StoreResult<Sale> {
        Ok(Sale {
            id: parse_uuid(&self.id)?,
            campaign_id: parse_uuid(&self.campaign_id)?,
            seller_id: parse_uuid(&self.seller_id)?,
            value: self.value,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_uuid(s: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| StoreError::Corrupt(format!("bad id {:?}: {}", s, e)))
}

fn parse_date(s: &str) -> StoreResult<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| StoreError::Corrupt(format!("bad date {:?}: {}", s, e)))
}

fn parse_timestamp(s: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {:?}: {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory(16).unwrap()
    }

    async fn campaign_with(store: &SqliteStore, names: &[&str]) -> (Campaign, Vec<Seller>) {
        let mut sellers = Vec::new();
        for name in names {
            sellers.push(store.add_seller(name, None).await.unwrap());
        }
        let participants: Vec<NewParticipant> = sellers
            .iter()
            .map(|s| NewParticipant {
                seller_id: s.id,
                individual_goal: Some(150_000.0),
            })
            .collect();

        let campaign = store
            .create_campaign(
                NewCampaign {
                    name: "Campanha de Vendas - Outubro 2024".to_string(),
                    start_date: NaiveDate::from_ymd_opt(2024, 10, 1),
                    end_date: NaiveDate::from_ymd_opt(2024, 10, 31),
                    team_goal: Some(1_000_000.0),
                    ..Default::default()
                },
                &participants,
            )
            .await
            .unwrap();

        (campaign, sellers)
    }

    #[tokio::test]
    async fn test_campaign_roundtrip() {
        let store = store();
        let (campaign, _) = campaign_with(&store, &["Carlos Silva"]).await;

        let loaded = store.get_campaign(campaign.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, campaign.name);
        assert_eq!(loaded.start_date, NaiveDate::from_ymd_opt(2024, 10, 1));
        assert_eq!(loaded.team_goal, Some(1_000_000.0));
        assert_eq!(loaded.metric_type, MetricType::Monetary);

        assert!(store.get_campaign(Uuid::new_v4()).await.unwrap().is_none());
        assert_eq!(store.list_campaigns().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_participants_keep_selection_order() {
        let store = store();
        let (campaign, sellers) =
            campaign_with(&store, &["Roberto Oliveira", "Ana Costa", "Carlos Silva"]).await;

        let participants = store.list_participants(campaign.id).await.unwrap();
        let ids: Vec<Uuid> = participants.iter().map(|p| p.seller_id).collect();
        let expected: Vec<Uuid> = sellers.iter().map(|s| s.id).collect();
        assert_eq!(ids, expected);
        assert_eq!(participants[1].name, "Ana Costa");
        assert_eq!(participants[1].individual_goal, Some(150_000.0));
    }

    #[tokio::test]
    async fn test_unknown_seller_rolls_back_campaign() {
        let store = store();
        let known = store.add_seller("Ana Costa", None).await.unwrap();

        let result = store
            .create_campaign(
                NewCampaign {
                    name: "Broken".to_string(),
                    ..Default::default()
                },
                &[
                    NewParticipant {
                        seller_id: known.id,
                        individual_goal: None,
                    },
                    NewParticipant {
                        seller_id: Uuid::new_v4(),
                        individual_goal: None,
                    },
                ],
            )
            .await;

        assert!(matches!(result, Err(StoreError::NotFound(_))));
        assert!(store.list_campaigns().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sales_are_scoped_to_participant() {
        let store = store();
        let (campaign, sellers) = campaign_with(&store, &["Ana Costa", "Pedro Almeida"]).await;

        for value in [1000.0, 2500.0] {
            store
                .record_sale(NewSale {
                    campaign_id: campaign.id,
                    seller_id: sellers[0].id,
                    value,
                })
                .await
                .unwrap();
        }

        let ana = store.list_sales(campaign.id, sellers[0].id).await.unwrap();
        let pedro = store.list_sales(campaign.id, sellers[1].id).await.unwrap();
        assert_eq!(ana.len(), 2);
        assert!(pedro.is_empty());
        assert_eq!(ana.iter().map(|s| s.value).sum::<f64>(), 3500.0);
    }

    #[tokio::test]
    async fn test_sale_for_non_participant_rejected() {
        let store = store();
        let (campaign, _) = campaign_with(&store, &["Ana Costa"]).await;
        let outsider = store.add_seller("Felipe Souza", None).await.unwrap();

        let result = store
            .record_sale(NewSale {
                campaign_id: campaign.id,
                seller_id: outsider.id,
                value: 10.0,
            })
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_changes_published_for_insert_update_delete() {
        let store = store();
        let (campaign, sellers) = campaign_with(&store, &["Ana Costa"]).await;
        let mut changes = store.subscribe_sales();

        let sale = store
            .record_sale(NewSale {
                campaign_id: campaign.id,
                seller_id: sellers[0].id,
                value: 100.0,
            })
            .await
            .unwrap();
        let updated = store.update_sale(sale.id, 250.0).await.unwrap();
        assert_eq!(updated.value, 250.0);
        store.delete_sale(sale.id).await.unwrap();

        let kinds: Vec<ChangeKind> = (0..3).map(|_| changes.try_recv().unwrap().kind).collect();
        assert_eq!(
            kinds,
            vec![ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete]
        );
        assert!(store
            .list_sales(campaign.id, sellers[0].id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_sale() {
        let store = store();
        let result = store.update_sale(Uuid::new_v4(), 1.0).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
        let result = store.delete_sale(Uuid::new_v4()).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_reopen_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("podium.db");

        let id = {
            let store = SqliteStore::open(&path, 16).unwrap();
            let (campaign, _) = campaign_with(&store, &["Mariana Lima"]).await;
            campaign.id
        };

        let store = SqliteStore::open(&path, 16).unwrap();
        assert!(store.get_campaign(id).await.unwrap().is_some());
        assert_eq!(store.list_sellers().await.unwrap().len(), 1);
        store.ping().await.unwrap();
    }
}
