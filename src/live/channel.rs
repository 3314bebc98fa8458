use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot, watch, Notify};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::ranking::{Ranking, RankingAggregator, RankingError};
use crate::store::{CampaignStore, SaleChange};

/// Which sale changes trigger a recompute
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshScope {
    /// Only changes to sales of the displayed campaign
    #[default]
    Campaign,
    /// Any change to the sales table
    Table,
}

impl RefreshScope {
    pub fn matches(&self, change: &SaleChange, campaign_id: Uuid) -> bool {
        match self {
            RefreshScope::Campaign => change.campaign_id == campaign_id,
            RefreshScope::Table => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshScope::Campaign => "campaign",
            RefreshScope::Table => "table",
        }
    }
}

impl fmt::Display for RefreshScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefreshScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "campaign" => Ok(RefreshScope::Campaign),
            "table" => Ok(RefreshScope::Table),
            other => Err(format!("unknown refresh scope '{}'", other)),
        }
    }
}

/// What the display currently shows
#[derive(Debug, Clone)]
pub enum BoardState {
    /// No ranking available yet, or the last read failed
    Loading,
    /// The campaign does not exist
    NotFound,
    /// A complete ranking
    Ready(Arc<Ranking>),
}

impl BoardState {
    pub fn ranking(&self) -> Option<&Arc<Ranking>> {
        match self {
            BoardState::Ready(ranking) => Some(ranking),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, BoardState::Loading)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BoardState::NotFound)
    }
}

/// Handle that asks a live ranking for an extra recompute
#[derive(Debug, Clone)]
pub struct Refresher {
    notify: Arc<Notify>,
}

impl Refresher {
    pub fn refresh(&self) {
        self.notify.notify_one();
    }
}

/// A continuously refreshed ranking for one campaign
///
/// The sale subscription lives in a background task and is released when
/// this handle is dropped.
pub struct LiveRanking {
    campaign_id: Uuid,
    state: watch::Receiver<BoardState>,
    refresh: Arc<Notify>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl LiveRanking {
    /// Subscribe to sale changes and start computing
    pub fn spawn(
        aggregator: Arc<RankingAggregator>,
        store: Arc<dyn CampaignStore>,
        campaign_id: Uuid,
        scope: RefreshScope,
    ) -> Self {
        // Subscribe before the first computation so no change is missed
        let changes = store.subscribe_sales();
        let (state_tx, state_rx) = watch::channel(BoardState::Loading);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let refresh = Arc::new(Notify::new());

        let worker = Worker {
            aggregator,
            campaign_id,
            scope,
            state: state_tx,
            refresh: Arc::clone(&refresh),
        };
        let task = tokio::spawn(worker.run(changes, shutdown_rx));

        tracing::debug!(campaign_id = %campaign_id, scope = %scope, "Live ranking started");

        Self {
            campaign_id,
            state: state_rx,
            refresh,
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    pub fn campaign_id(&self) -> Uuid {
        self.campaign_id
    }

    /// Snapshot of the current state
    pub fn current(&self) -> BoardState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state replacement
    pub fn watch(&self) -> watch::Receiver<BoardState> {
        self.state.clone()
    }

    pub fn refresher(&self) -> Refresher {
        Refresher {
            notify: Arc::clone(&self.refresh),
        }
    }

    /// Whether the background task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for LiveRanking {
    fn drop(&mut self) {
        // Dropping the sender wakes the task, which then releases its subscription
        self.shutdown.take();
        tracing::debug!(campaign_id = %self.campaign_id, "Live ranking stopped");
    }
}

struct Worker {
    aggregator: Arc<RankingAggregator>,
    campaign_id: Uuid,
    scope: RefreshScope,
    state: watch::Sender<BoardState>,
    refresh: Arc<Notify>,
}

enum Step {
    Continue,
    Stop,
}

impl Worker {
    async fn run(
        self,
        mut changes: broadcast::Receiver<SaleChange>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        if let Step::Stop = self.recompute(&mut shutdown).await {
            return;
        }

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = self.refresh.notified() => {
                    tracing::debug!(campaign_id = %self.campaign_id, "Manual refresh");
                }
                change = changes.recv() => match change {
                    Ok(change) => {
                        if !self.scope.matches(&change, self.campaign_id) {
                            continue;
                        }
                        tracing::debug!(
                            campaign_id = %self.campaign_id,
                            sale_id = %change.sale_id,
                            kind = ?change.kind,
                            "Sale change"
                        );
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            campaign_id = %self.campaign_id,
                            skipped,
                            "Live ranking lagged behind sale changes"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!(campaign_id = %self.campaign_id, "Sale change stream closed");
                        break;
                    }
                },
            }

            if let Step::Stop = self.recompute(&mut shutdown).await {
                break;
            }
        }
    }

    async fn recompute(&self, shutdown: &mut oneshot::Receiver<()>) -> Step {
        let result = self.aggregator.rank(self.campaign_id).await;

        // Handle dropped while computing: discard the result
        if !matches!(shutdown.try_recv(), Err(oneshot::error::TryRecvError::Empty)) {
            return Step::Stop;
        }

        match result {
            Ok(ranking) => {
                self.state.send_replace(BoardState::Ready(Arc::new(ranking)));
                Step::Continue
            }
            Err(RankingError::NotFound(id)) => {
                tracing::warn!(campaign_id = %id, "Displayed campaign not found");
                self.state.send_replace(BoardState::NotFound);
                Step::Stop
            }
            Err(e) => {
                tracing::error!(campaign_id = %self.campaign_id, error = %e, "Failed to compute ranking");
                self.state.send_replace(BoardState::Loading);
                Step::Continue
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::TieBreak;
    use crate::store::{NewCampaign, NewParticipant, NewSale, SqliteStore};
    use std::time::Duration;

    struct Fixture {
        store: Arc<SqliteStore>,
        aggregator: Arc<RankingAggregator>,
        campaign: Uuid,
        other: Uuid,
        seller: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(SqliteStore::open_in_memory(64).unwrap());
        let ana = store.add_seller("Ana", None).await.unwrap();
        let participants = [NewParticipant {
            seller_id: ana.id,
            individual_goal: None,
        }];

        let campaign = store
            .create_campaign(
                NewCampaign {
                    name: "Outubro".to_string(),
                    ..Default::default()
                },
                &participants,
            )
            .await
            .unwrap();
        let other = store
            .create_campaign(
                NewCampaign {
                    name: "Novembro".to_string(),
                    ..Default::default()
                },
                &participants,
            )
            .await
            .unwrap();

        let aggregator = Arc::new(RankingAggregator::new(store.clone(), TieBreak::FetchOrder));

        Fixture {
            store,
            aggregator,
            campaign: campaign.id,
            other: other.id,
            seller: ana.id,
        }
    }

    async fn wait_for_total(rx: &mut watch::Receiver<BoardState>, total: f64) -> Arc<Ranking> {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Some(ranking) = rx.borrow_and_update().ranking() {
                    if ranking.team_total == total {
                        return ranking.clone();
                    }
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("ranking did not reach expected total")
    }

    #[tokio::test]
    async fn test_insert_triggers_recompute() {
        let f = fixture().await;
        let live = LiveRanking::spawn(
            f.aggregator.clone(),
            f.store.clone(),
            f.campaign,
            RefreshScope::Campaign,
        );
        let mut rx = live.watch();
        wait_for_total(&mut rx, 0.0).await;

        f.store
            .record_sale(NewSale {
                campaign_id: f.campaign,
                seller_id: f.seller,
                value: 1_500.0,
            })
            .await
            .unwrap();

        let ranking = wait_for_total(&mut rx, 1_500.0).await;
        assert_eq!(ranking.entries.len(), 1);
        assert_eq!(ranking.entries[0].value, 1_500.0);
    }

    #[tokio::test]
    async fn test_update_and_delete_trigger_recompute() {
        let f = fixture().await;
        let live = LiveRanking::spawn(
            f.aggregator.clone(),
            f.store.clone(),
            f.campaign,
            RefreshScope::Campaign,
        );
        let mut rx = live.watch();

        let sale = f
            .store
            .record_sale(NewSale {
                campaign_id: f.campaign,
                seller_id: f.seller,
                value: 100.0,
            })
            .await
            .unwrap();
        wait_for_total(&mut rx, 100.0).await;

        f.store.update_sale(sale.id, 250.0).await.unwrap();
        wait_for_total(&mut rx, 250.0).await;

        f.store.delete_sale(sale.id).await.unwrap();
        wait_for_total(&mut rx, 0.0).await;
    }

    #[tokio::test]
    async fn test_campaign_scope_ignores_other_campaigns() {
        let f = fixture().await;
        let live = LiveRanking::spawn(
            f.aggregator.clone(),
            f.store.clone(),
            f.campaign,
            RefreshScope::Campaign,
        );
        let mut rx = live.watch();
        wait_for_total(&mut rx, 0.0).await;

        f.store
            .record_sale(NewSale {
                campaign_id: f.other,
                seller_id: f.seller,
                value: 999.0,
            })
            .await
            .unwrap();

        let changed = tokio::time::timeout(Duration::from_millis(200), rx.changed()).await;
        assert!(changed.is_err(), "other campaign's sale must not refresh");
    }

    #[tokio::test]
    async fn test_table_scope_refreshes_on_any_sale() {
        let f = fixture().await;
        let live = LiveRanking::spawn(
            f.aggregator.clone(),
            f.store.clone(),
            f.campaign,
            RefreshScope::Table,
        );
        let mut rx = live.watch();
        wait_for_total(&mut rx, 0.0).await;

        f.store
            .record_sale(NewSale {
                campaign_id: f.other,
                seller_id: f.seller,
                value: 999.0,
            })
            .await
            .unwrap();

        let changed = tokio::time::timeout(Duration::from_secs(2), rx.changed()).await;
        assert!(changed.is_ok());
        // Recomputed, but the displayed campaign's total is unchanged
        assert_eq!(rx.borrow().ranking().unwrap().team_total, 0.0);
    }

    #[tokio::test]
    async fn test_manual_refresh_recomputes() {
        let f = fixture().await;
        let live = LiveRanking::spawn(
            f.aggregator.clone(),
            f.store.clone(),
            f.campaign,
            RefreshScope::Campaign,
        );
        let mut rx = live.watch();
        wait_for_total(&mut rx, 0.0).await;

        live.refresher().refresh();
        let changed = tokio::time::timeout(Duration::from_secs(2), rx.changed()).await;
        assert!(changed.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_campaign_is_terminal() {
        let f = fixture().await;
        let live = LiveRanking::spawn(
            f.aggregator.clone(),
            f.store.clone(),
            Uuid::new_v4(),
            RefreshScope::Campaign,
        );
        let mut rx = live.watch();

        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| s.is_not_found()))
            .await
            .unwrap()
            .unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while !live.is_finished() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_drop_releases_subscription() {
        let f = fixture().await;
        let baseline = f.store.sale_subscriber_count();

        let live = LiveRanking::spawn(
            f.aggregator.clone(),
            f.store.clone(),
            f.campaign,
            RefreshScope::Campaign,
        );
        assert_eq!(f.store.sale_subscriber_count(), baseline + 1);

        drop(live);

        tokio::time::timeout(Duration::from_secs(2), async {
            while f.store.sale_subscriber_count() != baseline {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("subscription not released");
    }

    #[test]
    fn test_scope_parse() {
        assert_eq!("campaign".parse::<RefreshScope>().unwrap(), RefreshScope::Campaign);
        assert_eq!(" TABLE ".parse::<RefreshScope>().unwrap(), RefreshScope::Table);
        assert!("everything".parse::<RefreshScope>().is_err());
    }
}
