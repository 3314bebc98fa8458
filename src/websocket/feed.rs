//! Live display feed
//!
//! Follows one campaign for one connection: every new ranking becomes a
//! `board` message, celebrations become `notification` messages and the
//! overlay inside the board advances on its own timers.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::messages::{BoardStatus, ServerMessage};
use crate::display::{compose, detect, NotificationOverlay, OverlayTiming};
use crate::live::{BoardState, LiveRanking, RefreshScope, Refresher};
use crate::ranking::{Ranking, RankingAggregator};
use crate::store::CampaignStore;

/// Per-connection display feed; stops when dropped
pub struct DisplayFeed {
    campaign_id: Uuid,
    refresher: Refresher,
    task: JoinHandle<()>,
}

impl DisplayFeed {
    pub fn start(
        aggregator: Arc<RankingAggregator>,
        store: Arc<dyn CampaignStore>,
        campaign_id: Uuid,
        scope: RefreshScope,
        timing: OverlayTiming,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) -> Self {
        let live = LiveRanking::spawn(aggregator, store, campaign_id, scope);
        let refresher = live.refresher();

        let worker = FeedWorker {
            campaign_id,
            sender,
            overlay: NotificationOverlay::new(timing),
            current: None,
            baseline: None,
        };
        let task = tokio::spawn(worker.run(live));

        Self {
            campaign_id,
            refresher,
            task,
        }
    }

    pub fn campaign_id(&self) -> Uuid {
        self.campaign_id
    }

    pub fn refresh(&self) {
        self.refresher.refresh();
    }
}

impl Drop for DisplayFeed {
    fn drop(&mut self) {
        // Aborting drops the LiveRanking, which releases the sale subscription
        self.task.abort();
    }
}

struct FeedWorker {
    campaign_id: Uuid,
    sender: mpsc::UnboundedSender<ServerMessage>,
    overlay: NotificationOverlay,
    /// Ranking on screen; `None` while loading or not found
    current: Option<Arc<Ranking>>,
    /// Last ready ranking, compared against the next one for celebrations
    baseline: Option<Arc<Ranking>>,
}

impl FeedWorker {
    async fn run(mut self, live: LiveRanking) {
        let mut state = live.watch();

        let initial = state.borrow_and_update().clone();
        if !self.on_state(initial) {
            return;
        }

        loop {
            let deadline = self.overlay.next_deadline(Instant::now());

            tokio::select! {
                changed = state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let next = state.borrow_and_update().clone();
                    if !self.on_state(next) {
                        break;
                    }
                }
                _ = sleep_until(deadline), if deadline.is_some() => {
                    self.overlay.tick(Instant::now());
                    if !self.send_board() {
                        break;
                    }
                }
            }
        }

        tracing::debug!(campaign_id = %self.campaign_id, "Display feed stopped");
        drop(live);
    }

    /// Returns false once the connection is gone
    fn on_state(&mut self, state: BoardState) -> bool {
        match state {
            BoardState::Loading => {
                self.withdraw();
                self.send(ServerMessage::board_pending(
                    self.campaign_id,
                    BoardStatus::Loading,
                ))
            }
            BoardState::NotFound => {
                self.withdraw();
                self.baseline = None;
                self.send(ServerMessage::board_pending(
                    self.campaign_id,
                    BoardStatus::NotFound,
                ))
            }
            BoardState::Ready(ranking) => {
                let now = Instant::now();
                if let Some(previous) = &self.baseline {
                    for notification in detect(previous, &ranking) {
                        if !self.send(ServerMessage::Notification {
                            campaign_id: self.campaign_id,
                            notification: notification.clone(),
                        }) {
                            return false;
                        }
                        self.overlay.push(notification, now);
                    }
                }
                self.baseline = Some(Arc::clone(&ranking));
                self.current = Some(ranking);
                self.send_board()
            }
        }
    }

    /// Take the ranking off screen so overlay timers cannot resend it
    fn withdraw(&mut self) {
        self.current = None;
        self.overlay.clear();
    }

    fn send_board(&self) -> bool {
        match &self.current {
            Some(ranking) => {
                let board = compose(ranking, self.overlay.view(Instant::now()));
                self.send(ServerMessage::board_ready(board))
            }
            None => true,
        }
    }

    fn send(&self, message: ServerMessage) -> bool {
        self.sender.send(message).is_ok()
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}
