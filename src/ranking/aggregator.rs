//! Ranking Aggregator
//!
//! Loads a campaign, its participants and every participant's sales,
//! folds the sales into totals and sorts the result. Totals are always a
//! fresh fold over the stored sales; nothing is cached between calls.

use chrono::{DateTime, Utc};
use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::store::{Campaign, CampaignStore, Participant, StoreError};

/// Order of participants with equal totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Keep the order participants were fetched in (selection order)
    #[default]
    FetchOrder,
    /// Lower participant id first
    ParticipantId,
}

/// One participant's position on the leaderboard
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedEntry {
    /// 1-based position
    pub rank: usize,
    pub seller_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Sum of the participant's sales
    pub value: f64,
    /// Individual goal, if the campaign has one
    #[serde(default)]
    pub goal: Option<f64>,
    /// Number of sales folded into `value`
    pub sales_count: usize,
}

impl RankedEntry {
    /// Unranked entry; `rank` is assigned by [`Ranking::new`]
    pub fn new(seller_id: Uuid, name: impl Into<String>, value: f64, goal: Option<f64>) -> Self {
        Self {
            rank: 0,
            seller_id,
            name: name.into(),
            avatar_url: None,
            value,
            goal,
            sales_count: 0,
        }
    }

    /// `value / goal * 100`, absent without a positive goal
    pub fn goal_progress(&self) -> Option<f64> {
        percent_of(self.value, self.goal)
    }

    /// Whether the individual goal has been reached
    pub fn goal_reached(&self) -> bool {
        matches!(self.goal, Some(goal) if goal > 0.0 && self.value >= goal)
    }
}

/// A computed leaderboard for one campaign
#[derive(Debug, Clone, Serialize)]
pub struct Ranking {
    pub campaign: Campaign,
    /// Entries sorted by value, highest first
    pub entries: Vec<RankedEntry>,
    /// Sum of all entry values
    pub team_total: f64,
    pub computed_at: DateTime<Utc>,
}

impl Ranking {
    /// Sort `entries`, assign ranks and compute the team total
    pub fn new(campaign: Campaign, mut entries: Vec<RankedEntry>, tie_break: TieBreak) -> Self {
        // slice::sort_by is stable, equal values keep fetch order
        match tie_break {
            TieBreak::FetchOrder => entries.sort_by(|a, b| b.value.total_cmp(&a.value)),
            TieBreak::ParticipantId => entries.sort_by(|a, b| {
                b.value
                    .total_cmp(&a.value)
                    .then_with(|| a.seller_id.cmp(&b.seller_id))
            }),
        }

        for (index, entry) in entries.iter_mut().enumerate() {
            entry.rank = index + 1;
        }

        let team_total = entries.iter().map(|e| e.value).sum();

        Self {
            campaign,
            entries,
            team_total,
            computed_at: Utc::now(),
        }
    }

    /// Ranks 1 to 3
    pub fn podium(&self) -> &[RankedEntry] {
        &self.entries[..self.entries.len().min(3)]
    }

    /// Ranks 4 and below
    pub fn remainder(&self) -> &[RankedEntry] {
        &self.entries[self.entries.len().min(3)..]
    }

    pub fn entry(&self, seller_id: Uuid) -> Option<&RankedEntry> {
        self.entries.iter().find(|e| e.seller_id == seller_id)
    }

    /// `team_total / team_goal * 100`, absent without a positive team goal
    pub fn team_progress(&self) -> Option<f64> {
        percent_of(self.team_total, self.campaign.team_goal)
    }

    pub fn team_goal_reached(&self) -> bool {
        matches!(self.campaign.team_goal, Some(goal) if goal > 0.0 && self.team_total >= goal)
    }
}

fn percent_of(value: f64, goal: Option<f64>) -> Option<f64> {
    goal.filter(|g| *g > 0.0).map(|g| value / g * 100.0)
}

/// Errors produced while computing a ranking
#[derive(Debug, Error)]
pub enum RankingError {
    /// The campaign does not exist
    #[error("Campaign not found: {0}")]
    NotFound(Uuid),

    /// A read from the store failed; no partial ranking is produced
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Computes rankings from a campaign store
pub struct RankingAggregator {
    store: Arc<dyn CampaignStore>,
    tie_break: TieBreak,
}

impl RankingAggregator {
    pub fn new(store: Arc<dyn CampaignStore>, tie_break: TieBreak) -> Self {
        Self { store, tie_break }
    }

    pub fn store(&self) -> &Arc<dyn CampaignStore> {
        &self.store
    }

    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    /// Compute the current ranking of a campaign
    pub async fn rank(&self, campaign_id: Uuid) -> Result<Ranking, RankingError> {
        let campaign = self
            .store
            .get_campaign(campaign_id)
            .await?
            .ok_or(RankingError::NotFound(campaign_id))?;

        let participants = self.store.list_participants(campaign_id).await?;

        // All fetches must finish before sorting; any failure fails the whole pass
        let totals = try_join_all(
            participants
                .iter()
                .map(|p| self.participant_total(campaign_id, p)),
        )
        .await?;

        let entries: Vec<RankedEntry> = participants
            .into_iter()
            .zip(totals)
            .map(|(participant, (value, sales_count))| RankedEntry {
                rank: 0,
                seller_id: participant.seller_id,
                name: participant.name,
                avatar_url: participant.avatar_url,
                value,
                goal: participant.individual_goal,
                sales_count,
            })
            .collect();

        let ranking = Ranking::new(campaign, entries, self.tie_break);

        tracing::debug!(
            campaign_id = %campaign_id,
            participants = ranking.entries.len(),
            team_total = ranking.team_total,
            "Computed ranking"
        );

        Ok(ranking)
    }

    async fn participant_total(
        &self,
        campaign_id: Uuid,
        participant: &Participant,
    ) -> Result<(f64, usize), StoreError> {
        let sales = self
            .store
            .list_sales(campaign_id, participant.seller_id)
            .await?;
        let total = sales.iter().map(|s| s.value).sum();
        Ok((total, sales.len()))
    }
}
