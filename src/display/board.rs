//! Scoreboard view model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::format::{format_period, format_value, Progress};
use super::notification::OverlayView;
use crate::ranking::{RankedEntry, Ranking};
use crate::store::MetricType;

const AVATAR_FALLBACK_BASE: &str = "https://api.dicebear.com/7.x/avataaars/svg";

/// Everything a renderer needs to draw the display screen
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scoreboard {
    pub campaign_id: Uuid,
    pub header: Header,
    /// Ranks 1-3 in visual order, left to right
    pub podium: Vec<PodiumSlot>,
    /// Ranks 4 and below
    pub list: Vec<ListRow>,
    pub overlay: Option<OverlayView>,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Header {
    pub campaign_name: String,
    pub period: Option<String>,
    pub metric_type: MetricType,
    pub team_total: f64,
    pub team_total_label: String,
    pub team_goal: Option<f64>,
    /// `Meta da Equipe: R$ 1.000.000`
    pub team_goal_label: Option<String>,
    pub team_progress: Option<ProgressView>,
}

/// Goal progress with its rendered label
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressView {
    /// Rounded, unclamped
    pub percent: i64,
    /// Clamped to [0, 100]
    pub bar: f64,
    pub label: String,
}

impl ProgressView {
    fn team(progress: Progress) -> Self {
        Self {
            percent: progress.percent,
            bar: progress.bar,
            label: progress.label(),
        }
    }

    fn individual(progress: Progress) -> Self {
        Self {
            percent: progress.percent,
            bar: progress.bar,
            label: format!("{} da meta", progress.label()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PodiumColumn {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PodiumHeight {
    Tallest,
    Tall,
    Short,
}

impl PodiumHeight {
    fn for_rank(rank: usize) -> Self {
        match rank {
            1 => PodiumHeight::Tallest,
            2 => PodiumHeight::Tall,
            _ => PodiumHeight::Short,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PodiumSlot {
    pub rank: usize,
    /// `1º`
    pub badge: String,
    pub column: PodiumColumn,
    pub height: PodiumHeight,
    /// Rank 1 gets the trophy and the gold border
    pub highlighted: bool,
    pub seller_id: Uuid,
    pub name: String,
    pub avatar_url: String,
    pub value: f64,
    pub value_label: String,
    pub prize: Option<String>,
    pub progress: Option<ProgressView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListRow {
    pub rank: usize,
    pub badge: String,
    pub seller_id: Uuid,
    pub name: String,
    pub avatar_url: String,
    pub value: f64,
    pub value_label: String,
    pub progress: Option<ProgressView>,
}

/// Build the scoreboard for a ranking and the current overlay
pub fn compose(ranking: &Ranking, overlay: Option<OverlayView>) -> Scoreboard {
    let campaign = &ranking.campaign;
    let metric = campaign.metric_type;

    let header = Header {
        campaign_name: campaign.name.clone(),
        period: format_period(campaign.start_date, campaign.end_date),
        metric_type: metric,
        team_total: ranking.team_total,
        team_total_label: format_value(ranking.team_total, metric),
        team_goal: campaign.team_goal,
        team_goal_label: campaign
            .team_goal
            .filter(|g| *g > 0.0)
            .map(|g| format!("Meta da Equipe: {}", format_value(g, metric))),
        team_progress: Progress::of(ranking.team_total, campaign.team_goal).map(ProgressView::team),
    };

    let top = ranking.podium();
    let ordered: Vec<(&RankedEntry, PodiumColumn)> = match top {
        [first, second, third] => vec![
            (second, PodiumColumn::Left),
            (first, PodiumColumn::Center),
            (third, PodiumColumn::Right),
        ],
        [first, second] => vec![(first, PodiumColumn::Left), (second, PodiumColumn::Right)],
        [only] => vec![(only, PodiumColumn::Center)],
        _ => Vec::new(),
    };

    let podium = ordered
        .into_iter()
        .map(|(entry, column)| PodiumSlot {
            rank: entry.rank,
            badge: badge(entry.rank),
            column,
            height: PodiumHeight::for_rank(entry.rank),
            highlighted: entry.rank == 1,
            seller_id: entry.seller_id,
            name: entry.name.clone(),
            avatar_url: avatar_url(entry),
            value: entry.value,
            value_label: format_value(entry.value, metric),
            prize: campaign.prizes.for_rank(entry.rank).map(str::to_string),
            progress: Progress::of(entry.value, entry.goal).map(ProgressView::individual),
        })
        .collect();

    let list = ranking
        .remainder()
        .iter()
        .map(|entry| ListRow {
            rank: entry.rank,
            badge: badge(entry.rank),
            seller_id: entry.seller_id,
            name: entry.name.clone(),
            avatar_url: avatar_url(entry),
            value: entry.value,
            value_label: format_value(entry.value, metric),
            progress: Progress::of(entry.value, entry.goal).map(ProgressView::individual),
        })
        .collect();

    Scoreboard {
        campaign_id: campaign.id,
        header,
        podium,
        list,
        overlay,
        computed_at: ranking.computed_at,
    }
}

/// `4º`
pub fn badge(rank: usize) -> String {
    format!("{}º", rank)
}

/// Stored avatar, or a generated one seeded by the seller name
pub fn avatar_url(entry: &RankedEntry) -> String {
    match entry.avatar_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => fallback_avatar(&entry.name),
    }
}

pub fn fallback_avatar(name: &str) -> String {
    format!("{}?seed={}", AVATAR_FALLBACK_BASE, urlencoding::encode(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::notification::{Notification, NotificationKind, OverlayPhase};
    use crate::ranking::TieBreak;
    use crate::store::{NewCampaign, Prizes};
    use chrono::NaiveDate;

    fn sample(values: &[(&str, f64)], team_goal: Option<f64>) -> Ranking {
        let campaign = NewCampaign {
            name: "Campanha de Outubro".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 10, 1),
            end_date: NaiveDate::from_ymd_opt(2026, 10, 31),
            team_goal,
            prizes: Prizes {
                first: Some("Viagem".to_string()),
                second: Some("TV".to_string()),
                third: None,
            },
            ..Default::default()
        }
        .into_campaign();

        let entries = values
            .iter()
            .map(|(name, value)| RankedEntry::new(Uuid::new_v4(), *name, *value, Some(150_000.0)))
            .collect();
        Ranking::new(campaign, entries, TieBreak::FetchOrder)
    }

    #[test]
    fn test_podium_visual_order() {
        let ranking = sample(
            &[("D", 142_000.0), ("B", 172_000.0), ("A", 185_000.0), ("C", 158_000.0)],
            Some(1_000_000.0),
        );
        let board = compose(&ranking, None);

        let names: Vec<&str> = board.podium.iter().map(|s| s.name.as_str()).collect();
        let badges: Vec<&str> = board.podium.iter().map(|s| s.badge.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "C"]);
        assert_eq!(badges, vec!["2º", "1º", "3º"]);
        assert_eq!(
            board.podium.iter().map(|s| s.column).collect::<Vec<_>>(),
            vec![PodiumColumn::Left, PodiumColumn::Center, PodiumColumn::Right]
        );
        assert_eq!(
            board.podium.iter().map(|s| s.height).collect::<Vec<_>>(),
            vec![PodiumHeight::Tall, PodiumHeight::Tallest, PodiumHeight::Short]
        );
        assert!(board.podium[1].highlighted);
        assert!(!board.podium[0].highlighted);
        assert_eq!(board.podium[1].prize.as_deref(), Some("Viagem"));
        assert!(board.podium[2].prize.is_none());

        assert_eq!(board.list.len(), 1);
        assert_eq!(board.list[0].name, "D");
        assert_eq!(board.list[0].badge, "4º");

        assert_eq!(board.header.team_total, 657_000.0);
        assert_eq!(board.header.team_total_label, "R$ 657.000");
    }

    #[test]
    fn test_progress_label_and_clamp() {
        let ranking = sample(&[("A", 185_000.0)], None);
        let board = compose(&ranking, None);

        let progress = board.podium[0].progress.as_ref().unwrap();
        assert_eq!(progress.percent, 123);
        assert_eq!(progress.bar, 100.0);
        assert_eq!(progress.label, "123% da meta");
    }

    #[test]
    fn test_fewer_than_three_in_rank_order() {
        let ranking = sample(&[("B", 10.0), ("A", 20.0)], None);
        let board = compose(&ranking, None);

        let names: Vec<&str> = board.podium.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(board.podium[0].badge, "1º");
        assert!(board.list.is_empty());

        let single = compose(&sample(&[("A", 1.0)], None), None);
        assert_eq!(single.podium[0].column, PodiumColumn::Center);

        let empty = compose(&sample(&[], None), None);
        assert!(empty.podium.is_empty());
        assert_eq!(empty.header.team_total_label, "R$ 0");
    }

    #[test]
    fn test_header() {
        let board = compose(&sample(&[("A", 250_000.0)], Some(1_000_000.0)), None);

        assert_eq!(board.header.campaign_name, "Campanha de Outubro");
        assert_eq!(board.header.period.as_deref(), Some("01/10/2026 - 31/10/2026"));
        assert_eq!(
            board.header.team_goal_label.as_deref(),
            Some("Meta da Equipe: R$ 1.000.000")
        );
        let progress = board.header.team_progress.unwrap();
        assert_eq!(progress.percent, 25);
        assert_eq!(progress.label, "25%");

        let no_goal = compose(&sample(&[("A", 250_000.0)], None), None);
        assert!(no_goal.header.team_progress.is_none());
        assert!(no_goal.header.team_goal_label.is_none());

        let zero_goal = compose(&sample(&[("A", 250_000.0)], Some(0.0)), None);
        assert!(zero_goal.header.team_progress.is_none());
    }

    #[test]
    fn test_avatar_fallback() {
        let mut entry = RankedEntry::new(Uuid::new_v4(), "Carlos Silva", 0.0, None);
        assert_eq!(
            avatar_url(&entry),
            "https://api.dicebear.com/7.x/avataaars/svg?seed=Carlos%20Silva"
        );

        entry.avatar_url = Some("https://cdn.example.com/c.png".to_string());
        assert_eq!(avatar_url(&entry), "https://cdn.example.com/c.png");
    }

    #[test]
    fn test_overlay_passthrough() {
        let overlay = OverlayView {
            notification: Notification::new(NotificationKind::TeamGoal, "Meta!"),
            phase: OverlayPhase::Visible,
            queued: 0,
        };
        let board = compose(&sample(&[("A", 1.0)], None), Some(overlay.clone()));
        assert_eq!(board.overlay, Some(overlay));
    }
}
