//! Celebration detection between consecutive rankings

use std::collections::HashMap;
use uuid::Uuid;

use super::format::format_value;
use super::notification::{Notification, NotificationKind};
use crate::ranking::{RankedEntry, Ranking};

/// Notifications for what changed from `prev` to `next`
///
/// - `overtake`: a participant whose total grew now ranks above someone
///   who was ahead of them
/// - `individual_goal`: a participant crossed their own goal
/// - `team_goal`: the team total crossed the team goal
///
/// Rankings of different campaigns never celebrate.
pub fn detect(prev: &Ranking, next: &Ranking) -> Vec<Notification> {
    if prev.campaign.id != next.campaign.id {
        return Vec::new();
    }

    let before: HashMap<Uuid, &RankedEntry> =
        prev.entries.iter().map(|e| (e.seller_id, e)).collect();
    let mut notifications = Vec::new();

    for entry in &next.entries {
        let Some(old) = before.get(&entry.seller_id) else {
            continue;
        };
        if entry.value <= old.value || entry.rank >= old.rank {
            continue;
        }

        // Closest rival that was ahead before and is behind now
        let passed = next
            .entries
            .iter()
            .filter(|other| other.rank > entry.rank)
            .find(|other| {
                before
                    .get(&other.seller_id)
                    .is_some_and(|prev_other| prev_other.rank < old.rank)
            });

        if let Some(passed) = passed {
            notifications.push(
                Notification::new(
                    NotificationKind::Overtake,
                    format!(
                        "{} ultrapassou {} e agora está em {}º lugar!",
                        entry.name, passed.name, entry.rank
                    ),
                )
                .with_seller(entry.seller_id, entry.name.clone()),
            );
        }
    }

    for entry in &next.entries {
        let reached_before = before
            .get(&entry.seller_id)
            .map_or(true, |old| old.goal_reached());
        if entry.goal_reached() && !reached_before {
            notifications.push(
                Notification::new(
                    NotificationKind::IndividualGoal,
                    format!("{} atingiu a meta individual!", entry.name),
                )
                .with_seller(entry.seller_id, entry.name.clone()),
            );
        }
    }

    if next.team_goal_reached() && !prev.team_goal_reached() {
        let goal = next.campaign.team_goal.unwrap_or_default();
        notifications.push(Notification::new(
            NotificationKind::TeamGoal,
            format!(
                "A equipe atingiu a meta de {}!",
                format_value(goal, next.campaign.metric_type)
            ),
        ));
    }

    notifications
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::TieBreak;
    use crate::store::NewCampaign;

    struct Board {
        campaign: crate::store::Campaign,
        ids: Vec<Uuid>,
    }

    impl Board {
        fn new(team_goal: Option<f64>) -> Self {
            let campaign = NewCampaign {
                name: "Outubro".to_string(),
                team_goal,
                ..Default::default()
            }
            .into_campaign();
            Self {
                campaign,
                ids: (0..4).map(|_| Uuid::new_v4()).collect(),
            }
        }

        fn rank(&self, values: [f64; 4]) -> Ranking {
            let names = ["A", "B", "C", "D"];
            let entries = names
                .iter()
                .zip(values)
                .zip(&self.ids)
                .map(|((name, value), id)| RankedEntry::new(*id, *name, value, Some(150_000.0)))
                .collect();
            Ranking::new(self.campaign.clone(), entries, TieBreak::FetchOrder)
        }
    }

    #[test]
    fn test_overtake() {
        let board = Board::new(None);
        let prev = board.rank([100_000.0, 90_000.0, 80_000.0, 70_000.0]);
        let next = board.rank([100_000.0, 90_000.0, 95_000.0, 70_000.0]);

        let notifications = detect(&prev, &next);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::Overtake);
        assert_eq!(notifications[0].title, "Ultrapassagem!");
        assert_eq!(notifications[0].seller_name.as_deref(), Some("C"));
        assert_eq!(
            notifications[0].message,
            "C ultrapassou B e agora está em 2º lugar!"
        );
    }

    #[test]
    fn test_overtaking_several_names_the_closest() {
        let board = Board::new(None);
        let prev = board.rank([100_000.0, 90_000.0, 80_000.0, 70_000.0]);
        let next = board.rank([100_000.0, 90_000.0, 80_000.0, 120_000.0]);

        let notifications = detect(&prev, &next);
        assert_eq!(notifications.len(), 1);
        assert_eq!(
            notifications[0].message,
            "D ultrapassou A e agora está em 1º lugar!"
        );
    }

    #[test]
    fn test_individual_goal() {
        let board = Board::new(None);
        let prev = board.rank([140_000.0, 20_000.0, 10_000.0, 5_000.0]);
        let next = board.rank([150_000.0, 20_000.0, 10_000.0, 5_000.0]);

        let notifications = detect(&prev, &next);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::IndividualGoal);
        assert_eq!(notifications[0].message, "A atingiu a meta individual!");

        // Already reached: no repeat
        let later = board.rank([160_000.0, 20_000.0, 10_000.0, 5_000.0]);
        assert!(detect(&next, &later).is_empty());
    }

    #[test]
    fn test_team_goal() {
        let board = Board::new(Some(300_000.0));
        let prev = board.rank([100_000.0, 90_000.0, 80_000.0, 0.0]);
        let next = board.rank([100_000.0, 90_000.0, 80_000.0, 40_000.0]);

        let notifications = detect(&prev, &next);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::TeamGoal);
        assert_eq!(notifications[0].message, "A equipe atingiu a meta de R$ 300.000!");
    }

    #[test]
    fn test_unchanged_ranking_is_quiet() {
        let board = Board::new(Some(1_000_000.0));
        let prev = board.rank([100_000.0, 90_000.0, 80_000.0, 70_000.0]);
        let next = board.rank([100_000.0, 90_000.0, 80_000.0, 70_000.0]);
        assert!(detect(&prev, &next).is_empty());
    }

    #[test]
    fn test_different_campaigns_are_quiet() {
        let prev = Board::new(None).rank([0.0, 0.0, 0.0, 0.0]);
        let next = Board::new(None).rank([200_000.0, 0.0, 0.0, 0.0]);
        assert!(detect(&prev, &next).is_empty());
    }
}
