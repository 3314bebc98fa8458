//! Celebration notifications and the self-dismissing overlay

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::LiveConfig;

/// Kind of celebration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Overtake,
    IndividualGoal,
    TeamGoal,
}

impl NotificationKind {
    pub fn title(&self) -> &'static str {
        match self {
            NotificationKind::Overtake => "Ultrapassagem!",
            NotificationKind::IndividualGoal => "Meta Atingida!",
            NotificationKind::TeamGoal => "Meta da Equipe Alcançada!",
        }
    }
}

/// A celebration shown over the display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller_name: Option<String>,
}

impl Notification {
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: kind.title().to_string(),
            message: message.into(),
            seller_id: None,
            seller_name: None,
        }
    }

    pub fn with_seller(mut self, id: Uuid, name: impl Into<String>) -> Self {
        self.seller_id = Some(id);
        self.seller_name = Some(name.into());
        self
    }
}

/// Overlay phase of the notification on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayPhase {
    Visible,
    Fading,
}

/// What the overlay renders right now
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayView {
    pub notification: Notification,
    pub phase: OverlayPhase,
    /// Notifications waiting behind this one
    pub queued: usize,
}

/// How long a notification stays up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayTiming {
    pub visible: Duration,
    pub fade: Duration,
}

impl OverlayTiming {
    fn total(&self) -> Duration {
        self.visible + self.fade
    }
}

impl Default for OverlayTiming {
    fn default() -> Self {
        Self {
            visible: Duration::from_millis(4000),
            fade: Duration::from_millis(300),
        }
    }
}

impl From<&LiveConfig> for OverlayTiming {
    fn from(config: &LiveConfig) -> Self {
        Self {
            visible: Duration::from_millis(config.notification_visible_ms),
            fade: Duration::from_millis(config.notification_fade_ms),
        }
    }
}

/// Queue of notifications shown one at a time
///
/// Each notification is visible for `timing.visible`, fades for
/// `timing.fade` and is then replaced by the next queued one. Time is
/// passed in explicitly so callers drive it from their own clock.
#[derive(Debug)]
pub struct NotificationOverlay {
    timing: OverlayTiming,
    current: Option<(Notification, Instant)>,
    queue: VecDeque<Notification>,
}

impl NotificationOverlay {
    pub fn new(timing: OverlayTiming) -> Self {
        Self {
            timing,
            current: None,
            queue: VecDeque::new(),
        }
    }

    /// Enqueue a notification; shown immediately when the overlay is idle
    pub fn push(&mut self, notification: Notification, now: Instant) {
        self.tick(now);
        if self.current.is_none() {
            self.current = Some((notification, now));
        } else {
            self.queue.push_back(notification);
        }
    }

    /// Advance past expired notifications. Returns true if the view changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = false;
        while let Some((_, shown_at)) = &self.current {
            let expires = *shown_at + self.timing.total();
            if now < expires {
                break;
            }
            // The next one starts when the previous one ended
            self.current = self.queue.pop_front().map(|n| (n, expires));
            changed = true;
        }
        changed
    }

    /// Overlay contents at `now`, `None` when cleared
    pub fn view(&self, now: Instant) -> Option<OverlayView> {
        let (notification, shown_at) = self.current.as_ref()?;
        let elapsed = now.saturating_duration_since(*shown_at);

        let phase = if elapsed < self.timing.visible {
            OverlayPhase::Visible
        } else if elapsed < self.timing.total() {
            OverlayPhase::Fading
        } else {
            return None;
        };

        Some(OverlayView {
            notification: notification.clone(),
            phase,
            queued: self.queue.len(),
        })
    }

    /// Next instant at which the view changes phase
    pub fn next_deadline(&self, now: Instant) -> Option<Instant> {
        let (_, shown_at) = self.current.as_ref()?;
        let fade_at = *shown_at + self.timing.visible;
        if now < fade_at {
            Some(fade_at)
        } else {
            Some(*shown_at + self.timing.total())
        }
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.queue.clear();
    }
}

impl Default for NotificationOverlay {
    fn default() -> Self {
        Self::new(OverlayTiming::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn goal(name: &str) -> Notification {
        Notification::new(NotificationKind::IndividualGoal, format!("{} atingiu a meta!", name))
    }

    #[test]
    fn test_titles() {
        assert_eq!(goal("Ana").title, "Meta Atingida!");
        assert_eq!(NotificationKind::Overtake.title(), "Ultrapassagem!");
        assert_eq!(NotificationKind::TeamGoal.title(), "Meta da Equipe Alcançada!");
    }

    #[test]
    fn test_visible_fading_cleared() {
        let start = Instant::now();
        let mut overlay = NotificationOverlay::default();
        overlay.push(goal("Ana"), start);

        assert_eq!(overlay.view(start).unwrap().phase, OverlayPhase::Visible);
        assert_eq!(overlay.view(start + ms(3999)).unwrap().phase, OverlayPhase::Visible);
        assert_eq!(overlay.view(start + ms(4000)).unwrap().phase, OverlayPhase::Fading);
        assert_eq!(overlay.view(start + ms(4299)).unwrap().phase, OverlayPhase::Fading);
        assert!(overlay.view(start + ms(4300)).is_none());

        assert!(overlay.tick(start + ms(4300)));
        assert!(overlay.is_idle());
        assert!(!overlay.tick(start + ms(5000)));
    }

    #[test]
    fn test_queue_shows_in_order() {
        let start = Instant::now();
        let mut overlay = NotificationOverlay::default();
        overlay.push(goal("Ana"), start);
        overlay.push(goal("Carlos"), start + ms(100));

        let view = overlay.view(start + ms(100)).unwrap();
        assert_eq!(view.notification.message, "Ana atingiu a meta!");
        assert_eq!(view.queued, 1);

        overlay.tick(start + ms(4300));
        let view = overlay.view(start + ms(4300)).unwrap();
        assert_eq!(view.notification.message, "Carlos atingiu a meta!");
        assert_eq!(view.phase, OverlayPhase::Visible);
        assert_eq!(view.queued, 0);

        overlay.tick(start + ms(8600));
        assert!(overlay.is_idle());
    }

    #[test]
    fn test_deadlines() {
        let start = Instant::now();
        let mut overlay = NotificationOverlay::default();
        assert!(overlay.next_deadline(start).is_none());

        overlay.push(goal("Ana"), start);
        assert_eq!(overlay.next_deadline(start), Some(start + ms(4000)));
        assert_eq!(overlay.next_deadline(start + ms(4100)), Some(start + ms(4300)));
    }

    #[test]
    fn test_custom_timing() {
        let config = LiveConfig {
            notification_visible_ms: 10,
            notification_fade_ms: 5,
            ..Default::default()
        };
        let start = Instant::now();
        let mut overlay = NotificationOverlay::new(OverlayTiming::from(&config));
        overlay.push(goal("Ana"), start);

        assert_eq!(overlay.view(start + ms(12)).unwrap().phase, OverlayPhase::Fading);
        assert!(overlay.view(start + ms(15)).is_none());
    }
}
