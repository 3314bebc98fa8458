//! WebSocket Message Types
//!
//! Defines all message types for WebSocket communication between
//! display clients and the Podium server.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::display::{Notification, Scoreboard};
use crate::store::{ChangeKind, SaleChange};

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to topics for real-time updates
    Subscribe {
        /// Topics to subscribe to (e.g., "campaign.{id}", "campaign.*")
        topics: Vec<String>,
    },
    /// Unsubscribe from topics
    Unsubscribe {
        /// Topics to unsubscribe from
        topics: Vec<String>,
    },
    /// Recompute the displayed rankings now
    Refresh {
        /// Only this campaign; every followed campaign when absent
        #[serde(default)]
        campaign_id: Option<Uuid>,
    },
    /// Ping for keepalive
    Ping,
}

/// Whether a board message carries a scoreboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardStatus {
    Loading,
    NotFound,
    Ready,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Current display state of a followed campaign
    Board {
        campaign_id: Uuid,
        status: BoardStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        scoreboard: Option<Box<Scoreboard>>,
    },
    /// A celebration for a followed campaign
    Notification {
        campaign_id: Uuid,
        notification: Notification,
    },
    /// A sale was inserted, updated or deleted
    SaleRecorded {
        kind: ChangeKind,
        sale_id: Uuid,
        campaign_id: Uuid,
        seller_id: Uuid,
    },
    /// Subscription confirmed
    Subscribed {
        /// Topics successfully subscribed to
        topics: Vec<String>,
    },
    /// Unsubscription confirmed
    Unsubscribed {
        /// Topics successfully unsubscribed from
        topics: Vec<String>,
    },
    /// Pong response to ping
    Pong,
    /// Error message
    Error {
        /// Error description
        message: String,
    },
    /// Connection established
    Connected {
        /// Unique connection identifier
        connection_id: String,
    },
}

impl ServerMessage {
    pub fn board_pending(campaign_id: Uuid, status: BoardStatus) -> Self {
        ServerMessage::Board {
            campaign_id,
            status,
            scoreboard: None,
        }
    }

    pub fn board_ready(scoreboard: Scoreboard) -> Self {
        ServerMessage::Board {
            campaign_id: scoreboard.campaign_id,
            status: BoardStatus::Ready,
            scoreboard: Some(Box::new(scoreboard)),
        }
    }
}

/// Topic prefix for campaign events
pub const CAMPAIGN_TOPIC_PREFIX: &str = "campaign.";

/// `campaign.{id}`
pub fn campaign_topic(campaign_id: Uuid) -> String {
    format!("{}{}", CAMPAIGN_TOPIC_PREFIX, campaign_id)
}

/// Campaign id of a `campaign.{id}` topic
pub fn parse_campaign_topic(topic: &str) -> Option<Uuid> {
    topic
        .strip_prefix(CAMPAIGN_TOPIC_PREFIX)
        .and_then(|id| Uuid::parse_str(id).ok())
}

/// Internal event for broadcasting through the hub
#[derive(Debug, Clone)]
pub struct WsEvent {
    /// Topic this event belongs to (e.g., "campaign.{id}")
    pub topic: String,
    /// The message to send to subscribers
    pub message: ServerMessage,
}

impl WsEvent {
    /// Create a sale event from a store change
    pub fn sale(change: &SaleChange) -> Self {
        Self {
            topic: campaign_topic(change.campaign_id),
            message: ServerMessage::SaleRecorded {
                kind: change.kind,
                sale_id: change.sale_id,
                campaign_id: change.campaign_id,
                seller_id: change.seller_id,
            },
        }
    }

    /// Create a system error event
    pub fn system_error(message: &str) -> Self {
        Self {
            topic: "system".to_string(),
            message: ServerMessage::Error {
                message: message.to_string(),
            },
        }
    }
}
