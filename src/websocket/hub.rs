//! WebSocket Connection Hub
//!
//! Manages all WebSocket connections, topic subscriptions and fan-out of
//! sale events to subscribers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::messages::{parse_campaign_topic, ServerMessage, WsEvent};
use crate::store::SaleChange;

/// Unique identifier for a WebSocket connection
pub type ConnectionId = String;

/// Manages all WebSocket connections and subscriptions
pub struct ConnectionHub {
    /// Active connections: ConnectionId → ConnectionHandle
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
    /// Topic subscriptions: Topic → Set of ConnectionIds
    subscriptions: RwLock<HashMap<String, HashSet<ConnectionId>>>,
    config: HubConfig,
}

/// Configuration for the connection hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum number of concurrent connections
    pub max_connections: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections: 1000,
        }
    }
}

/// Handle for sending messages to a specific connection
pub struct ConnectionHandle {
    /// Channel sender for this connection
    pub sender: mpsc::UnboundedSender<ServerMessage>,
    /// Topics this connection is subscribed to
    pub subscriptions: HashSet<String>,
}

impl ConnectionHub {
    /// Create a new connection hub
    pub fn new(config: HubConfig) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            subscriptions: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Register a new WebSocket connection
    ///
    /// Returns the connection ID on success, or an error if the connection
    /// limit has been reached.
    pub async fn register(
        &self,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) -> Result<ConnectionId, HubError> {
        let mut connections = self.connections.write().await;
        if connections.len() >= self.config.max_connections {
            return Err(HubError::TooManyConnections(self.config.max_connections));
        }

        let id = Uuid::new_v4().to_string();
        connections.insert(
            id.clone(),
            ConnectionHandle {
                sender,
                subscriptions: HashSet::new(),
            },
        );

        tracing::info!(connection_id = %id, "WebSocket connected");
        Ok(id)
    }

    /// Unregister a connection and clean up its subscriptions
    pub async fn unregister(&self, id: &str) {
        let handle = self.connections.write().await.remove(id);

        if let Some(handle) = handle {
            let mut subs = self.subscriptions.write().await;
            for topic in handle.subscriptions {
                if let Some(subscribers) = subs.get_mut(&topic) {
                    subscribers.remove(id);
                    if subscribers.is_empty() {
                        subs.remove(&topic);
                    }
                }
            }
        }

        tracing::info!(connection_id = %id, "WebSocket disconnected");
    }

    /// Subscribe a connection to topics
    ///
    /// Invalid topics are skipped; the accepted ones are returned.
    pub async fn subscribe(
        &self,
        id: &str,
        topics: Vec<String>,
    ) -> Result<Vec<String>, HubError> {
        let mut connections = self.connections.write().await;
        let handle = connections
            .get_mut(id)
            .ok_or(HubError::ConnectionNotFound)?;

        let mut subs = self.subscriptions.write().await;
        let mut subscribed = Vec::new();

        for topic in topics {
            if !is_valid_topic(&topic) {
                tracing::warn!(topic = %topic, "Invalid topic ignored");
                continue;
            }

            handle.subscriptions.insert(topic.clone());
            subs.entry(topic.clone())
                .or_default()
                .insert(id.to_string());

            subscribed.push(topic);
        }

        tracing::debug!(
            connection_id = %id,
            topics = ?subscribed,
            "Subscribed to topics"
        );

        Ok(subscribed)
    }

    /// Unsubscribe a connection from topics
    pub async fn unsubscribe(
        &self,
        id: &str,
        topics: Vec<String>,
    ) -> Result<Vec<String>, HubError> {
        let mut connections = self.connections.write().await;
        let handle = connections
            .get_mut(id)
            .ok_or(HubError::ConnectionNotFound)?;

        let mut subs = self.subscriptions.write().await;
        let mut unsubscribed = Vec::new();

        for topic in topics {
            if handle.subscriptions.remove(&topic) {
                if let Some(subscribers) = subs.get_mut(&topic) {
                    subscribers.remove(id);
                    if subscribers.is_empty() {
                        subs.remove(&topic);
                    }
                }
                unsubscribed.push(topic);
            }
        }

        tracing::debug!(
            connection_id = %id,
            topics = ?unsubscribed,
            "Unsubscribed from topics"
        );

        Ok(unsubscribed)
    }

    /// Send an event to all subscribers of its topic
    ///
    /// `campaign.*` subscribers receive every `campaign.{id}` event.
    /// Returns the number of connections reached.
    pub async fn publish(&self, event: &WsEvent) -> usize {
        let subs = self.subscriptions.read().await;
        let connections = self.connections.read().await;

        let direct = subs.get(&event.topic);
        let wildcard = event
            .topic
            .split('.')
            .next()
            .filter(|_| event.topic.contains('.'))
            .and_then(|prefix| subs.get(&format!("{}.*", prefix)));

        let recipients: HashSet<&ConnectionId> = direct
            .into_iter()
            .chain(wildcard)
            .flat_map(|ids| ids.iter())
            .collect();

        let mut sent = 0;
        for id in recipients {
            if let Some(handle) = connections.get(id) {
                if handle.sender.send(event.message.clone()).is_ok() {
                    sent += 1;
                }
            }
        }

        if sent > 0 {
            tracing::trace!(topic = %event.topic, subscribers = sent, "Published event");
        }
        sent
    }

    /// Send a message directly to a specific connection
    pub async fn send_to(&self, id: &str, message: ServerMessage) -> Result<(), HubError> {
        let connections = self.connections.read().await;
        let handle = connections.get(id).ok_or(HubError::ConnectionNotFound)?;

        handle
            .sender
            .send(message)
            .map_err(|_| HubError::SendFailed)
    }

    /// Forward store sale changes to `campaign.{id}` subscribers
    pub fn forward_sales(
        self: Arc<Self>,
        mut changes: broadcast::Receiver<SaleChange>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        self.publish(&WsEvent::sale(&change)).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Sale forwarder lagged behind store changes");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        self.publish(&WsEvent::system_error("Sale change stream closed"))
                            .await;
                        break;
                    }
                }
            }
        })
    }

    /// Get the current connection count
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Get subscription count for a topic
    pub async fn subscription_count(&self, topic: &str) -> usize {
        self.subscriptions
            .read()
            .await
            .get(topic)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}

/// Valid topics: `campaign.*`, `campaign.{uuid}` and `system`
pub fn is_valid_topic(topic: &str) -> bool {
    topic == "system"
        || topic == "campaign.*"
        || parse_campaign_topic(topic).is_some()
}

/// Errors that can occur in the connection hub
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Too many connections (limit: {0})")]
    TooManyConnections(usize),

    #[error("Connection not found")]
    ConnectionNotFound,

    #[error("Failed to send message")]
    SendFailed,
}
