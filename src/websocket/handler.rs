//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and manages the connection lifecycle.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::feed::DisplayFeed;
use super::hub::ConnectionHub;
use super::messages::{parse_campaign_topic, ClientMessage, ServerMessage};
use crate::api::AppState;

/// WebSocket upgrade handler
///
/// This is the entry point for WebSocket connections.
/// It upgrades the HTTP connection to WebSocket and starts message handling.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// One connection: its hub id, outgoing channel and followed campaigns
struct Session {
    state: Arc<AppState>,
    connection_id: String,
    sender: mpsc::UnboundedSender<ServerMessage>,
    feeds: HashMap<Uuid, DisplayFeed>,
}

impl Session {
    fn hub(&self) -> &ConnectionHub {
        &self.state.ws_hub
    }

    async fn reply(&self, message: ServerMessage) {
        let _ = self.hub().send_to(&self.connection_id, message).await;
    }

    async fn reply_error(&self, message: impl Into<String>) {
        self.reply(ServerMessage::Error {
            message: message.into(),
        })
        .await;
    }

    fn follow(&mut self, campaign_id: Uuid) {
        if self.feeds.contains_key(&campaign_id) {
            return;
        }
        let feed = DisplayFeed::start(
            Arc::clone(&self.state.aggregator),
            Arc::clone(&self.state.store),
            campaign_id,
            self.state.config.scope,
            self.state.config.overlay,
            self.sender.clone(),
        );
        self.feeds.insert(campaign_id, feed);
        tracing::debug!(
            connection_id = %self.connection_id,
            campaign_id = %campaign_id,
            "Following campaign"
        );
    }
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let hub = Arc::clone(&state.ws_hub);

    // Create channel for sending messages to this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let connection_id = match hub.register(tx.clone()).await {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(error = %e, "Failed to register WebSocket connection");
            let error_msg = ServerMessage::Error {
                message: e.to_string(),
            };
            if let Ok(text) = serde_json::to_string(&error_msg) {
                let _ = sender.send(Message::Text(text)).await;
            }
            return;
        }
    };

    // Connected goes through the channel so it precedes anything a feed sends
    let _ = tx.send(ServerMessage::Connected {
        connection_id: connection_id.clone(),
    });

    let conn_id_for_send = connection_id.clone();

    // Task to forward messages from channel to WebSocket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if sender.send(Message::Text(text)).await.is_err() {
                        tracing::debug!(
                            connection_id = %conn_id_for_send,
                            "WebSocket send failed, closing connection"
                        );
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize message");
                }
            }
        }
    });

    let mut session = Session {
        state: Arc::clone(&state),
        connection_id: connection_id.clone(),
        sender: tx,
        feeds: HashMap::new(),
    };

    // Task to receive messages from WebSocket and handle them
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(msg) => {
                    if !handle_ws_message(&mut session, msg).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %session.connection_id,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
            }
        }
        // Feeds are dropped with the session
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    hub.unregister(&connection_id).await;
}

/// Handle a received WebSocket message
///
/// Returns false if the connection should be closed.
async fn handle_ws_message(session: &mut Session, message: Message) -> bool {
    match message {
        Message::Text(text) => {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_client_message(session, client_msg).await,
                Err(e) => {
                    tracing::debug!(
                        connection_id = %session.connection_id,
                        error = %e,
                        text = %text,
                        "Invalid client message"
                    );
                    session
                        .reply_error(format!("Invalid message format: {}", e))
                        .await;
                }
            }
            true
        }
        Message::Binary(_) => {
            session.reply_error("Binary messages not supported").await;
            true
        }
        // Axum answers pings itself
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            tracing::debug!(connection_id = %session.connection_id, "Client requested close");
            false
        }
    }
}

/// Handle a parsed client message
async fn handle_client_message(session: &mut Session, message: ClientMessage) {
    match message {
        ClientMessage::Subscribe { topics } => {
            match session.hub().subscribe(&session.connection_id, topics).await {
                Ok(subscribed) => {
                    session
                        .reply(ServerMessage::Subscribed {
                            topics: subscribed.clone(),
                        })
                        .await;
                    for campaign_id in subscribed.iter().filter_map(|t| parse_campaign_topic(t)) {
                        session.follow(campaign_id);
                    }
                }
                Err(e) => {
                    tracing::error!(
                        connection_id = %session.connection_id,
                        error = %e,
                        "Subscribe error"
                    );
                    session.reply_error(e.to_string()).await;
                }
            }
        }
        ClientMessage::Unsubscribe { topics } => {
            match session
                .hub()
                .unsubscribe(&session.connection_id, topics)
                .await
            {
                Ok(unsubscribed) => {
                    for campaign_id in unsubscribed.iter().filter_map(|t| parse_campaign_topic(t)) {
                        session.feeds.remove(&campaign_id);
                    }
                    session
                        .reply(ServerMessage::Unsubscribed {
                            topics: unsubscribed,
                        })
                        .await;
                }
                Err(e) => {
                    tracing::error!(
                        connection_id = %session.connection_id,
                        error = %e,
                        "Unsubscribe error"
                    );
                    session.reply_error(e.to_string()).await;
                }
            }
        }
        ClientMessage::Refresh { campaign_id } => match campaign_id {
            Some(id) => match session.feeds.get(&id) {
                Some(feed) => feed.refresh(),
                None => {
                    session
                        .reply_error(format!("Not following campaign {}", id))
                        .await
                }
            },
            None => session.feeds.values().for_each(DisplayFeed::refresh),
        },
        ClientMessage::Ping => session.reply(ServerMessage::Pong).await,
    }
}
