//! WebSocket Live Display
//!
//! Pushes live scoreboards and sale events to display clients.
//!
//! ## Architecture
//!
//! - **ConnectionHub**: Manages all active connections and topic subscriptions
//! - **DisplayFeed**: Follows one campaign for one connection
//! - **Handler**: Handles WebSocket upgrade and message processing
//! - **Messages**: Defines client and server message formats
//!
//! ## Usage
//!
//! Clients connect to `/ws` and can subscribe to topics:
//! - `campaign.{id}` - Live scoreboard and celebrations for one campaign,
//!   plus its sale events
//! - `campaign.*` - Sale events for all campaigns
//! - `system` - System events
//!
//! ## Example
//!
//! ```javascript
//! // Browser
//! const ws = new WebSocket('ws://localhost:8082/ws');
//!
//! ws.onopen = () => {
//!   ws.send(JSON.stringify({type: 'subscribe', topics: [`campaign.${campaignId}`]}));
//! };
//!
//! ws.onmessage = (event) => {
//!   const msg = JSON.parse(event.data);
//!   if (msg.type === 'board' && msg.status === 'ready') render(msg.scoreboard);
//! };
//! ```

mod feed;
mod handler;
mod hub;
mod messages;

pub use feed::DisplayFeed;
pub use handler::websocket_handler;
pub use hub::{is_valid_topic, ConnectionHub, HubConfig, HubError};
pub use messages::{
    campaign_topic, parse_campaign_topic, BoardStatus, ClientMessage, ServerMessage, WsEvent,
};
