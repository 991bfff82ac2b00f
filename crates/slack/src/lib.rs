//! Slack interface for the book recommendation bot.
//!
//! - **Socket Mode** (`socket`, `transport`, `frames`) - WebSocket session with
//!   acknowledgements and reconnection, no public URL needed
//! - **Slash command** (`commands`) - `/book recommend|random|search|help`
//! - **Interactions** (`events`) - genre picker and re-roll buttons
//! - **Block Kit** (`blocks`) - book cards, picker, help and error messages
//! - **Web API** (`web`) - `apps.connections.open`, `response_url` replies and
//!   `chat.postMessage`
//!
//! ```text
//! Slack → WebSocketTransport → SocketModeRunner → EventDispatcher
//!                                                      ↓
//!            MessageDelivery ← Block Kit ← RecommendationService → Recommender
//! ```

pub mod blocks;
pub mod commands;
pub mod events;
pub mod frames;
pub mod service;
pub mod socket;
pub mod transport;
pub mod web;
