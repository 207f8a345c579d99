//! WebSocket Message Types
//!
//! Frames exchanged on the topic pub/sub endpoint, plus the internal
//! event type the hub fans out.

use serde::{Deserialize, Serialize};

use crate::telemetry::{Mode, Reading};

/// Topic carrying the current reading on every generator tick
pub const WATER_DATA_TOPIC: &str = "water_data";
/// Topic carrying mode changes
pub const SYSTEM_TOPIC: &str = "system";

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to topics for real-time updates
    Subscribe {
        /// Topics to subscribe to (e.g., "water_data")
        topics: Vec<String>,
    },
    /// Unsubscribe from topics
    Unsubscribe { topics: Vec<String> },
    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Data published on a subscribed topic
    Publish { topic: String, data: TopicPayload },
    /// Subscription confirmed
    Subscribed { topics: Vec<String> },
    /// Unsubscription confirmed
    Unsubscribed { topics: Vec<String> },
    /// Pong response to ping
    Pong,
    /// Error message
    Error { message: String },
    /// Connection established
    Connected { connection_id: String },
}

/// Body of a `publish` frame
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TopicPayload {
    Reading(Reading),
    ModeChanged { mode: Mode, use_mock_data: bool },
}

/// Internal event routed through the hub
#[derive(Debug, Clone)]
pub struct WsEvent {
    /// Topic this event belongs to
    pub topic: String,
    /// The message to send to subscribers
    pub message: ServerMessage,
}

impl WsEvent {
    /// Generic event for an arbitrary topic
    pub fn new(topic: impl Into<String>, data: TopicPayload) -> Self {
        let topic = topic.into();
        Self {
            message: ServerMessage::Publish {
                topic: topic.clone(),
                data,
            },
            topic,
        }
    }

    /// Current reading on the `water_data` topic
    pub fn reading(reading: Reading) -> Self {
        Self::new(WATER_DATA_TOPIC, TopicPayload::Reading(reading))
    }

    /// Mode change on the `system` topic
    pub fn mode_changed(mode: Mode) -> Self {
        Self::new(
            SYSTEM_TOPIC,
            TopicPayload::ModeChanged {
                mode,
                use_mock_data: mode.uses_mock(),
            },
        )
    }
}
