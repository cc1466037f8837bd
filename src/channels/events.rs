//! Group events and the frames pushed to clients

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Event type emitted by the publisher on every tick
pub const TIC_MESSAGE: &str = "tic_message";

/// Payload of a tick
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicMessage {
    /// Formatted value, `HH:MM:SS`
    pub time: String,
}

/// Tagged message sent into a group.
///
/// Serialized as `{"type": "tic_message", "message": {...}}` so the same
/// shape travels over the in-process queues and the redis channel layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TicMessage { message: TicMessage },
}

impl Event {
    /// Build a tick event carrying `value`
    pub fn tic(value: impl Into<String>) -> Self {
        Event::TicMessage {
            message: TicMessage { time: value.into() },
        }
    }

    /// Type tag used to select a connection handler
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::TicMessage { .. } => TIC_MESSAGE,
        }
    }
}

/// Outbound frame: `{"message": {"time": "HH:MM:SS"}}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub message: TicMessage,
}

impl Frame {
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Messages a client may send over the socket
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Application-level heartbeat
    Ping,
}

/// Reply to [`ClientMessage::Ping`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PongMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
}

impl Default for PongMessage {
    fn default() -> Self {
        Self {
            msg_type: "pong".to_string(),
        }
    }
}
