//! WebSocket frame DTOs for the chat gateway protocol.
//!
//! Every frame is a JSON text message tagged by a `type` field. Room-scoped
//! frames carry a `room_id`. Unknown tags fail deserialization and are
//! handled as a [`ProtocolError`] by the caller (logged and dropped, never
//! fatal to the connection).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::DomainError;

/// Protocol-level errors for inbound frames
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is not valid JSON or carries an unknown `type` tag
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The frame parsed but a field violates a domain invariant
    #[error("invalid frame field: {0}")]
    InvalidField(#[from] DomainError),
}

/// Frames sent by the engine to the chat gateway
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Request to join a room (server confirms with `room_joined`)
    JoinRoom { room_id: String },
    /// Request to leave a room (server confirms with `room_left`)
    LeaveRoom { room_id: String },
    /// A chat message for a room
    ChatMessage { room_id: String, content: String },
    /// Local typing state for a room
    Typing { room_id: String, typing: bool },
}

/// Frames received by the engine from the chat gateway
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Join confirmation
    RoomJoined { room_id: String },
    /// Leave confirmation
    RoomLeft { room_id: String },
    /// A chat message from a member (the sender's own messages are echoed
    /// back over the same connection)
    ChatMessage {
        room_id: String,
        username: String,
        #[serde(default)]
        user_id: Option<i64>,
        content: String,
        #[serde(default)]
        timestamp: Option<i64>,
    },
    /// A remote member's typing state changed
    Typing {
        room_id: String,
        username: String,
        typing: bool,
    },
    /// Server notice without a room scope
    System { message: String },
}

impl ServerFrame {
    /// Parse an inbound text frame
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}
