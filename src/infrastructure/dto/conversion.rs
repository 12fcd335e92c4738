//! Conversion logic between DTOs and domain types.

use crate::domain::{
    DomainError, Member, Message, RoomEvent,
    value_object::{MessageBody, RoomId, Timestamp, Username},
};
use crate::infrastructure::dto::{http, websocket as dto};

// ========================================
// WebSocket DTO → Domain Event
// ========================================

impl dto::ServerFrame {
    /// Convert a parsed frame into a validated domain event.
    ///
    /// `received_at` substitutes for a missing timestamp on chat frames;
    /// ordering is by arrival anyway, the timestamp is display-only.
    pub fn into_room_event(self, received_at: Timestamp) -> Result<RoomEvent, DomainError> {
        match self {
            Self::RoomJoined { room_id } => Ok(RoomEvent::RoomJoined {
                room: RoomId::new(room_id)?,
            }),
            Self::RoomLeft { room_id } => Ok(RoomEvent::RoomLeft {
                room: RoomId::new(room_id)?,
            }),
            Self::ChatMessage {
                room_id,
                username,
                user_id,
                content,
                timestamp,
            } => {
                let room = RoomId::new(room_id)?;
                let author = Username::new(username)?;
                let body = MessageBody::new(content)?;
                let timestamp = timestamp.map(Timestamp::new).unwrap_or(received_at);
                Ok(RoomEvent::Chat {
                    message: Message::user(room, author, user_id, body, timestamp),
                })
            }
            Self::Typing {
                room_id,
                username,
                typing,
            } => Ok(RoomEvent::Typing {
                room: RoomId::new(room_id)?,
                username: Username::new(username)?,
                typing,
            }),
            Self::System { message } => Ok(RoomEvent::System {
                body: MessageBody::new(message)?,
            }),
        }
    }
}

// ========================================
// Domain → WebSocket DTO
// ========================================

impl dto::ClientFrame {
    /// Build a join request frame
    pub fn join(room: &RoomId) -> Self {
        Self::JoinRoom {
            room_id: room.as_str().to_string(),
        }
    }

    /// Build a leave request frame
    pub fn leave(room: &RoomId) -> Self {
        Self::LeaveRoom {
            room_id: room.as_str().to_string(),
        }
    }

    /// Build a chat message frame
    pub fn chat(room: &RoomId, body: &MessageBody) -> Self {
        Self::ChatMessage {
            room_id: room.as_str().to_string(),
            content: body.as_str().to_string(),
        }
    }

    /// Build a typing state frame
    pub fn typing(room: &RoomId, typing: bool) -> Self {
        Self::Typing {
            room_id: room.as_str().to_string(),
            typing,
        }
    }
}

// ========================================
// HTTP DTO → Domain Entity
// ========================================

impl TryFrom<http::ProfileResponse> for Member {
    type Error = DomainError;

    fn try_from(dto: http::ProfileResponse) -> Result<Self, Self::Error> {
        Ok(Self {
            id: dto.id,
            username: Username::new(dto.username)?,
            first_name: dto.first_name,
            last_name: dto.last_name,
            email: dto.email,
            groups: dto.groups.into_iter().map(|g| g.name).collect(),
        })
    }
}
