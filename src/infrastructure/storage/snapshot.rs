//! スナップショットの DTO とドメインとの変換
//!
//! 保存形式は camelCase キーの単一 JSON ブロブです：
//! `{"knownRooms": [...], "messages": {roomId: [...]}, "messageCount": n}`
//! この形式は過去に保存されたスナップショットとの互換性があるため、
//! キー名を変更してはいけません。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{
    DomainError, Message, MessageKind,
    value_object::{MessageBody, RoomId, Timestamp, Username},
};

/// メッセージ種別の保存表現
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKindDto {
    User,
    System,
}

impl From<MessageKind> for MessageKindDto {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::User => Self::User,
            MessageKind::System => Self::System,
        }
    }
}

impl From<MessageKindDto> for MessageKind {
    fn from(dto: MessageKindDto) -> Self {
        match dto {
            MessageKindDto::User => Self::User,
            MessageKindDto::System => Self::System,
        }
    }
}

/// メッセージ 1 件の保存表現
///
/// ルーム ID は持ちません（`StoreSnapshot.messages` のキーが持ちます）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSnapshot {
    pub author: String,
    #[serde(rename = "authorId", default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<i64>,
    pub content: String,
    pub timestamp: i64,
    pub kind: MessageKindDto,
}

impl MessageSnapshot {
    /// ドメインの Message に変換する（検証あり）
    ///
    /// 保存されたデータは改変されている可能性があるため、受信フレームと
    /// 同じ検証を通します。
    pub fn into_message(self, room: &RoomId) -> Result<Message, DomainError> {
        Ok(Message {
            room_id: room.clone(),
            author: Username::new(self.author)?,
            author_id: self.author_id,
            body: MessageBody::new(self.content)?,
            timestamp: Timestamp::new(self.timestamp),
            kind: self.kind.into(),
        })
    }
}

impl From<&Message> for MessageSnapshot {
    fn from(message: &Message) -> Self {
        Self {
            author: message.author.as_str().to_string(),
            author_id: message.author_id,
            content: message.body.as_str().to_string(),
            timestamp: message.timestamp.value(),
            kind: message.kind.into(),
        }
    }
}

/// ストア全体の保存表現
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(rename = "knownRooms", default)]
    pub known_rooms: Vec<String>,
    /// ルーム ID → メッセージ列（到着順）
    #[serde(default)]
    pub messages: BTreeMap<String, Vec<MessageSnapshot>>,
    /// このクライアントから送信されたメッセージの累計
    #[serde(rename = "messageCount", default)]
    pub message_count: u64,
}
