//! 受信プロトコルイベント
//!
//! 検証済みのワイヤフレームをドメインの語彙で表現したものです。
//! DTO からの変換は infrastructure 層（`dto::conversion`）が行います。

use super::entity::Message;
use super::value_object::{MessageBody, RoomId, Username};

/// チャットゲートウェイから受信した検証済みイベント
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    /// ルームへの参加がサーバーに確認された
    RoomJoined { room: RoomId },
    /// ルームからの退出がサーバーに確認された
    RoomLeft { room: RoomId },
    /// チャットメッセージを受信した
    Chat { message: Message },
    /// タイピング状態の変化を受信した
    Typing {
        room: RoomId,
        username: Username,
        typing: bool,
    },
    /// ルームに紐づかないサーバー通知を受信した
    System { body: MessageBody },
}
