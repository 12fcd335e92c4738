//! ドメイン層のエンティティ

use super::value_object::{ConnectionToken, MessageBody, RoomId, Timestamp, Username};

/// 管理者権限を表すグループ名
const ADMIN_GROUP: &str = "is_admin";

/// Discord 連携済みであることを表すグループ名
const VERIFIED_GROUP: &str = "is_verified";

/// メッセージの種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// メンバーが送信したチャットメッセージ
    User,
    /// 入退室通知などの合成メッセージ
    System,
}

/// ルームに表示されるメッセージ
///
/// 履歴内の順序は到着順で決まります。`timestamp` は表示専用です。
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub room_id: RoomId,
    pub author: Username,
    /// 送信者のメンバー ID（システムメッセージでは None）
    pub author_id: Option<i64>,
    pub body: MessageBody,
    pub timestamp: Timestamp,
    pub kind: MessageKind,
}

impl Message {
    /// メンバーが送信したチャットメッセージを作成
    pub fn user(
        room_id: RoomId,
        author: Username,
        author_id: Option<i64>,
        body: MessageBody,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            room_id,
            author,
            author_id,
            body,
            timestamp,
            kind: MessageKind::User,
        }
    }

    /// システムメッセージ（入退室通知など）を作成
    pub fn system(room_id: RoomId, body: MessageBody, timestamp: Timestamp) -> Self {
        Self {
            room_id,
            author: Username::system(),
            author_id: None,
            body,
            timestamp,
            kind: MessageKind::System,
        }
    }
}

/// 認証済みメンバーのプロフィール
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub id: i64,
    pub username: Username,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    /// バックエンドが付与する権限グループ名
    pub groups: Vec<String>,
}

impl Member {
    /// 管理者権限を持つか
    pub fn is_admin(&self) -> bool {
        self.groups.iter().any(|g| g == ADMIN_GROUP)
    }

    /// Discord 連携済みか
    pub fn is_verified(&self) -> bool {
        self.groups.iter().any(|g| g == VERIFIED_GROUP)
    }

    /// 表示名（姓名があれば姓名、なければユーザー名）
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.as_str().to_string()
        } else {
            full.to_string()
        }
    }
}

/// 認証済みセッション
///
/// ログイン成功時に作成され、ログアウトまたは認証エラーで破棄されます。
/// 接続トークンは取得後にキャッシュされます。
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub member: Member,
    pub connection_token: Option<ConnectionToken>,
}

impl Session {
    /// 新しい Session を作成
    pub fn new(member: Member) -> Self {
        Self {
            member,
            connection_token: None,
        }
    }

    /// セッションのユーザー名を取得
    pub fn username(&self) -> &Username {
        &self.member.username
    }
}
