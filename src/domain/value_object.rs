//! ドメイン層の値オブジェクト
//!
//! コンストラクタで検証を行い、生成後は常に妥当な値であることを保証します。
//! 検証ルールはバックエンドと揃えています（ルーム ID・ユーザー名は
//! 空白を含まない短い識別子、メッセージ本文は空でない 2000 文字以内）。

use std::fmt;

use super::error::DomainError;

/// ルーム ID の最大長（文字数）
pub const MAX_ROOM_ID_LENGTH: usize = 64;

/// ユーザー名の最大長（文字数）
pub const MAX_USERNAME_LENGTH: usize = 32;

/// メッセージ本文の最大長（文字数）
pub const MAX_MESSAGE_BODY_LENGTH: usize = 2000;

/// システムメッセージの作成者名
const SYSTEM_USERNAME: &str = "system";

/// ルームを識別する ID
///
/// ケースセンシティブ（"General" と "general" は別のルーム）。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId(String);

impl RoomId {
    /// 新しい RoomId を作成（検証あり）
    pub fn new(value: String) -> Result<Self, DomainError> {
        if value.is_empty()
            || value.chars().count() > MAX_ROOM_ID_LENGTH
            || value.chars().any(char::is_whitespace)
        {
            return Err(DomainError::InvalidRoomId(value));
        }
        Ok(Self(value))
    }

    /// 常にメンバーであるデフォルトルーム
    pub fn general() -> Self {
        Self("general".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// メンバーのユーザー名
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Username(String);

impl Username {
    /// 新しい Username を作成（検証あり）
    pub fn new(value: String) -> Result<Self, DomainError> {
        if value.is_empty()
            || value.chars().count() > MAX_USERNAME_LENGTH
            || value.chars().any(char::is_whitespace)
        {
            return Err(DomainError::InvalidUsername(value));
        }
        Ok(Self(value))
    }

    /// システムメッセージの作成者名
    pub fn system() -> Self {
        Self(SYSTEM_USERNAME.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// メッセージ本文
///
/// 空白のみの本文は拒否しますが、本文そのものはトリムせず保持します。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBody(String);

impl MessageBody {
    /// 新しい MessageBody を作成（検証あり）
    pub fn new(value: String) -> Result<Self, DomainError> {
        if value.trim().is_empty() {
            return Err(DomainError::EmptyMessageBody);
        }
        let length = value.chars().count();
        if length > MAX_MESSAGE_BODY_LENGTH {
            return Err(DomainError::MessageBodyTooLong(length));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for MessageBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unix タイムスタンプ（ミリ秒、UTC）
///
/// 表示専用の情報であり、メッセージの順序は到着順で決まります。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(i64);

impl Timestamp {
    /// 新しい Timestamp を作成
    pub fn new(millis: i64) -> Self {
        Self(millis)
    }

    /// ミリ秒の値を取得
    pub fn value(&self) -> i64 {
        self.0
    }
}

/// WebSocket 接続用の短命トークン
///
/// REST バックエンドが発行し、接続 URL の一部としてのみ使用されます。
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionToken(String);

impl ConnectionToken {
    /// 新しい ConnectionToken を作成（空のトークンは拒否）
    pub fn new(value: String) -> Result<Self, DomainError> {
        if value.is_empty() {
            return Err(DomainError::EmptyConnectionToken);
        }
        Ok(Self(value))
    }

    /// ローカル開発用の固定トークン
    pub fn dev_fallback() -> Self {
        Self("local-dev-token".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// トークンは資格情報なのでログに出さない
impl fmt::Debug for ConnectionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionToken(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_accepts_valid_value() {
        // テスト項目: 妥当なルーム ID が受理される
        // given (前提条件):
        let value = "general".to_string();

        // when (操作):
        let result = RoomId::new(value);

        // then (期待する結果):
        assert_eq!(result.unwrap().as_str(), "general");
    }

    #[test]
    fn test_room_id_rejects_empty_value() {
        // テスト項目: 空のルーム ID が拒否される
        // given (前提条件):
        let value = String::new();

        // when (操作):
        let result = RoomId::new(value);

        // then (期待する結果):
        assert_eq!(result, Err(DomainError::InvalidRoomId(String::new())));
    }

    #[test]
    fn test_room_id_rejects_whitespace() {
        // テスト項目: 空白を含むルーム ID が拒否される
        // given (前提条件):
        let value = "team room".to_string();

        // when (操作):
        let result = RoomId::new(value);

        // then (期待する結果):
        assert!(result.is_err());
    }

    #[test]
    fn test_room_id_rejects_too_long_value() {
        // テスト項目: 最大長を超えるルーム ID が拒否される
        // given (前提条件):
        let value = "a".repeat(MAX_ROOM_ID_LENGTH + 1);

        // when (操作):
        let result = RoomId::new(value);

        // then (期待する結果):
        assert!(result.is_err());
    }

    #[test]
    fn test_room_id_is_case_sensitive() {
        // テスト項目: ルーム ID はケースセンシティブで比較される
        // given (前提条件):
        let lower = RoomId::new("general".to_string()).unwrap();
        let upper = RoomId::new("General".to_string()).unwrap();

        // when (操作):
        let equal = lower == upper;

        // then (期待する結果):
        assert!(!equal);
    }

    #[test]
    fn test_username_accepts_valid_value() {
        // テスト項目: 妥当なユーザー名が受理される
        // given (前提条件):
        let value = "alice".to_string();

        // when (操作):
        let result = Username::new(value);

        // then (期待する結果):
        assert_eq!(result.unwrap().as_str(), "alice");
    }

    #[test]
    fn test_username_rejects_whitespace() {
        // テスト項目: 空白を含むユーザー名が拒否される
        // given (前提条件):
        let value = "a lice".to_string();

        // when (操作):
        let result = Username::new(value);

        // then (期待する結果):
        assert!(result.is_err());
    }

    #[test]
    fn test_username_rejects_too_long_value() {
        // テスト項目: 最大長を超えるユーザー名が拒否される
        // given (前提条件):
        let value = "a".repeat(MAX_USERNAME_LENGTH + 1);

        // when (操作):
        let result = Username::new(value);

        // then (期待する結果):
        assert!(result.is_err());
    }

    #[test]
    fn test_message_body_accepts_valid_value() {
        // テスト項目: 妥当なメッセージ本文が受理される
        // given (前提条件):
        let value = "Hello, world!".to_string();

        // when (操作):
        let result = MessageBody::new(value);

        // then (期待する結果):
        assert_eq!(result.unwrap().as_str(), "Hello, world!");
    }

    #[test]
    fn test_message_body_rejects_whitespace_only_value() {
        // テスト項目: 空白のみのメッセージ本文が拒否される
        // given (前提条件):
        let value = "   \t  ".to_string();

        // when (操作):
        let result = MessageBody::new(value);

        // then (期待する結果):
        assert_eq!(result, Err(DomainError::EmptyMessageBody));
    }

    #[test]
    fn test_message_body_rejects_too_long_value() {
        // テスト項目: 最大長を超えるメッセージ本文が拒否される
        // given (前提条件):
        let value = "x".repeat(MAX_MESSAGE_BODY_LENGTH + 1);

        // when (操作):
        let result = MessageBody::new(value);

        // then (期待する結果):
        assert_eq!(
            result,
            Err(DomainError::MessageBodyTooLong(MAX_MESSAGE_BODY_LENGTH + 1))
        );
    }

    #[test]
    fn test_message_body_preserves_interior_whitespace() {
        // テスト項目: 本文内部の空白はトリムされず保持される
        // given (前提条件):
        let value = "  hello  world  ".to_string();

        // when (操作):
        let result = MessageBody::new(value.clone());

        // then (期待する結果):
        assert_eq!(result.unwrap().as_str(), value);
    }

    #[test]
    fn test_connection_token_rejects_empty_value() {
        // テスト項目: 空の接続トークンが拒否される
        // given (前提条件):
        let value = String::new();

        // when (操作):
        let result = ConnectionToken::new(value);

        // then (期待する結果):
        assert_eq!(result, Err(DomainError::EmptyConnectionToken));
    }

    #[test]
    fn test_connection_token_debug_does_not_leak_value() {
        // テスト項目: Debug 出力にトークンの値が含まれない
        // given (前提条件):
        let token = ConnectionToken::new("secret-jwt".to_string()).unwrap();

        // when (操作):
        let debug = format!("{:?}", token);

        // then (期待する結果):
        assert!(!debug.contains("secret-jwt"));
    }

    #[test]
    fn test_timestamp_preserves_value() {
        // テスト項目: Timestamp が与えられた値を保持する
        // given (前提条件):
        let millis = 1672531200000;

        // when (操作):
        let timestamp = Timestamp::new(millis);

        // then (期待する結果):
        assert_eq!(timestamp.value(), millis);
    }
}
