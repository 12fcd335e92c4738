//! ドメイン層のエラー定義

use thiserror::Error;

/// ドメイン層のエラー
///
/// 値オブジェクトの不変条件違反を表します。
/// 受信フレームの変換時に発生した場合、呼び出し側はフレームを破棄します。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    /// ルーム ID が不正（空、空白を含む、または長すぎる）
    #[error("room id must be 1-64 characters without whitespace: '{0}'")]
    InvalidRoomId(String),

    /// ユーザー名が不正（空、空白を含む、または長すぎる）
    #[error("username must be 1-32 characters without whitespace: '{0}'")]
    InvalidUsername(String),

    /// メッセージ本文が空
    #[error("message body must not be empty")]
    EmptyMessageBody,

    /// メッセージ本文が長すぎる
    #[error("message body exceeds 2000 characters (got {0})")]
    MessageBodyTooLong(usize),

    /// 接続トークンが空
    #[error("connection token must not be empty")]
    EmptyConnectionToken,
}
