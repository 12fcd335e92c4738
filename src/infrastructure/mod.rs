//! Infrastructure 層
//!
//! 外部システムとの境界を実装します：
//! - `api`: REST バックエンドへの HTTP クライアント（Cookie / CSRF）
//! - `dto`: ワイヤフォーマットの DTO とドメインへの変換
//! - `storage`: メッセージストアのスナップショット永続化

pub mod api;
pub mod dto;
pub mod storage;
