//! メッセージストアのスナップショット永続化
//!
//! ## 責務
//!
//! - `SnapshotStorage` trait の定義（session 層はこの trait にのみ依存）
//! - ファイル実装とインメモリ実装の提供
//!
//! ## 設計ノート
//!
//! ストアの永続化は「スナップショット全体の読み書き」だけです。
//! 差分更新はありません（スナップショットは小さく、書き込みは
//! 変更のたびに丸ごと行われます）。壊れたスナップショットの扱いは
//! 呼び出し側（session 層）が決めます。既定では空の状態に縮退します。

#[cfg(test)]
use mockall::automock;

pub mod file;
pub mod memory;
pub mod snapshot;

pub use file::FileSnapshotStorage;
pub use memory::MemorySnapshotStorage;
pub use snapshot::{MessageSnapshot, StoreSnapshot};

use async_trait::async_trait;
use thiserror::Error;

/// 永続化層のエラー
#[derive(Debug, Error)]
pub enum StorageError {
    /// 読み書きの I/O エラー
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    /// スナップショットのシリアライズ/デシリアライズ失敗
    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// スナップショットの保存先
///
/// session 層はこの trait に依存し、具体的な保存先（ファイル、メモリ）
/// には依存しません（依存性の逆転）。
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    /// スナップショットを読み込む
    ///
    /// 保存されたスナップショットが存在しない場合は `Ok(None)`。
    async fn load(&self) -> Result<Option<StoreSnapshot>, StorageError>;

    /// スナップショットを保存する
    async fn save(&self, snapshot: &StoreSnapshot) -> Result<(), StorageError>;
}
