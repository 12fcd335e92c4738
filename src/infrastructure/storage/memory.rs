//! インメモリのスナップショット保存
//!
//! ファイルを使わない実行（`--state-file` 未指定時）とテストで使用します。
//! Clone はセルを共有するため、保存した内容は複製側からも見えます。

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{SnapshotStorage, StorageError, snapshot::StoreSnapshot};

/// スナップショットをメモリ上に保持する
#[derive(Clone, Default)]
pub struct MemorySnapshotStorage {
    cell: Arc<Mutex<Option<StoreSnapshot>>>,
}

impl MemorySnapshotStorage {
    /// 新しい MemorySnapshotStorage を作成
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStorage for MemorySnapshotStorage {
    async fn load(&self) -> Result<Option<StoreSnapshot>, StorageError> {
        Ok(self.cell.lock().await.clone())
    }

    async fn save(&self, snapshot: &StoreSnapshot) -> Result<(), StorageError> {
        *self.cell.lock().await = Some(snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_returns_none_before_any_save() {
        // テスト項目: 保存前は None が返される
        // given (前提条件):
        let storage = MemorySnapshotStorage::new();

        // when (操作):
        let result = storage.load().await.unwrap();

        // then (期待する結果):
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_clone_shares_saved_snapshot() {
        // テスト項目: Clone がセルを共有し、保存内容が複製側から見える
        // given (前提条件):
        let storage = MemorySnapshotStorage::new();
        let clone = storage.clone();
        let snapshot = StoreSnapshot {
            known_rooms: vec!["general".to_string()],
            ..StoreSnapshot::default()
        };

        // when (操作):
        storage.save(&snapshot).await.unwrap();
        let loaded = clone.load().await.unwrap();

        // then (期待する結果):
        assert_eq!(loaded, Some(snapshot));
    }
}
