//! ファイルへのスナップショット保存

use std::path::PathBuf;

use async_trait::async_trait;

use super::{SnapshotStorage, StorageError, snapshot::StoreSnapshot};

/// スナップショットを単一の JSON ファイルに保存する
///
/// 書き込みは一時ファイルへの書き込みとリネームで行い、途中で落ちても
/// 既存のスナップショットが壊れないようにします。
pub struct FileSnapshotStorage {
    path: PathBuf,
}

impl FileSnapshotStorage {
    /// 新しい FileSnapshotStorage を作成
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SnapshotStorage for FileSnapshotStorage {
    async fn load(&self) -> Result<Option<StoreSnapshot>, StorageError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot = serde_json::from_slice(&bytes)?;
        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &StoreSnapshot) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec(snapshot)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::snapshot::{MessageKindDto, MessageSnapshot};

    fn create_test_snapshot() -> StoreSnapshot {
        let mut snapshot = StoreSnapshot {
            known_rooms: vec!["general".to_string(), "rust".to_string()],
            message_count: 2,
            ..StoreSnapshot::default()
        };
        snapshot.messages.insert(
            "general".to_string(),
            vec![MessageSnapshot {
                author: "alice".to_string(),
                author_id: Some(7),
                content: "hi".to_string(),
                timestamp: 1000,
                kind: MessageKindDto::User,
            }],
        );
        snapshot
    }

    #[tokio::test]
    async fn test_load_returns_none_when_file_missing() {
        // テスト項目: ファイルが存在しない場合 None が返される
        // given (前提条件):
        let dir = tempfile::tempdir().unwrap();
        let storage = FileSnapshotStorage::new(dir.path().join("history.json"));

        // when (操作):
        let result = storage.load().await.unwrap();

        // then (期待する結果):
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_save_then_load_returns_same_snapshot() {
        // テスト項目: 保存したスナップショットがそのまま読み戻せる
        // given (前提条件):
        let dir = tempfile::tempdir().unwrap();
        let storage = FileSnapshotStorage::new(dir.path().join("history.json"));
        let snapshot = create_test_snapshot();

        // when (操作):
        storage.save(&snapshot).await.unwrap();
        let loaded = storage.load().await.unwrap();

        // then (期待する結果):
        assert_eq!(loaded, Some(snapshot));
    }

    #[tokio::test]
    async fn test_save_creates_missing_parent_directories() {
        // テスト項目: 親ディレクトリが無くても保存できる
        // given (前提条件):
        let dir = tempfile::tempdir().unwrap();
        let storage = FileSnapshotStorage::new(dir.path().join("nested/dir/history.json"));
        let snapshot = create_test_snapshot();

        // when (操作):
        let result = storage.save(&snapshot).await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(storage.load().await.unwrap(), Some(snapshot));
    }

    #[tokio::test]
    async fn test_load_corrupt_file_returns_serialization_error() {
        // テスト項目: 壊れたファイルはシリアライズエラーとして報告される
        // given (前提条件):
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();
        let storage = FileSnapshotStorage::new(path);

        // when (操作):
        let result = storage.load().await;

        // then (期待する結果):
        assert!(matches!(result, Err(StorageError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_save_overwrites_previous_snapshot() {
        // テスト項目: 保存のたびに前のスナップショットが置き換えられる
        // given (前提条件):
        let dir = tempfile::tempdir().unwrap();
        let storage = FileSnapshotStorage::new(dir.path().join("history.json"));
        let first = create_test_snapshot();
        let second = StoreSnapshot {
            known_rooms: vec!["general".to_string()],
            message_count: 9,
            ..StoreSnapshot::default()
        };

        // when (操作):
        storage.save(&first).await.unwrap();
        storage.save(&second).await.unwrap();
        let loaded = storage.load().await.unwrap();

        // then (期待する結果):
        assert_eq!(loaded, Some(second));
    }
}
