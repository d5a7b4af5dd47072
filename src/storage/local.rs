// ==========================================
// 发票导入系统 - 本地文件系统对象存储
// ==========================================
// 职责: ObjectStore 的本地实现（tokio::fs）
// 约束: 存储根目录与访问 URL 前缀由 StorageSettings 注入
// ==========================================

use crate::storage::traits::{ObjectStore, ProgressFn, StorageError, StorageResult};
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// 分块写入大小（用于进度回调）
const WRITE_CHUNK_BYTES: usize = 64 * 1024;

// ==========================================
// StorageSettings - 启动时解析一次的存储位置
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    pub root: PathBuf,
    pub base_url: String,
}

impl StorageSettings {
    pub fn new(root: impl Into<PathBuf>, base_url: Option<String>) -> Self {
        let root = root.into();
        let base_url = base_url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| format!("file://{}", root.display()));
        Self { root, base_url }
    }
}

// ==========================================
// LocalObjectStore
// ==========================================
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    settings: StorageSettings,
}

impl LocalObjectStore {
    /// 创建实例（确保根目录存在）
    pub async fn new(settings: StorageSettings) -> StorageResult<Self> {
        fs::create_dir_all(&settings.root).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "无法创建存储目录 {}: {}",
                settings.root.display(),
                e
            ))
        })?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &StorageSettings {
        &self.settings
    }

    /// 存储键 → 文件路径（拒绝路径穿越）
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.trim().is_empty() || key.contains('\\') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        let relative = Path::new(key);
        let all_normal = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !all_normal {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        Ok(self.settings.root.join(relative))
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        progress: Option<ProgressFn>,
    ) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        self.ensure_parent_dir(&path).await?;

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("无法创建文件 {}: {}", path.display(), e))
        })?;

        let total = data.len();
        let mut written = 0usize;
        for chunk in data.chunks(WRITE_CHUNK_BYTES) {
            file.write_all(chunk).await.map_err(|e| {
                StorageError::UploadFailed(format!("写入失败 {}: {}", path.display(), e))
            })?;
            written += chunk.len();
            if let Some(report) = &progress {
                report(((written * 100) / total.max(1)) as u8);
            }
        }

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("落盘失败 {}: {}", path.display(), e))
        })?;

        // 空文件不会进入循环
        if total == 0 {
            if let Some(report) = &progress {
                report(100);
            }
        }

        tracing::debug!(key = %key, bytes = total, "对象写入完成");
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(StorageError::DownloadFailed(format!("{}: {}", key, e))),
        }
    }

    async fn presigned_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let path = self.key_to_path(key)?;
        if !fs::try_exists(&path).await? {
            return Err(StorageError::NotFound(key.to_string()));
        }

        let expires_at = Utc::now().timestamp() + expires_in.as_secs() as i64;
        Ok(format!(
            "{}/{}?expires={}",
            self.settings.base_url.trim_end_matches('/'),
            key,
            expires_at
        ))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(StorageError::DeleteFailed(format!("{}: {}", key, e))),
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    async fn store() -> (tempfile::TempDir, LocalObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let settings = StorageSettings::new(dir.path(), Some("http://files.local/".to_string()));
        let store = LocalObjectStore::new(settings).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let (_dir, store) = store().await;

        store
            .put("uploads/u1/1-a.csv", b"hello".to_vec(), None)
            .await
            .unwrap();
        assert!(store.exists("uploads/u1/1-a.csv").await.unwrap());
        assert_eq!(store.get("uploads/u1/1-a.csv").await.unwrap(), b"hello");

        store.delete("uploads/u1/1-a.csv").await.unwrap();
        assert!(!store.exists("uploads/u1/1-a.csv").await.unwrap());
        assert!(matches!(
            store.get("uploads/u1/1-a.csv").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_progress_reaches_100() {
        let (_dir, store) = store().await;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress: ProgressFn = Arc::new(move |p| sink.lock().unwrap().push(p));

        let data = vec![7u8; WRITE_CHUNK_BYTES * 3 + 10];
        store.put("big.bin", data, Some(progress)).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert_eq!(*seen.last().unwrap(), 100);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let (_dir, store) = store().await;
        assert!(matches!(
            store.put("../escape.txt", vec![1], None).await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            store.get("/etc/passwd").await,
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_presigned_url_uses_configured_base() {
        let (_dir, store) = store().await;
        store.put("attachments/u/r/1-x.pdf", vec![1], None).await.unwrap();

        let url = store
            .presigned_url("attachments/u/r/1-x.pdf", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(url.starts_with("http://files.local/attachments/u/r/1-x.pdf?expires="));
    }
}
