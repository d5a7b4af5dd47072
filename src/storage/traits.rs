// ==========================================
// 发票导入系统 - 对象存储抽象
// ==========================================
// 职责: 定义对象存储接口（上传/下载/签名链接/删除）
// 约束: 存储位置在启动时由配置注入，不从响应或 URL 中推断
// ==========================================

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// 对象存储错误类型
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("上传失败: {0}")]
    UploadFailed(String),

    #[error("下载失败: {0}")]
    DownloadFailed(String),

    #[error("删除失败: {0}")]
    DeleteFailed(String),

    #[error("对象不存在: {0}")]
    NotFound(String),

    #[error("非法存储键: {0}")]
    InvalidKey(String),

    #[error("存储配置错误: {0}")]
    ConfigError(String),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result 类型别名
pub type StorageResult<T> = Result<T, StorageError>;

/// 上传进度回调（百分比 0..=100）
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

// ==========================================
// ObjectStore Trait
// ==========================================
// 实现者: LocalObjectStore
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// 写入对象
    ///
    /// # 参数
    /// - key: 存储键
    /// - data: 对象内容
    /// - progress: 可选进度回调，至少在结束时回调一次 100
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        progress: Option<ProgressFn>,
    ) -> StorageResult<()>;

    /// 读取对象
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// 生成限时访问链接
    async fn presigned_url(&self, key: &str, expires_in: Duration) -> StorageResult<String>;

    /// 删除对象
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// 对象是否存在
    async fn exists(&self, key: &str) -> StorageResult<bool>;
}
