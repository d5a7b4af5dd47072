// ==========================================
// 发票导入系统 - 文件接收器
// ==========================================
// 职责: 扩展名白名单过滤 / 上传到对象存储 / 读取已上传字节
// 约束: 选择中只要有一个文件不被接受，整批拒绝（不做部分接受）
// ==========================================

use crate::domain::session::UserContext;
use crate::domain::types::FileKind;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::invoice_importer_trait::UploadProgressListener;
use crate::storage::{upload_key, ObjectStore, ProgressFn};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

// ==========================================
// SelectedFile - 用户选择的文件
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// 从本地路径读取（文件名取路径最后一段）
    pub async fn from_path(path: &Path) -> ImportResult<Self> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ImportError::InternalError(format!("读取文件失败 {}: {}", path.display(), e))
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, bytes })
    }
}

/// 通过白名单的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedFile {
    pub file: SelectedFile,
    pub kind: FileKind,
}

/// 扩展名白名单: .csv / .xlsx / .xls（大小写不敏感）
pub fn accepted_extension(name: &str) -> Option<FileKind> {
    FileKind::from_file_name(name.trim())
}

/// 过滤选择
///
/// # 返回
/// - Ok: 全部文件均被接受
/// - Err(RejectedSelection): 至少一个文件不被接受，未处理任何文件
pub fn filter_selection(files: Vec<SelectedFile>) -> ImportResult<Vec<AcceptedFile>> {
    let rejected: Vec<String> = files
        .iter()
        .filter(|f| accepted_extension(&f.name).is_none())
        .map(|f| f.name.clone())
        .collect();

    if !rejected.is_empty() {
        return Err(ImportError::RejectedSelection { rejected });
    }

    Ok(files
        .into_iter()
        .filter_map(|file| accepted_extension(&file.name).map(|kind| AcceptedFile { file, kind }))
        .collect())
}

// ==========================================
// FileIngestor
// ==========================================
pub struct FileIngestor {
    store: Arc<dyn ObjectStore>,
}

impl FileIngestor {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// 上传文件字节，返回对象存储键
    ///
    /// 键格式: uploads/{owner}/{unix_millis}-{文件名}
    pub async fn upload(
        &self,
        ctx: &UserContext,
        accepted: &AcceptedFile,
        listener: Option<Arc<dyn UploadProgressListener>>,
    ) -> ImportResult<String> {
        let key = upload_key(&ctx.user_id, Utc::now(), &accepted.file.name);

        let progress: Option<ProgressFn> = listener.map(|listener| {
            let file_name = accepted.file.name.clone();
            Arc::new(move |percent: u8| listener.on_progress(&file_name, percent)) as ProgressFn
        });

        debug!(
            file_name = %accepted.file.name,
            key = %key,
            size = accepted.file.bytes.len(),
            "开始上传文件"
        );
        self.store
            .put(&key, accepted.file.bytes.clone(), progress)
            .await?;

        info!(file_name = %accepted.file.name, key = %key, "文件上传完成");
        Ok(key)
    }

    /// 读取已上传的文件字节
    pub async fn fetch(&self, key: &str) -> ImportResult<Vec<u8>> {
        Ok(self.store.get(key).await?)
    }

    /// 删除已上传的文件字节
    pub async fn remove(&self, key: &str) -> ImportResult<()> {
        Ok(self.store.delete(key).await?)
    }
}
