// ==========================================
// 发票导入系统 - 上传API
// ==========================================
// 职责: 封装文件选择 → 导入管道 → 按文件返回结果
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::import::FileImportOutcome;
use crate::domain::session::UserContext;
use crate::importer::{InvoiceImporter, SelectedFile, UploadProgressListener};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// 上传响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    /// 每个文件的处理结果（按选择顺序）
    pub outcomes: Vec<FileImportOutcome>,
    pub files_imported: usize,
    pub files_failed: usize,
    /// 行级汇总（仅统计成功建任务的文件）
    pub total_rows: usize,
    pub successful_rows: usize,
    pub failed_rows: usize,
}

impl UploadResponse {
    fn from_outcomes(outcomes: Vec<FileImportOutcome>) -> Self {
        let summaries: Vec<_> = outcomes.iter().filter_map(|o| o.summary()).collect();
        Self {
            files_imported: summaries.len(),
            files_failed: outcomes.len() - summaries.len(),
            total_rows: summaries.iter().map(|s| s.total).sum(),
            successful_rows: summaries.iter().map(|s| s.successful).sum(),
            failed_rows: summaries.iter().map(|s| s.failed).sum(),
            outcomes,
        }
    }
}

/// 上传API
pub struct UploadApi {
    importer: Arc<dyn InvoiceImporter>,
}

impl UploadApi {
    pub fn new(importer: Arc<dyn InvoiceImporter>) -> Self {
        Self { importer }
    }

    /// 导入用户选择的文件
    ///
    /// # 返回
    /// - Ok(UploadResponse): 单个文件的失败体现在 outcomes 中
    /// - Err(SelectionRejected): 选择中含不支持的文件，未处理任何文件
    pub async fn upload_files(
        &self,
        ctx: &UserContext,
        files: Vec<SelectedFile>,
        listener: Option<Arc<dyn UploadProgressListener>>,
    ) -> ApiResult<UploadResponse> {
        if files.is_empty() {
            return Err(ApiError::InvalidInput("未选择任何文件".to_string()));
        }

        let outcomes = self.importer.import_selection(ctx, files, listener).await?;
        Ok(UploadResponse::from_outcomes(outcomes))
    }

    /// 从本地路径读取后导入（CLI 使用）
    pub async fn upload_paths(
        &self,
        ctx: &UserContext,
        paths: &[PathBuf],
        listener: Option<Arc<dyn UploadProgressListener>>,
    ) -> ApiResult<UploadResponse> {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            files.push(SelectedFile::from_path(path).await?);
        }
        self.upload_files(ctx, files, listener).await
    }
}
