// ==========================================
// 发票导入系统 - 文件级联删除
// ==========================================
// 顺序: 附件对象 → 工作记录 → 上传任务 → 文件字节
// 约束:
// - 附件删除尽力而为，单个失败不阻断其余
// - 工作记录删除全部尝试；任一失败即中止后续步骤
// - 确认由调用方（API 层）负责
// ==========================================

use crate::domain::session::UserContext;
use crate::repository::{InvoiceRecordRepository, RepositoryError, UploadJobRepository};
use crate::storage::{ObjectStore, StorageError};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum CascadeError {
    #[error("上传任务不存在: {job_id}")]
    JobNotFound { job_id: String },

    #[error("无权删除该文件: {job_id}")]
    NotOwner { job_id: String },

    #[error("{failed} of {total} deletions failed")]
    RecordDeletion { failed: usize, total: usize },

    #[error("文件字节删除失败: {0}")]
    FileDeletion(StorageError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type CascadeResult<T> = Result<T, CascadeError>;

/// 级联删除结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeReport {
    pub job_id: String,
    pub file_name: String,
    pub attachments_deleted: usize,
    pub attachment_failures: usize,
    pub records_deleted: usize,
    pub file_deleted: bool,
}

pub struct CascadeDeleter {
    jobs: Arc<dyn UploadJobRepository>,
    records: Arc<dyn InvoiceRecordRepository>,
    store: Arc<dyn ObjectStore>,
}

impl CascadeDeleter {
    pub fn new(
        jobs: Arc<dyn UploadJobRepository>,
        records: Arc<dyn InvoiceRecordRepository>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            jobs,
            records,
            store,
        }
    }

    /// 删除文件及其全部依赖数据（不可逆）
    #[instrument(skip(self, ctx), fields(user_id = %ctx.user_id))]
    pub async fn delete_file(&self, ctx: &UserContext, job_id: &str) -> CascadeResult<CascadeReport> {
        let job = self
            .jobs
            .find_by_id(job_id)
            .await?
            .ok_or_else(|| CascadeError::JobNotFound {
                job_id: job_id.to_string(),
            })?;
        if job.owner_id != ctx.user_id {
            return Err(CascadeError::NotOwner {
                job_id: job_id.to_string(),
            });
        }

        let records = self.records.list_by_job(job_id).await?;

        // 1. 附件（尽力而为）
        let attachment_keys: Vec<&str> = records
            .iter()
            .filter_map(|r| r.document.as_ref().map(|d| d.key.as_str()))
            .collect();
        let attachment_results =
            join_all(attachment_keys.iter().map(|key| self.store.delete(key))).await;
        let mut attachments_deleted = 0;
        let mut attachment_failures = 0;
        for (key, result) in attachment_keys.iter().zip(attachment_results) {
            match result {
                Ok(()) => attachments_deleted += 1,
                Err(e) => {
                    attachment_failures += 1;
                    warn!(key, error = %e, "附件删除失败，继续删除其余附件");
                }
            }
        }

        // 2. 工作记录（全部尝试，任一失败即中止）
        let total = records.len();
        let record_results =
            join_all(records.iter().map(|r| self.records.delete(&r.record_id))).await;
        let failed = record_results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            for (record, result) in records.iter().zip(&record_results) {
                if let Err(e) = result {
                    warn!(record_id = %record.record_id, error = %e, "工作记录删除失败");
                }
            }
            return Err(CascadeError::RecordDeletion { failed, total });
        }

        // 3. 上传任务
        self.jobs.delete(job_id).await?;

        // 4. 文件字节
        let file_deleted = match self.store.delete(&job.source_key).await {
            Ok(()) => true,
            Err(StorageError::NotFound(_)) => false,
            Err(e) => return Err(CascadeError::FileDeletion(e)),
        };

        info!(
            job_id,
            attachments_deleted,
            attachment_failures,
            records_deleted = total,
            file_deleted,
            "文件级联删除完成"
        );

        Ok(CascadeReport {
            job_id: job_id.to_string(),
            file_name: job.file_name,
            attachments_deleted,
            attachment_failures,
            records_deleted: total,
            file_deleted,
        })
    }
}
