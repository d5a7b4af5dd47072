// ==========================================
// 发票导入系统 - 文件API
// ==========================================
// 职责: 上传文件（任务）列表 / 当前会话文件 / 详情 / 级联删除
// 说明: 会话归属是对 session_id 的直接查询，不做时间窗口推断
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::job::UploadJob;
use crate::domain::session::UserContext;
use crate::engine::{CascadeDeleter, CascadeReport, RefreshEvent, RefreshPublisher};
use crate::repository::{InvoiceRecordRepository, UploadJobRepository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 文件详情
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDetail {
    pub job: UploadJob,
    /// 当前仍在工作区的记录数
    pub working_records: usize,
    pub valid_records: usize,
    pub invalid_records: usize,
}

/// 文件API
pub struct FileApi {
    jobs: Arc<dyn UploadJobRepository>,
    records: Arc<dyn InvoiceRecordRepository>,
    cascade: CascadeDeleter,
    publisher: Arc<dyn RefreshPublisher>,
}

impl FileApi {
    pub fn new(
        jobs: Arc<dyn UploadJobRepository>,
        records: Arc<dyn InvoiceRecordRepository>,
        cascade: CascadeDeleter,
        publisher: Arc<dyn RefreshPublisher>,
    ) -> Self {
        Self {
            jobs,
            records,
            cascade,
            publisher,
        }
    }

    /// 用户全部上传文件（按创建时间倒序）
    pub async fn list_files(&self, ctx: &UserContext) -> ApiResult<Vec<UploadJob>> {
        Ok(self.jobs.list_by_owner(&ctx.user_id).await?)
    }

    /// 当前会话上传的文件
    pub async fn list_session_files(&self, ctx: &UserContext) -> ApiResult<Vec<UploadJob>> {
        Ok(self
            .jobs
            .list_by_session(&ctx.user_id, &ctx.session_id)
            .await?)
    }

    pub async fn get_file(&self, ctx: &UserContext, job_id: &str) -> ApiResult<FileDetail> {
        let job = self.owned_job(ctx, job_id).await?;
        let records = self.records.list_by_job(job_id).await?;
        let valid_records = records.iter().filter(|r| r.is_valid).count();

        Ok(FileDetail {
            job,
            working_records: records.len(),
            valid_records,
            invalid_records: records.len() - valid_records,
        })
    }

    /// 删除文件及其全部依赖数据
    ///
    /// # 参数
    /// - confirmed: 用户已明确确认（删除不可恢复）
    pub async fn delete_file(
        &self,
        ctx: &UserContext,
        job_id: &str,
        confirmed: bool,
    ) -> ApiResult<CascadeReport> {
        if !confirmed {
            return Err(ApiError::ConfirmationRequired(format!(
                "删除文件 {} 将同时删除其全部发票记录与附件",
                job_id
            )));
        }

        let report = self.cascade.delete_file(ctx, job_id).await?;
        self.publisher.publish(RefreshEvent::FileDeleted {
            job_id: job_id.to_string(),
        });
        Ok(report)
    }

    async fn owned_job(&self, ctx: &UserContext, job_id: &str) -> ApiResult<UploadJob> {
        let job = self
            .jobs
            .find_by_id(job_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("上传任务 {}", job_id)))?;
        if job.owner_id != ctx.user_id {
            return Err(ApiError::Forbidden(format!("上传任务 {}", job_id)));
        }
        Ok(job)
    }
}
