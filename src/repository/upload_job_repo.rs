// ==========================================
// 发票导入系统 - 导入任务 Repository Trait
// ==========================================
// 职责: 定义导入任务数据访问接口（不包含业务逻辑）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::job::{JobCompletion, UploadJob};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

// ==========================================
// UploadJobRepository Trait
// ==========================================
// 实现者: UploadJobRepositoryImpl（使用 rusqlite）
#[async_trait]
pub trait UploadJobRepository: Send + Sync {
    /// 新建任务（PENDING）
    async fn insert(&self, job: &UploadJob) -> RepositoryResult<()>;

    /// 按 ID 查询
    async fn find_by_id(&self, job_id: &str) -> RepositoryResult<Option<UploadJob>>;

    /// 查询用户的全部任务（按创建时间倒序）
    async fn list_by_owner(&self, owner_id: &str) -> RepositoryResult<Vec<UploadJob>>;

    /// 查询用户某一会话内的任务
    async fn list_by_session(
        &self,
        owner_id: &str,
        session_id: &str,
    ) -> RepositoryResult<Vec<UploadJob>>;

    /// PENDING → PROCESSING
    ///
    /// # 返回
    /// - Err(InvalidStateTransition): 当前状态不是 PENDING
    async fn mark_processing(
        &self,
        job_id: &str,
        started_at: DateTime<Utc>,
    ) -> RepositoryResult<()>;

    /// PROCESSING → COMPLETED/FAILED，同时写入汇总计数
    async fn finalize(&self, job_id: &str, completion: &JobCompletion) -> RepositoryResult<()>;

    /// 删除任务
    async fn delete(&self, job_id: &str) -> RepositoryResult<()>;
}
