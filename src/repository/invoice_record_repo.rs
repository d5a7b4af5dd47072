// ==========================================
// 发票导入系统 - 工作区发票 Repository Trait
// ==========================================
// 职责: 工作区发票记录的创建/查询/附件更新/删除
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::invoice::{DocumentRef, InvoiceRecord};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// InvoiceRecordRepository Trait
// ==========================================
// 实现者: InvoiceRecordRepositoryImpl（使用 rusqlite）
#[async_trait]
pub trait InvoiceRecordRepository: Send + Sync {
    /// 创建单条记录（分批导入时并发调用）
    async fn create(&self, record: &InvoiceRecord) -> RepositoryResult<()>;

    /// 按 ID 查询
    async fn find_by_id(&self, record_id: &str) -> RepositoryResult<Option<InvoiceRecord>>;

    /// 查询用户的全部工作区记录
    async fn list_by_owner(&self, owner_id: &str) -> RepositoryResult<Vec<InvoiceRecord>>;

    /// 查询某任务的全部记录（按行号）
    async fn list_by_job(&self, job_id: &str) -> RepositoryResult<Vec<InvoiceRecord>>;

    /// 统计某任务已落库记录数（用于可见性轮询）
    async fn count_by_job(&self, job_id: &str) -> RepositoryResult<usize>;

    /// 设置/清除附件引用
    async fn set_document(
        &self,
        record_id: &str,
        document: Option<&DocumentRef>,
    ) -> RepositoryResult<()>;

    /// 删除单条记录
    async fn delete(&self, record_id: &str) -> RepositoryResult<()>;
}
