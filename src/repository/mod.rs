// ==========================================
// 发票导入系统 - 数据仓储层（文档存储）
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽存储细节
// 约束: 所有查询使用参数化; 所有列表查询按 owner 过滤
// ==========================================

pub mod error;
pub mod invoice_record_repo;
pub mod invoice_record_repo_impl;
pub mod submitted_invoice_repo;
pub mod upload_job_repo;
pub mod upload_job_repo_impl;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use invoice_record_repo::InvoiceRecordRepository;
pub use invoice_record_repo_impl::InvoiceRecordRepositoryImpl;
pub use submitted_invoice_repo::{SubmittedInvoiceRepository, SubmittedInvoiceRepositoryImpl};
pub use upload_job_repo::UploadJobRepository;
pub use upload_job_repo_impl::UploadJobRepositoryImpl;
