// ==========================================
// 发票导入系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod import;
pub mod invoice;
pub mod job;
pub mod session;
pub mod types;

// 重导出核心类型
pub use import::{FailureEntry, FileImportOutcome, ImportSummary, ERROR_SUMMARY_LIMIT};
pub use invoice::{
    DocumentRef, InvoiceFields, InvoiceRecord, SubmittedInvoiceRecord, ValidatedRow,
};
pub use job::{JobCompletion, UploadJob};
pub use session::UserContext;
pub use types::{Currency, FileKind, JobStatus};
