// ==========================================
// 发票导入系统 - API 层
// ==========================================
// 职责: 面向用户操作的门面（上传/文件/发票），错误统一为 ApiError
// ==========================================

pub mod error;
pub mod file_api;
pub mod invoice_api;
pub mod upload_api;

pub use error::{ApiError, ApiResult};
pub use file_api::{FileApi, FileDetail};
pub use invoice_api::{InvoiceApi, InvoiceSummary};
pub use upload_api::{UploadApi, UploadResponse};
