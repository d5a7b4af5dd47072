// ==========================================
// 发票导入系统 - 对象存储层
// ==========================================
// 职责: 上传文件与 PDF 附件的字节存储
// ==========================================

pub mod keys;
pub mod local;
pub mod traits;

pub use keys::{attachment_key, sanitize_file_name, upload_key};
pub use local::{LocalObjectStore, StorageSettings};
pub use traits::{ObjectStore, ProgressFn, StorageError, StorageResult};
