// ==========================================
// 发票导入系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，把各层技术错误转换为用户可读的错误消息
// ==========================================

use crate::config::ConfigError;
use crate::engine::{AttachmentError, CascadeError};
use crate::importer::ImportError;
use crate::repository::error::RepositoryError;
use crate::storage::StorageError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 输入拒绝
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("所选文件未被处理: {0}")]
    SelectionRejected(String),

    #[error("删除不可恢复，需要明确确认: {0}")]
    ConfirmationRequired(String),

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无权访问: {0}")]
    Forbidden(String),

    #[error("不满足操作条件: {0}")]
    NotEligible(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    /// 级联删除部分失败（需人工重试）
    #[error("级联删除未完成: {0}")]
    CascadeFailed(String),

    // ==========================================
    // 外部协作方错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("对象存储错误: {0}")]
    StorageError(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("文件导入失败: {0}")]
    ImportError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition { from, to }
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::DatabaseConnectionError(msg)
            | RepositoryError::LockError(msg)
            | RepositoryError::DatabaseQueryError(msg)
            | RepositoryError::UniqueConstraintViolation(msg) => ApiError::DatabaseError(msg),
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => ApiError::NotFound(format!("对象 {}", key)),
            StorageError::InvalidKey(key) => ApiError::InvalidInput(format!("存储键 {}", key)),
            other => ApiError::StorageError(other.to_string()),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::RejectedSelection { .. } | ImportError::UnsupportedFormat(_) => {
                ApiError::SelectionRejected(err.to_string())
            }
            ImportError::Repository(e) => e.into(),
            ImportError::Storage(e) => e.into(),
            ImportError::Config(e) => e.into(),
            other => ApiError::ImportError(other.to_string()),
        }
    }
}

impl From<CascadeError> for ApiError {
    fn from(err: CascadeError) -> Self {
        match err {
            CascadeError::JobNotFound { job_id } => ApiError::NotFound(format!("上传任务 {}", job_id)),
            CascadeError::NotOwner { job_id } => ApiError::Forbidden(format!("上传任务 {}", job_id)),
            CascadeError::Repository(e) => e.into(),
            other => ApiError::CascadeFailed(other.to_string()),
        }
    }
}

impl From<AttachmentError> for ApiError {
    fn from(err: AttachmentError) -> Self {
        match err {
            AttachmentError::NotPdf(name) => ApiError::InvalidInput(format!("仅支持 PDF: {}", name)),
            AttachmentError::RecordNotFound(id) => ApiError::NotFound(format!("工作记录 {}", id)),
            AttachmentError::NotOwner(id) => ApiError::Forbidden(format!("工作记录 {}", id)),
            AttachmentError::NotEligible(id) => {
                ApiError::NotEligible(format!("无效记录不能挂载附件: {}", id))
            }
            AttachmentError::NoDocument(id) => ApiError::NotFound(format!("记录 {} 的附件", id)),
            AttachmentError::Storage(e) => e.into(),
            AttachmentError::Repository(e) => e.into(),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
