// ==========================================
// 发票导入系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 行级校验失败不是错误，作为数据记录在 InvoiceRecord 上
// ==========================================

use crate::config::ConfigError;
use crate::repository::RepositoryError;
use crate::storage::StorageError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 选择文件错误 =====
    #[error("所选文件包含不支持的类型，未处理任何文件（仅支持 .csv/.xlsx/.xls）: {rejected:?}")]
    RejectedSelection { rejected: Vec<String> },

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv）")]
    UnsupportedFormat(String),

    // ===== 文件解析错误 =====
    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 外部协作方错误 =====
    #[error("对象存储失败: {0}")]
    Storage(#[from] StorageError),

    #[error("数据存储失败: {0}")]
    Repository(#[from] RepositoryError),

    #[error("配置读取失败: {0}")]
    Config(#[from] ConfigError),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
