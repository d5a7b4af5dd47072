// ==========================================
// 发票导入系统 - 导入管道 Trait
// ==========================================
// 职责: 定义导入管道各阶段接口（不包含实现）
// 流程: 选择文件 → 上传 → 解析 → 行校验 → 分批落库 → 任务终态
// ==========================================

use crate::domain::import::FileImportOutcome;
use crate::domain::session::UserContext;
use crate::importer::error::ImportResult;
use crate::importer::file_ingestor::SelectedFile;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// 原始行记录（列名 → 文本值）
pub type RawRow = HashMap<String, String>;

// ==========================================
// InvoiceImporter Trait
// ==========================================
// 用途: 导入主接口
// 实现者: InvoiceImporterImpl
#[async_trait]
pub trait InvoiceImporter: Send + Sync {
    /// 导入一次选择的全部文件
    ///
    /// # 参数
    /// - ctx: 当前用户与会话
    /// - files: 用户选择的文件
    /// - listener: 上传进度监听（可选）
    ///
    /// # 返回
    /// - Ok(Vec<FileImportOutcome>): 每个文件的处理结果（文件间互不影响）
    /// - Err(RejectedSelection): 选择中含不支持的文件类型，整批未处理
    ///
    /// # 说明
    /// - 文件严格按顺序处理，不并发
    async fn import_selection(
        &self,
        ctx: &UserContext,
        files: Vec<SelectedFile>,
        listener: Option<Arc<dyn UploadProgressListener>>,
    ) -> ImportResult<Vec<FileImportOutcome>>;
}

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 文件字节 → 原始行记录
// 实现者: CsvParser, ExcelParser
pub trait FileParser: Send + Sync {
    /// 解析为原始行记录
    ///
    /// # 返回
    /// - Ok(Vec<RawRow>): 行记录列表（空文件/仅表头 → 空列表）
    /// - Err: 文件内容无法解码
    fn parse_to_raw_records(&self, bytes: &[u8]) -> ImportResult<Vec<RawRow>>;
}

// ==========================================
// UploadProgressListener Trait
// ==========================================
// 用途: 上传进度反馈（百分比）
pub trait UploadProgressListener: Send + Sync {
    fn on_progress(&self, file_name: &str, percent: u8);
}
