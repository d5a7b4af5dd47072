// ==========================================
// 发票导入系统 - 导入结果模型
// ==========================================
// 用途: 分批导入汇总 / 单行失败明细 / 单文件结果
// ==========================================

use crate::domain::job::UploadJob;
use crate::domain::types::JobStatus;
use serde::{Deserialize, Serialize};

/// 错误摘要中保留的失败条目数
pub const ERROR_SUMMARY_LIMIT: usize = 3;

// ==========================================
// FailureEntry - 单行失败明细
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub row: usize,
    pub invoice_id: Option<String>,
    pub errors: Vec<String>,
}

impl FailureEntry {
    /// 缩写形式: 行号 + 第一条错误
    pub fn abbreviated(&self) -> String {
        let prefix = format!("Row {}:", self.row);
        match self.errors.first() {
            // 校验消息自带行号前缀
            Some(first) if first.starts_with(&prefix) => first.clone(),
            Some(first) => format!("{} {}", prefix, first),
            None => format!("{} unknown error", prefix),
        }
    }
}

// ==========================================
// ImportSummary - 单个任务的分批导入汇总
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub job_id: String,
    pub status: JobStatus,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub persisted: usize, // 实际写入存储的行数（含无效行）
    pub batches: usize,
    pub failures: Vec<FailureEntry>,
    pub error_summary: Option<String>,
}

impl ImportSummary {
    /// 终态判定: 有尝试且全部失败 → FAILED，其余 → COMPLETED
    pub fn final_status(attempted: usize, successful: usize) -> JobStatus {
        if attempted > 0 && successful == 0 {
            JobStatus::Failed
        } else {
            JobStatus::Completed
        }
    }

    /// 截断的错误摘要（前 3 条失败）
    pub fn summarize_failures(failures: &[FailureEntry]) -> Option<String> {
        if failures.is_empty() {
            return None;
        }

        let mut summary = failures
            .iter()
            .take(ERROR_SUMMARY_LIMIT)
            .map(FailureEntry::abbreviated)
            .collect::<Vec<_>>()
            .join("; ");

        if failures.len() > ERROR_SUMMARY_LIMIT {
            summary.push_str(&format!(" (+{} more)", failures.len() - ERROR_SUMMARY_LIMIT));
        }
        Some(summary)
    }
}

// ==========================================
// FileImportOutcome - 单文件处理结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FileImportOutcome {
    /// 已完成导入（任务终态可能为 COMPLETED 或 FAILED）
    Imported {
        file_name: String,
        job: UploadJob,
        summary: ImportSummary,
    },
    /// 文件级失败（上传失败/解析失败），不影响同批其它文件
    Failed {
        file_name: String,
        job_id: Option<String>,
        message: String,
    },
}

impl FileImportOutcome {
    pub fn file_name(&self) -> &str {
        match self {
            FileImportOutcome::Imported { file_name, .. } => file_name,
            FileImportOutcome::Failed { file_name, .. } => file_name,
        }
    }

    pub fn summary(&self) -> Option<&ImportSummary> {
        match self {
            FileImportOutcome::Imported { summary, .. } => Some(summary),
            FileImportOutcome::Failed { .. } => None,
        }
    }
}
