// ==========================================
// 发票导入系统 - 导入任务领域模型
// ==========================================
// 用途: 每个上传文件对应一个 UploadJob
// 生命周期: 上传完成后创建（PENDING）→ 开始处理（PROCESSING）→ 终态
// 红线: 汇总计数仅在终态时写入
// ==========================================

use crate::domain::types::{FileKind, JobStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// UploadJob - 导入任务
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadJob {
    pub job_id: String,
    pub owner_id: String,   // 上传用户
    pub session_id: String, // 上传时的会话标识（显式持久化）

    // ===== 文件信息 =====
    pub file_name: String,
    pub file_kind: FileKind,
    pub source_key: String, // 对象存储键

    // ===== 状态与汇总 =====
    pub status: JobStatus,
    pub total_invoices: Option<i64>,
    pub successful_invoices: Option<i64>,
    pub failed_invoices: Option<i64>,
    pub error_summary: Option<String>,

    // ===== 时间 =====
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl UploadJob {
    /// 创建 PENDING 状态的新任务
    pub fn pending(
        owner_id: &str,
        session_id: &str,
        file_name: &str,
        file_kind: FileKind,
        source_key: &str,
    ) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            session_id: session_id.to_string(),
            file_name: file_name.to_string(),
            file_kind,
            source_key: source_key.to_string(),
            status: JobStatus::Pending,
            total_invoices: None,
            successful_invoices: None,
            failed_invoices: None,
            error_summary: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

// ==========================================
// JobCompletion - 任务终态写入内容
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobCompletion {
    pub status: JobStatus,
    pub total_invoices: i64,
    pub successful_invoices: i64,
    pub failed_invoices: i64,
    pub error_summary: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl JobCompletion {
    /// 文件级失败（解析失败等），没有任何行被处理
    pub fn failed_before_rows(message: String) -> Self {
        Self {
            status: JobStatus::Failed,
            total_invoices: 0,
            successful_invoices: 0,
            failed_invoices: 0,
            error_summary: Some(message),
            completed_at: Utc::now(),
        }
    }
}
