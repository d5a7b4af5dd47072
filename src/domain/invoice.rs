// ==========================================
// 发票导入系统 - 发票领域模型
// ==========================================
// InvoiceRecord: 工作区记录（导入后、提交前）
// SubmittedInvoiceRecord: 正式台账记录（提交后不可变）
// 红线: is_valid == validation_errors.is_empty()
// ==========================================

use crate::domain::types::Currency;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// DocumentRef - 附件引用（PDF）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub key: String,       // 对象存储键
    pub file_name: String, // 原始文件名
    pub uploaded_at: DateTime<Utc>,
}

// ==========================================
// InvoiceFields - 行校验产出的业务字段
// ==========================================
// 说明: 校验失败的字段保持为空，不影响其它字段
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InvoiceFields {
    pub invoice_id: String,
    pub seller_id: String,
    pub debtor_id: String,
    pub currency: Option<Currency>,
    pub amount: Option<f64>,
    pub product: String,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

// ==========================================
// ValidatedRow - 行校验结果（尚未落库）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedRow {
    pub row_number: usize, // 展示行号（表头为第 1 行）
    pub fields: InvoiceFields,
    pub is_valid: bool,
    pub validation_errors: Vec<String>,
}

// ==========================================
// InvoiceRecord - 工作区发票记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub record_id: String,
    pub owner_id: String,
    pub job_id: String,
    pub row_number: usize,

    #[serde(flatten)]
    pub fields: InvoiceFields,

    pub upload_date: DateTime<Utc>,
    pub is_valid: bool,
    pub validation_errors: Vec<String>,
    pub document: Option<DocumentRef>,
}

impl InvoiceRecord {
    /// 由校验结果生成待落库记录
    pub fn from_validated(owner_id: &str, job_id: &str, row: ValidatedRow) -> Self {
        Self {
            record_id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            job_id: job_id.to_string(),
            row_number: row.row_number,
            fields: row.fields,
            upload_date: Utc::now(),
            is_valid: row.is_valid,
            validation_errors: row.validation_errors,
            document: None,
        }
    }

    /// 是否可挂载附件（仅有效记录）
    pub fn accepts_attachment(&self) -> bool {
        self.is_valid
    }
}

// ==========================================
// SubmittedInvoiceRecord - 正式台账记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedInvoiceRecord {
    pub submission_id: String,
    pub owner_id: String,

    #[serde(flatten)]
    pub fields: InvoiceFields,

    pub upload_date: DateTime<Utc>,
    pub document: Option<DocumentRef>,

    // ===== 提交元信息 =====
    pub submitted_at: DateTime<Utc>,
    pub submitted_by: String,
    pub original_job_id: String,
    pub original_record_id: String,
}

impl SubmittedInvoiceRecord {
    /// 从工作区记录复制（调用方保证记录有效）
    pub fn from_working(record: &InvoiceRecord, submitted_by: &str) -> Self {
        Self {
            submission_id: Uuid::new_v4().to_string(),
            owner_id: record.owner_id.clone(),
            fields: record.fields.clone(),
            upload_date: record.upload_date,
            document: record.document.clone(),
            submitted_at: Utc::now(),
            submitted_by: submitted_by.to_string(),
            original_job_id: record.job_id.clone(),
            original_record_id: record.record_id.clone(),
        }
    }
}
