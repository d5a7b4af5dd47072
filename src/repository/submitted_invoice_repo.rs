// ==========================================
// 发票导入系统 - 正式台账 Repository
// ==========================================
// 职责: 提交后发票的写入与查询
// 红线: 台账记录只增不改
// ==========================================

use crate::domain::invoice::{DocumentRef, InvoiceFields, SubmittedInvoiceRecord};
use crate::repository::error::{lock_error, RepositoryResult};
use crate::repository::invoice_record_repo_impl::{currency_column, json_column};
use async_trait::async_trait;
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// SubmittedInvoiceRepository Trait
// ==========================================
#[async_trait]
pub trait SubmittedInvoiceRepository: Send + Sync {
    /// 写入一条台账记录
    async fn create(&self, record: &SubmittedInvoiceRecord) -> RepositoryResult<()>;

    /// 查询用户的台账记录（按提交时间倒序）
    async fn list_by_owner(&self, owner_id: &str) -> RepositoryResult<Vec<SubmittedInvoiceRecord>>;
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<SubmittedInvoiceRecord> {
    let document_json: Option<String> = row.get(11)?;
    let document = match document_json {
        Some(raw) => Some(json_column::<DocumentRef>(11, &raw)?),
        None => None,
    };

    Ok(SubmittedInvoiceRecord {
        submission_id: row.get(0)?,
        owner_id: row.get(1)?,
        fields: InvoiceFields {
            invoice_id: row.get(2)?,
            seller_id: row.get(3)?,
            debtor_id: row.get(4)?,
            currency: currency_column(row.get(5)?),
            amount: row.get(6)?,
            product: row.get(7)?,
            issue_date: row.get(8)?,
            due_date: row.get(9)?,
        },
        upload_date: row.get(10)?,
        document,
        submitted_at: row.get(12)?,
        submitted_by: row.get(13)?,
        original_job_id: row.get(14)?,
        original_record_id: row.get(15)?,
    })
}

// ==========================================
// SubmittedInvoiceRepositoryImpl
// ==========================================
pub struct SubmittedInvoiceRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl SubmittedInvoiceRepositoryImpl {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl SubmittedInvoiceRepository for SubmittedInvoiceRepositoryImpl {
    async fn create(&self, record: &SubmittedInvoiceRecord) -> RepositoryResult<()> {
        let document_json = record
            .document
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.conn.lock().map_err(lock_error)?;
        conn.execute(
            r#"
            INSERT INTO submitted_invoice (
                submission_id, owner_id, invoice_id, seller_id, debtor_id,
                currency, amount, product, issue_date, due_date, upload_date,
                document, submitted_at, submitted_by, original_job_id, original_record_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
            params![
                record.submission_id,
                record.owner_id,
                record.fields.invoice_id,
                record.fields.seller_id,
                record.fields.debtor_id,
                record.fields.currency.map(|c| c.code()),
                record.fields.amount,
                record.fields.product,
                record.fields.issue_date,
                record.fields.due_date,
                record.upload_date,
                document_json,
                record.submitted_at,
                record.submitted_by,
                record.original_job_id,
                record.original_record_id,
            ],
        )?;
        Ok(())
    }

    async fn list_by_owner(&self, owner_id: &str) -> RepositoryResult<Vec<SubmittedInvoiceRecord>> {
        let conn = self.conn.lock().map_err(lock_error)?;
        let mut stmt = conn.prepare(
            r#"
            SELECT submission_id, owner_id, invoice_id, seller_id, debtor_id,
                   currency, amount, product, issue_date, due_date, upload_date,
                   document, submitted_at, submitted_by, original_job_id, original_record_id
            FROM submitted_invoice
            WHERE owner_id = ?1
            ORDER BY submitted_at DESC
            "#,
        )?;
        let records = stmt
            .query_map(params![owner_id], map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}
