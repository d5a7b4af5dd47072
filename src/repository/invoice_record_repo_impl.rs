// ==========================================
// 发票导入系统 - 工作区发票 Repository 实现
// ==========================================
// 职责: 实现工作区发票数据访问（使用 rusqlite）
// 存储: validation_errors / document 以 JSON 文本列保存
// ==========================================

use crate::domain::invoice::{DocumentRef, InvoiceFields, InvoiceRecord};
use crate::domain::types::Currency;
use crate::repository::error::{lock_error, RepositoryError, RepositoryResult};
use crate::repository::invoice_record_repo::InvoiceRecordRepository;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT record_id, owner_id, job_id, row_number, invoice_id, seller_id, debtor_id,
           currency, amount, product, issue_date, due_date, upload_date,
           is_valid, validation_errors, document
    FROM invoice_record
"#;

/// JSON 文本列解析失败 → FromSqlConversionFailure
pub(crate) fn json_column<T: serde::de::DeserializeOwned>(
    idx: usize,
    raw: &str,
) -> rusqlite::Result<T> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// 币种列（历史脏值按空处理）
pub(crate) fn currency_column(raw: Option<String>) -> Option<Currency> {
    raw.and_then(|c| c.parse::<Currency>().ok())
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<InvoiceRecord> {
    let row_number: i64 = row.get(3)?;
    let errors_json: String = row.get(14)?;
    let document_json: Option<String> = row.get(15)?;

    let document = match document_json {
        Some(raw) => Some(json_column::<DocumentRef>(15, &raw)?),
        None => None,
    };

    Ok(InvoiceRecord {
        record_id: row.get(0)?,
        owner_id: row.get(1)?,
        job_id: row.get(2)?,
        row_number: row_number.max(0) as usize,
        fields: InvoiceFields {
            invoice_id: row.get(4)?,
            seller_id: row.get(5)?,
            debtor_id: row.get(6)?,
            currency: currency_column(row.get(7)?),
            amount: row.get(8)?,
            product: row.get(9)?,
            issue_date: row.get(10)?,
            due_date: row.get(11)?,
        },
        upload_date: row.get(12)?,
        is_valid: row.get(13)?,
        validation_errors: json_column(14, &errors_json)?,
        document,
    })
}

// ==========================================
// InvoiceRecordRepositoryImpl
// ==========================================
pub struct InvoiceRecordRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl InvoiceRecordRepositoryImpl {
    /// 从共享连接创建
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl InvoiceRecordRepository for InvoiceRecordRepositoryImpl {
    async fn create(&self, record: &InvoiceRecord) -> RepositoryResult<()> {
        let errors_json = serde_json::to_string(&record.validation_errors)?;
        let document_json = record
            .document
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.conn.lock().map_err(lock_error)?;
        conn.execute(
            r#"
            INSERT INTO invoice_record (
                record_id, owner_id, job_id, row_number, invoice_id, seller_id, debtor_id,
                currency, amount, product, issue_date, due_date, upload_date,
                is_valid, validation_errors, document
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
            params![
                record.record_id,
                record.owner_id,
                record.job_id,
                record.row_number as i64,
                record.fields.invoice_id,
                record.fields.seller_id,
                record.fields.debtor_id,
                record.fields.currency.map(|c| c.code()),
                record.fields.amount,
                record.fields.product,
                record.fields.issue_date,
                record.fields.due_date,
                record.upload_date,
                record.is_valid,
                errors_json,
                document_json,
            ],
        )?;
        Ok(())
    }

    async fn find_by_id(&self, record_id: &str) -> RepositoryResult<Option<InvoiceRecord>> {
        let conn = self.conn.lock().map_err(lock_error)?;
        let sql = format!("{} WHERE record_id = ?1", SELECT_COLUMNS);
        let record = conn
            .query_row(&sql, params![record_id], map_row)
            .optional()?;
        Ok(record)
    }

    async fn list_by_owner(&self, owner_id: &str) -> RepositoryResult<Vec<InvoiceRecord>> {
        let conn = self.conn.lock().map_err(lock_error)?;
        let sql = format!(
            "{} WHERE owner_id = ?1 ORDER BY upload_date DESC, row_number ASC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![owner_id], map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    async fn list_by_job(&self, job_id: &str) -> RepositoryResult<Vec<InvoiceRecord>> {
        let conn = self.conn.lock().map_err(lock_error)?;
        let sql = format!("{} WHERE job_id = ?1 ORDER BY row_number ASC", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![job_id], map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    async fn count_by_job(&self, job_id: &str) -> RepositoryResult<usize> {
        let conn = self.conn.lock().map_err(lock_error)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM invoice_record WHERE job_id = ?1",
            params![job_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as usize)
    }

    async fn set_document(
        &self,
        record_id: &str,
        document: Option<&DocumentRef>,
    ) -> RepositoryResult<()> {
        let document_json = document.map(serde_json::to_string).transpose()?;

        let conn = self.conn.lock().map_err(lock_error)?;
        let affected = conn.execute(
            "UPDATE invoice_record SET document = ?1 WHERE record_id = ?2",
            params![document_json, record_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "InvoiceRecord".to_string(),
                id: record_id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete(&self, record_id: &str) -> RepositoryResult<()> {
        let conn = self.conn.lock().map_err(lock_error)?;
        let affected = conn.execute(
            "DELETE FROM invoice_record WHERE record_id = ?1",
            params![record_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "InvoiceRecord".to_string(),
                id: record_id.to_string(),
            });
        }
        Ok(())
    }
}
