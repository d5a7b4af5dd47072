// ==========================================
// 发票导入系统 - 导入任务 Repository 实现
// ==========================================
// 职责: 实现导入任务数据访问（使用 rusqlite）
// 约束: 状态迁移使用带前置状态条件的 UPDATE，保证只向前
// ==========================================

use crate::domain::job::{JobCompletion, UploadJob};
use crate::domain::types::{FileKind, JobStatus};
use crate::repository::error::{lock_error, RepositoryError, RepositoryResult};
use crate::repository::upload_job_repo::UploadJobRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT job_id, owner_id, session_id, file_name, file_kind, source_key, status,
           total_invoices, successful_invoices, failed_invoices, error_summary,
           created_at, started_at, completed_at
    FROM upload_job
"#;

fn map_row(row: &Row<'_>) -> rusqlite::Result<UploadJob> {
    let file_kind: String = row.get(4)?;
    let status: String = row.get(6)?;

    Ok(UploadJob {
        job_id: row.get(0)?,
        owner_id: row.get(1)?,
        session_id: row.get(2)?,
        file_name: row.get(3)?,
        file_kind: file_kind.parse::<FileKind>().unwrap_or(FileKind::Csv),
        source_key: row.get(5)?,
        status: status.parse::<JobStatus>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                6,
                rusqlite::types::Type::Text,
                e.into(),
            )
        })?,
        total_invoices: row.get(7)?,
        successful_invoices: row.get(8)?,
        failed_invoices: row.get(9)?,
        error_summary: row.get(10)?,
        created_at: row.get(11)?,
        started_at: row.get(12)?,
        completed_at: row.get(13)?,
    })
}

// ==========================================
// UploadJobRepositoryImpl
// ==========================================
pub struct UploadJobRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl UploadJobRepositoryImpl {
    /// 从共享连接创建
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 读取当前状态
    fn current_status(conn: &Connection, job_id: &str) -> RepositoryResult<JobStatus> {
        let status: Option<String> = conn
            .query_row(
                "SELECT status FROM upload_job WHERE job_id = ?1",
                params![job_id],
                |row| row.get(0),
            )
            .optional()?;

        match status {
            Some(s) => s
                .parse::<JobStatus>()
                .map_err(RepositoryError::InternalError),
            None => Err(RepositoryError::NotFound {
                entity: "UploadJob".to_string(),
                id: job_id.to_string(),
            }),
        }
    }

    /// 校验 当前状态 → `to` 是否合法，返回当前状态（作为 UPDATE 的前置条件）
    fn check_transition(
        conn: &Connection,
        job_id: &str,
        to: JobStatus,
    ) -> RepositoryResult<JobStatus> {
        let from = Self::current_status(conn, job_id)?;
        if !from.can_transition_to(to) {
            return Err(RepositoryError::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        Ok(from)
    }

    fn transition_error(conn: &Connection, job_id: &str, to: JobStatus) -> RepositoryError {
        match Self::current_status(conn, job_id) {
            Ok(from) => RepositoryError::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
            },
            Err(e) => e,
        }
    }
}

#[async_trait]
impl UploadJobRepository for UploadJobRepositoryImpl {
    async fn insert(&self, job: &UploadJob) -> RepositoryResult<()> {
        let conn = self.conn.lock().map_err(lock_error)?;
        conn.execute(
            r#"
            INSERT INTO upload_job (
                job_id, owner_id, session_id, file_name, file_kind, source_key, status,
                total_invoices, successful_invoices, failed_invoices, error_summary,
                created_at, started_at, completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                job.job_id,
                job.owner_id,
                job.session_id,
                job.file_name,
                job.file_kind.as_str(),
                job.source_key,
                job.status.as_str(),
                job.total_invoices,
                job.successful_invoices,
                job.failed_invoices,
                job.error_summary,
                job.created_at,
                job.started_at,
                job.completed_at,
            ],
        )?;
        Ok(())
    }

    async fn find_by_id(&self, job_id: &str) -> RepositoryResult<Option<UploadJob>> {
        let conn = self.conn.lock().map_err(lock_error)?;
        let sql = format!("{} WHERE job_id = ?1", SELECT_COLUMNS);
        let job = conn
            .query_row(&sql, params![job_id], map_row)
            .optional()?;
        Ok(job)
    }

    async fn list_by_owner(&self, owner_id: &str) -> RepositoryResult<Vec<UploadJob>> {
        let conn = self.conn.lock().map_err(lock_error)?;
        let sql = format!("{} WHERE owner_id = ?1 ORDER BY created_at DESC", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let jobs = stmt
            .query_map(params![owner_id], map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }

    async fn list_by_session(
        &self,
        owner_id: &str,
        session_id: &str,
    ) -> RepositoryResult<Vec<UploadJob>> {
        let conn = self.conn.lock().map_err(lock_error)?;
        let sql = format!(
            "{} WHERE owner_id = ?1 AND session_id = ?2 ORDER BY created_at DESC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let jobs = stmt
            .query_map(params![owner_id, session_id], map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }

    async fn mark_processing(
        &self,
        job_id: &str,
        started_at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let conn = self.conn.lock().map_err(lock_error)?;
        let from = Self::check_transition(&conn, job_id, JobStatus::Processing)?;
        let affected = conn.execute(
            "UPDATE upload_job SET status = ?1, started_at = ?2 WHERE job_id = ?3 AND status = ?4",
            params![
                JobStatus::Processing.as_str(),
                started_at,
                job_id,
                from.as_str(),
            ],
        )?;

        if affected == 0 {
            return Err(Self::transition_error(&conn, job_id, JobStatus::Processing));
        }
        Ok(())
    }

    async fn finalize(&self, job_id: &str, completion: &JobCompletion) -> RepositoryResult<()> {
        let conn = self.conn.lock().map_err(lock_error)?;
        let from = Self::check_transition(&conn, job_id, completion.status)?;
        let affected = conn.execute(
            r#"
            UPDATE upload_job
            SET status = ?1, total_invoices = ?2, successful_invoices = ?3,
                failed_invoices = ?4, error_summary = ?5, completed_at = ?6
            WHERE job_id = ?7 AND status = ?8
            "#,
            params![
                completion.status.as_str(),
                completion.total_invoices,
                completion.successful_invoices,
                completion.failed_invoices,
                completion.error_summary,
                completion.completed_at,
                job_id,
                from.as_str(),
            ],
        )?;

        if affected == 0 {
            return Err(Self::transition_error(&conn, job_id, completion.status));
        }
        Ok(())
    }

    async fn delete(&self, job_id: &str) -> RepositoryResult<()> {
        let conn = self.conn.lock().map_err(lock_error)?;
        let affected = conn.execute("DELETE FROM upload_job WHERE job_id = ?1", params![job_id])?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "UploadJob".to_string(),
                id: job_id.to_string(),
            });
        }
        Ok(())
    }
}
