// ==========================================
// 发票导入系统 - 分批导入器
// ==========================================
// 职责: 校验后的行 → 工作记录，分批写入存储并汇总任务终态
// 并发: 批与批之间严格串行；批内逐行并发写入，全部落定后才进入下一批
// 终态: 至少尝试一行且全部失败 → FAILED，否则 COMPLETED
// ==========================================

use crate::config::defaults;
use crate::domain::import::{FailureEntry, ImportSummary};
use crate::domain::invoice::{InvoiceRecord, ValidatedRow};
use crate::domain::job::JobCompletion;
use crate::repository::{InvoiceRecordRepository, RepositoryResult, UploadJobRepository};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

pub struct BatchImporter {
    records: Arc<dyn InvoiceRecordRepository>,
    jobs: Arc<dyn UploadJobRepository>,
    batch_size: usize,
}

impl BatchImporter {
    pub fn new(
        records: Arc<dyn InvoiceRecordRepository>,
        jobs: Arc<dyn UploadJobRepository>,
        batch_size: usize,
    ) -> Self {
        Self {
            records,
            jobs,
            batch_size: if batch_size == 0 {
                defaults::IMPORT_BATCH_SIZE
            } else {
                batch_size
            },
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// 分批写入并更新任务终态（恰好一次）
    ///
    /// # 说明
    /// - 每一行（有效/无效）都落为工作记录，便于逐行查看错误
    /// - 只有“有效且写入成功”的行计为成功
    /// - 任务终态更新失败只记日志，不影响返回
    #[instrument(skip(self, rows), fields(rows = rows.len(), batch_size = self.batch_size))]
    pub async fn import(
        &self,
        owner_id: &str,
        job_id: &str,
        rows: Vec<ValidatedRow>,
    ) -> ImportSummary {
        let records: Vec<InvoiceRecord> = rows
            .into_iter()
            .map(|row| InvoiceRecord::from_validated(owner_id, job_id, row))
            .collect();

        let total = records.len();
        let mut successful = 0usize;
        let mut persisted = 0usize;
        let mut failures: Vec<FailureEntry> = Vec::new();
        let mut batches = 0usize;

        for (batch_index, chunk) in records.chunks(self.batch_size).enumerate() {
            batches += 1;
            debug!(batch = batch_index + 1, size = chunk.len(), "开始写入批次");

            // 批内并发，等待全部落定
            let results: Vec<RepositoryResult<()>> =
                join_all(chunk.iter().map(|record| self.records.create(record))).await;

            for (record, result) in chunk.iter().zip(results) {
                let mut errors = record.validation_errors.clone();
                match result {
                    Ok(()) => {
                        persisted += 1;
                        if record.is_valid {
                            successful += 1;
                            continue;
                        }
                    }
                    Err(e) => {
                        debug!(row = record.row_number, error = %e, "行写入失败");
                        errors.push(format!(
                            "Row {}: failed to save record: {}",
                            record.row_number, e
                        ));
                    }
                }
                failures.push(FailureEntry {
                    row: record.row_number,
                    invoice_id: Some(record.fields.invoice_id.clone())
                        .filter(|id| !id.is_empty()),
                    errors,
                });
            }
        }

        let failed = failures.len();
        let status = ImportSummary::final_status(total, successful);
        let error_summary = ImportSummary::summarize_failures(&failures);

        let completion = JobCompletion {
            status,
            total_invoices: total as i64,
            successful_invoices: successful as i64,
            failed_invoices: failed as i64,
            error_summary: error_summary.clone(),
            completed_at: Utc::now(),
        };
        if let Err(e) = self.jobs.finalize(job_id, &completion).await {
            // 终态写入尽力而为
            error!(job_id, error = %e, "任务终态更新失败");
        }

        info!(
            job_id,
            status = %status,
            total,
            successful,
            failed,
            batches,
            "导入批次处理完成"
        );

        ImportSummary {
            job_id: job_id.to_string(),
            status,
            total,
            successful,
            failed,
            persisted,
            batches,
            failures,
            error_summary,
        }
    }
}
