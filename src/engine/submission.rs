// ==========================================
// 发票导入系统 - 提交服务（工作记录 → 永久记录）
// ==========================================
// 流程: 读取用户工作记录 → 排除无效记录 → 复制为 SubmittedInvoiceRecord
//       → 删除已复制的原记录
// 约束: 无可提交记录时为空操作；单条失败只记录，不中止
// ==========================================

use crate::domain::invoice::{InvoiceRecord, SubmittedInvoiceRecord};
use crate::domain::session::UserContext;
use crate::repository::{InvoiceRecordRepository, RepositoryResult, SubmittedInvoiceRepository};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionFailure {
    pub record_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReport {
    pub submitted: usize,
    pub excluded_invalid: usize,
    pub submission_ids: Vec<String>,
    pub failures: Vec<SubmissionFailure>,
}

impl SubmissionReport {
    pub fn is_noop(&self) -> bool {
        self.submitted == 0 && self.failures.is_empty()
    }
}

pub struct SubmissionService {
    records: Arc<dyn InvoiceRecordRepository>,
    submitted: Arc<dyn SubmittedInvoiceRepository>,
}

impl SubmissionService {
    pub fn new(
        records: Arc<dyn InvoiceRecordRepository>,
        submitted: Arc<dyn SubmittedInvoiceRepository>,
    ) -> Self {
        Self { records, submitted }
    }

    /// 提交当前用户全部有效工作记录
    #[instrument(skip(self, ctx), fields(user_id = %ctx.user_id))]
    pub async fn submit_all(&self, ctx: &UserContext) -> RepositoryResult<SubmissionReport> {
        let working = self.records.list_by_owner(&ctx.user_id).await?;

        let (eligible, invalid): (Vec<InvoiceRecord>, Vec<InvoiceRecord>) =
            working.into_iter().partition(|r| r.is_valid);

        let mut report = SubmissionReport {
            excluded_invalid: invalid.len(),
            ..Default::default()
        };
        if eligible.is_empty() {
            info!(excluded_invalid = report.excluded_invalid, "无可提交记录");
            return Ok(report);
        }

        // 1. 复制
        let copies: Vec<SubmittedInvoiceRecord> = eligible
            .iter()
            .map(|r| SubmittedInvoiceRecord::from_working(r, &ctx.user_id))
            .collect();
        let copy_results = join_all(copies.iter().map(|c| self.submitted.create(c))).await;

        // 2. 删除已复制的原记录
        let mut to_remove = Vec::new();
        for ((record, copy), result) in eligible.iter().zip(&copies).zip(copy_results) {
            match result {
                Ok(()) => to_remove.push((record, copy)),
                Err(e) => {
                    warn!(record_id = %record.record_id, error = %e, "提交复制失败");
                    report.failures.push(SubmissionFailure {
                        record_id: record.record_id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let delete_results =
            join_all(to_remove.iter().map(|(record, _)| self.records.delete(&record.record_id)))
                .await;
        for ((record, copy), result) in to_remove.iter().zip(delete_results) {
            report.submitted += 1;
            report.submission_ids.push(copy.submission_id.clone());
            if let Err(e) = result {
                warn!(record_id = %record.record_id, error = %e, "已提交记录的原记录删除失败");
                report.failures.push(SubmissionFailure {
                    record_id: record.record_id.clone(),
                    message: format!("submitted but working copy not removed: {}", e),
                });
            }
        }

        info!(
            submitted = report.submitted,
            excluded_invalid = report.excluded_invalid,
            failures = report.failures.len(),
            "提交完成"
        );
        Ok(report)
    }
}
