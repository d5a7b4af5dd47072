// ==========================================
// 发票导入系统 - 发票API
// ==========================================
// 职责: 工作记录查询与汇总 / PDF 附件 / 提交 / 永久记录查询
// 约束: 无效记录不计入金额汇总，也不能挂载附件或提交
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::invoice::{DocumentRef, InvoiceRecord, SubmittedInvoiceRecord};
use crate::domain::session::UserContext;
use crate::domain::types::Currency;
use crate::engine::{
    AttachmentService, RefreshEvent, RefreshPublisher, SubmissionReport, SubmissionService,
};
use crate::repository::{InvoiceRecordRepository, SubmittedInvoiceRepository};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// 工作区汇总
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceSummary {
    pub total_records: usize,
    pub valid_records: usize,
    pub invalid_records: usize,
    pub with_attachment: usize,
    /// 仅有效记录的金额合计（按币种）
    pub totals_by_currency: BTreeMap<Currency, f64>,
}

impl InvoiceSummary {
    pub fn from_records(records: &[InvoiceRecord]) -> Self {
        let mut summary = InvoiceSummary {
            total_records: records.len(),
            ..Default::default()
        };

        for record in records {
            if record.document.is_some() {
                summary.with_attachment += 1;
            }
            if !record.is_valid {
                summary.invalid_records += 1;
                continue;
            }
            summary.valid_records += 1;
            if let (Some(currency), Some(amount)) = (record.fields.currency, record.fields.amount) {
                *summary.totals_by_currency.entry(currency).or_insert(0.0) += amount;
            }
        }
        summary
    }
}

/// 发票API
pub struct InvoiceApi {
    records: Arc<dyn InvoiceRecordRepository>,
    submitted: Arc<dyn SubmittedInvoiceRepository>,
    attachments: AttachmentService,
    submission: SubmissionService,
    publisher: Arc<dyn RefreshPublisher>,
}

impl InvoiceApi {
    pub fn new(
        records: Arc<dyn InvoiceRecordRepository>,
        submitted: Arc<dyn SubmittedInvoiceRepository>,
        attachments: AttachmentService,
        submission: SubmissionService,
        publisher: Arc<dyn RefreshPublisher>,
    ) -> Self {
        Self {
            records,
            submitted,
            attachments,
            submission,
            publisher,
        }
    }

    // ===== 查询 =====

    pub async fn list_working(&self, ctx: &UserContext) -> ApiResult<Vec<InvoiceRecord>> {
        Ok(self.records.list_by_owner(&ctx.user_id).await?)
    }

    pub async fn list_by_job(&self, ctx: &UserContext, job_id: &str) -> ApiResult<Vec<InvoiceRecord>> {
        let records = self.records.list_by_job(job_id).await?;
        Ok(records
            .into_iter()
            .filter(|r| r.owner_id == ctx.user_id)
            .collect())
    }

    pub async fn list_submitted(&self, ctx: &UserContext) -> ApiResult<Vec<SubmittedInvoiceRecord>> {
        Ok(self.submitted.list_by_owner(&ctx.user_id).await?)
    }

    pub async fn summary(&self, ctx: &UserContext) -> ApiResult<InvoiceSummary> {
        let records = self.records.list_by_owner(&ctx.user_id).await?;
        Ok(InvoiceSummary::from_records(&records))
    }

    // ===== 附件 =====

    pub async fn attach_document(
        &self,
        ctx: &UserContext,
        record_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> ApiResult<DocumentRef> {
        if bytes.is_empty() {
            return Err(ApiError::InvalidInput(format!("附件为空: {}", file_name)));
        }
        let document = self
            .attachments
            .attach(ctx, record_id, file_name, bytes)
            .await?;
        self.publisher.publish(RefreshEvent::RecordsChanged {
            record_id: record_id.to_string(),
        });
        Ok(document)
    }

    pub async fn detach_document(&self, ctx: &UserContext, record_id: &str) -> ApiResult<DocumentRef> {
        let document = self.attachments.detach(ctx, record_id).await?;
        self.publisher.publish(RefreshEvent::RecordsChanged {
            record_id: record_id.to_string(),
        });
        Ok(document)
    }

    pub async fn document_url(&self, ctx: &UserContext, record_id: &str) -> ApiResult<String> {
        Ok(self.attachments.document_url(ctx, record_id).await?)
    }

    // ===== 提交 =====

    /// 提交全部有效工作记录（无可提交记录时为空操作）
    pub async fn submit_all(&self, ctx: &UserContext) -> ApiResult<SubmissionReport> {
        let report = self.submission.submit_all(ctx).await?;
        if !report.is_noop() {
            self.publisher.publish(RefreshEvent::Submitted {
                submitted: report.submitted,
            });
        }
        Ok(report)
    }
}
