// ==========================================
// 发票导入系统 - PDF 附件服务
// ==========================================
// 职责: 为有效工作记录挂载/解除 PDF，生成限时访问链接
// 约束: 仅 .pdf；仅有效记录可挂载；替换时旧对象尽力删除
// ==========================================

use crate::domain::invoice::DocumentRef;
use crate::domain::session::UserContext;
use crate::domain::InvoiceRecord;
use crate::repository::{InvoiceRecordRepository, RepositoryError};
use crate::storage::{attachment_key, ObjectStore, StorageError};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("仅支持 PDF 附件: {0}")]
    NotPdf(String),

    #[error("工作记录不存在: {0}")]
    RecordNotFound(String),

    #[error("无权操作该记录: {0}")]
    NotOwner(String),

    #[error("无效记录不能挂载附件: {0}")]
    NotEligible(String),

    #[error("记录没有附件: {0}")]
    NoDocument(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type AttachmentResult<T> = Result<T, AttachmentError>;

pub fn is_pdf_name(name: &str) -> bool {
    name.trim().to_lowercase().ends_with(".pdf")
}

pub struct AttachmentService {
    records: Arc<dyn InvoiceRecordRepository>,
    store: Arc<dyn ObjectStore>,
    url_ttl: Duration,
}

impl AttachmentService {
    pub fn new(
        records: Arc<dyn InvoiceRecordRepository>,
        store: Arc<dyn ObjectStore>,
        url_ttl: Duration,
    ) -> Self {
        Self {
            records,
            store,
            url_ttl,
        }
    }

    async fn owned_record(&self, ctx: &UserContext, record_id: &str) -> AttachmentResult<InvoiceRecord> {
        let record = self
            .records
            .find_by_id(record_id)
            .await?
            .ok_or_else(|| AttachmentError::RecordNotFound(record_id.to_string()))?;
        if record.owner_id != ctx.user_id {
            return Err(AttachmentError::NotOwner(record_id.to_string()));
        }
        Ok(record)
    }

    /// 挂载 PDF（已有附件时替换）
    pub async fn attach(
        &self,
        ctx: &UserContext,
        record_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> AttachmentResult<DocumentRef> {
        if !is_pdf_name(file_name) {
            return Err(AttachmentError::NotPdf(file_name.to_string()));
        }

        let record = self.owned_record(ctx, record_id).await?;
        if !record.accepts_attachment() {
            return Err(AttachmentError::NotEligible(record_id.to_string()));
        }

        let uploaded_at = Utc::now();
        let key = attachment_key(&ctx.user_id, record_id, uploaded_at, file_name);
        self.store.put(&key, bytes, None).await?;

        let document = DocumentRef {
            key: key.clone(),
            file_name: file_name.to_string(),
            uploaded_at,
        };
        if let Err(e) = self.records.set_document(record_id, Some(&document)).await {
            // 记录未更新，回收刚上传的对象
            if let Err(cleanup) = self.store.delete(&key).await {
                warn!(key = %key, error = %cleanup, "回收未挂载附件失败");
            }
            return Err(e.into());
        }

        if let Some(previous) = record.document.filter(|d| d.key != key) {
            if let Err(e) = self.store.delete(&previous.key).await {
                warn!(key = %previous.key, error = %e, "旧附件删除失败");
            }
        }

        info!(record_id, key = %key, "附件已挂载");
        Ok(document)
    }

    /// 解除附件，返回被解除的附件引用
    pub async fn detach(&self, ctx: &UserContext, record_id: &str) -> AttachmentResult<DocumentRef> {
        let record = self.owned_record(ctx, record_id).await?;
        let document = record
            .document
            .ok_or_else(|| AttachmentError::NoDocument(record_id.to_string()))?;

        self.records.set_document(record_id, None).await?;
        if let Err(e) = self.store.delete(&document.key).await {
            warn!(key = %document.key, error = %e, "附件对象删除失败");
        }

        info!(record_id, key = %document.key, "附件已解除");
        Ok(document)
    }

    /// 附件限时访问链接
    pub async fn document_url(&self, ctx: &UserContext, record_id: &str) -> AttachmentResult<String> {
        let record = self.owned_record(ctx, record_id).await?;
        let document = record
            .document
            .ok_or_else(|| AttachmentError::NoDocument(record_id.to_string()))?;
        Ok(self.store.presigned_url(&document.key, self.url_ttl).await?)
    }
}
