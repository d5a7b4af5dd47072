// ==========================================
// 附件挂载测试
// ==========================================
// 测试目标: 仅 PDF / 仅有效记录 / 替换时删除旧对象 / 解除 / 限时链接 / 写库失败回收
// ==========================================

mod test_helpers;

use async_trait::async_trait;
use invoice_intake::api::ApiError;
use invoice_intake::domain::{DocumentRef, InvoiceRecord, UserContext};
use invoice_intake::engine::{AttachmentError, AttachmentService};
use invoice_intake::importer::SelectedFile;
use invoice_intake::repository::{InvoiceRecordRepository, RepositoryError, RepositoryResult};
use std::sync::Arc;
use std::time::Duration;
use test_helpers::{
    create_test_env, new_op_log, three_row_csv_with_bad_currency, working_record,
    MockObjectStore, MockRecordRepository, TestEnv,
};

fn ctx() -> UserContext {
    UserContext::new("user-1", "session-1")
}

/// 导入 3 行（1 行无效），返回 (有效记录, 无效记录)
async fn seeded_env() -> (TestEnv, InvoiceRecord, InvoiceRecord) {
    let env = create_test_env().await;
    env.state
        .upload_api
        .upload_files(
            &ctx(),
            vec![SelectedFile::new(
                "invoices.csv",
                three_row_csv_with_bad_currency().into_bytes(),
            )],
            None,
        )
        .await
        .unwrap();

    let records = env.state.invoice_api.list_working(&ctx()).await.unwrap();
    let valid = records.iter().find(|r| r.is_valid).unwrap().clone();
    let invalid = records.iter().find(|r| !r.is_valid).unwrap().clone();
    (env, valid, invalid)
}

#[tokio::test]
async fn test_attach_pdf_to_valid_record() {
    let (env, valid, _) = seeded_env().await;

    let document = env
        .state
        .invoice_api
        .attach_document(&ctx(), &valid.record_id, "invoice-001.pdf", b"%PDF-1.7".to_vec())
        .await
        .unwrap();

    assert_eq!(document.file_name, "invoice-001.pdf");
    assert!(document.key.contains(&valid.record_id));
    assert!(env.storage_dir.path().join(&document.key).exists());

    let summary = env.state.invoice_api.summary(&ctx()).await.unwrap();
    assert_eq!(summary.with_attachment, 1);

    let url = env
        .state
        .invoice_api
        .document_url(&ctx(), &valid.record_id)
        .await
        .unwrap();
    assert!(url.starts_with("http://files.test/"));
    assert!(url.contains(&document.key));
    assert!(url.contains("expires="));
}

#[tokio::test]
async fn test_non_pdf_rejected() {
    let (env, valid, _) = seeded_env().await;

    let result = env
        .state
        .invoice_api
        .attach_document(&ctx(), &valid.record_id, "scan.png", b"png".to_vec())
        .await;

    assert!(matches!(result, Err(ApiError::InvalidInput(_))));
}

#[tokio::test]
async fn test_invalid_record_cannot_take_attachment() {
    let (env, _, invalid) = seeded_env().await;

    let result = env
        .state
        .invoice_api
        .attach_document(&ctx(), &invalid.record_id, "scan.pdf", b"%PDF".to_vec())
        .await;

    assert!(matches!(result, Err(ApiError::NotEligible(_))));
}

#[tokio::test]
async fn test_empty_pdf_rejected() {
    let (env, valid, _) = seeded_env().await;
    let result = env
        .state
        .invoice_api
        .attach_document(&ctx(), &valid.record_id, "scan.pdf", Vec::new())
        .await;
    assert!(matches!(result, Err(ApiError::InvalidInput(_))));
}

#[tokio::test]
async fn test_other_user_cannot_attach() {
    let (env, valid, _) = seeded_env().await;
    let stranger = UserContext::new("user-2", "session-2");

    let result = env
        .state
        .invoice_api
        .attach_document(&stranger, &valid.record_id, "scan.pdf", b"%PDF".to_vec())
        .await;

    assert!(matches!(result, Err(ApiError::Forbidden(_))));
}

#[tokio::test]
async fn test_replace_deletes_previous_object() {
    let (env, valid, _) = seeded_env().await;
    let api = &env.state.invoice_api;

    let first = api
        .attach_document(&ctx(), &valid.record_id, "first.pdf", b"%PDF-1".to_vec())
        .await
        .unwrap();
    let second = api
        .attach_document(&ctx(), &valid.record_id, "second.pdf", b"%PDF-2".to_vec())
        .await
        .unwrap();

    assert_ne!(first.key, second.key);
    assert!(!env.storage_dir.path().join(&first.key).exists());
    assert!(env.storage_dir.path().join(&second.key).exists());

    let records = api.list_working(&ctx()).await.unwrap();
    let record = records.iter().find(|r| r.record_id == valid.record_id).unwrap();
    assert_eq!(record.document.as_ref().unwrap().key, second.key);
}

#[tokio::test]
async fn test_detach_clears_reference_and_object() {
    let (env, valid, _) = seeded_env().await;
    let api = &env.state.invoice_api;

    let document = api
        .attach_document(&ctx(), &valid.record_id, "scan.pdf", b"%PDF".to_vec())
        .await
        .unwrap();
    let detached = api.detach_document(&ctx(), &valid.record_id).await.unwrap();

    assert_eq!(detached.key, document.key);
    assert!(!env.storage_dir.path().join(&document.key).exists());
    assert!(matches!(
        api.document_url(&ctx(), &valid.record_id).await,
        Err(ApiError::NotFound(_))
    ));
    assert!(matches!(
        api.detach_document(&ctx(), &valid.record_id).await,
        Err(ApiError::NotFound(_))
    ));
}

// ==========================================
// 写库失败时回收新对象
// ==========================================

/// set_document 总是失败的记录仓储
struct FrozenRecords(MockRecordRepository);

#[async_trait]
impl InvoiceRecordRepository for FrozenRecords {
    async fn create(&self, record: &InvoiceRecord) -> RepositoryResult<()> {
        self.0.create(record).await
    }

    async fn find_by_id(&self, record_id: &str) -> RepositoryResult<Option<InvoiceRecord>> {
        self.0.find_by_id(record_id).await
    }

    async fn list_by_owner(&self, owner_id: &str) -> RepositoryResult<Vec<InvoiceRecord>> {
        self.0.list_by_owner(owner_id).await
    }

    async fn list_by_job(&self, job_id: &str) -> RepositoryResult<Vec<InvoiceRecord>> {
        self.0.list_by_job(job_id).await
    }

    async fn count_by_job(&self, job_id: &str) -> RepositoryResult<usize> {
        self.0.count_by_job(job_id).await
    }

    async fn set_document(
        &self,
        _record_id: &str,
        _document: Option<&DocumentRef>,
    ) -> RepositoryResult<()> {
        Err(RepositoryError::DatabaseConnectionError("read only".to_string()))
    }

    async fn delete(&self, record_id: &str) -> RepositoryResult<()> {
        self.0.delete(record_id).await
    }
}

#[tokio::test]
async fn test_failed_update_removes_new_object() {
    let log = new_op_log();
    let inner = MockRecordRepository::new(log.clone());
    let record = working_record("user-1", "job-1", 2, true);
    inner.insert(record.clone());

    let store = Arc::new(MockObjectStore::new(log.clone()));
    let service = AttachmentService::new(
        Arc::new(FrozenRecords(inner)),
        store.clone(),
        Duration::from_secs(60),
    );

    let err = service
        .attach(&ctx(), &record.record_id, "scan.pdf", b"%PDF".to_vec())
        .await
        .unwrap_err();

    assert!(matches!(err, AttachmentError::Repository(_)));
    assert!(store.objects.lock().unwrap().is_empty());

    let entries = log.lock().unwrap().clone();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].starts_with("store:put:"));
    assert!(entries[1].starts_with("store:delete:"));
}
