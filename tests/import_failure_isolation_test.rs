// ==========================================
// 导入管道故障隔离测试
// ==========================================
// 测试目标: 上传失败只影响当前文件 / 建任务失败回收已上传字节
// 环境: mock 仓储 + mock 对象存储
// ==========================================

mod test_helpers;

use invoice_intake::domain::{FileImportOutcome, UserContext};
use invoice_intake::engine::{RefreshBus, RefreshEvent};
use invoice_intake::importer::{InvoiceImporter, InvoiceImporterImpl, SelectedFile};
use invoice_intake::JobStatus;
use std::sync::Arc;
use test_helpers::{
    new_op_log, valid_csv, FastConfig, MockJobRepository, MockObjectStore, MockRecordRepository,
};

fn ctx() -> UserContext {
    UserContext::new("user-1", "session-1")
}

fn csv_file(name: &str, rows: usize) -> SelectedFile {
    SelectedFile::new(name, valid_csv(rows).into_bytes())
}

struct Pipeline {
    jobs: Arc<MockJobRepository>,
    records: Arc<MockRecordRepository>,
    store: Arc<MockObjectStore>,
    bus: RefreshBus,
}

impl Pipeline {
    fn new(jobs: MockJobRepository) -> Self {
        let log = jobs.log.clone();
        Self {
            jobs: Arc::new(jobs),
            records: Arc::new(MockRecordRepository::new(log.clone())),
            store: Arc::new(MockObjectStore::new(log)),
            bus: RefreshBus::new(16),
        }
    }

    fn importer(&self) -> InvoiceImporterImpl {
        InvoiceImporterImpl::new(
            self.jobs.clone(),
            self.records.clone(),
            self.store.clone(),
            Arc::new(FastConfig),
            Arc::new(self.bus.clone()),
        )
    }
}

// ==========================================
// 上传失败
// ==========================================

#[tokio::test]
async fn test_upload_failure_skips_only_that_file() {
    let pipeline = Pipeline::new(MockJobRepository::new(new_op_log()));
    pipeline
        .store
        .fail_puts
        .lock()
        .unwrap()
        .insert("b.csv".to_string());
    let mut rx = pipeline.bus.subscribe();

    let outcomes = pipeline
        .importer()
        .import_selection(
            &ctx(),
            vec![csv_file("a.csv", 2), csv_file("b.csv", 3), csv_file("c.csv", 4)],
            None,
        )
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 3);
    match &outcomes[1] {
        FileImportOutcome::Failed {
            file_name,
            job_id,
            message,
        } => {
            assert_eq!(file_name, "b.csv");
            assert!(job_id.is_none());
            assert!(message.contains("connection reset"));
        }
        other => panic!("b.csv should fail: {other:?}"),
    }

    // 失败文件没有任务，也没有记录
    let jobs = pipeline.jobs.jobs.lock().unwrap().clone();
    assert_eq!(jobs.len(), 2);
    assert!(jobs.values().all(|j| j.file_name != "b.csv"));

    // 前后文件正常导入
    for (outcome, expected_rows) in [(&outcomes[0], 2), (&outcomes[2], 4)] {
        let summary = outcome.summary().expect("sibling imported");
        assert_eq!(summary.status, JobStatus::Completed);
        assert_eq!(summary.successful, expected_rows);
    }
    assert_eq!(pipeline.records.len(), 6);

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert_eq!(
        events.last(),
        Some(&RefreshEvent::SelectionImported {
            file_count: 3,
            failed_files: 1,
        })
    );
    let job_events = events
        .iter()
        .filter(|e| matches!(e, RefreshEvent::JobImported { .. }))
        .count();
    assert_eq!(job_events, 2);
}

// ==========================================
// 建任务失败
// ==========================================

#[tokio::test]
async fn test_job_insert_failure_removes_uploaded_bytes() {
    let pipeline = Pipeline::new(MockJobRepository {
        fail_insert: true,
        ..MockJobRepository::new(new_op_log())
    });

    let outcomes = pipeline
        .importer()
        .import_selection(&ctx(), vec![csv_file("a.csv", 2)], None)
        .await
        .unwrap();

    assert!(matches!(
        &outcomes[0],
        FileImportOutcome::Failed { job_id: None, .. }
    ));
    assert!(pipeline.store.objects.lock().unwrap().is_empty());
    assert_eq!(pipeline.records.len(), 0);

    let entries = pipeline.jobs.log.lock().unwrap().clone();
    let put = entries
        .iter()
        .find_map(|e| e.strip_prefix("store:put:"))
        .expect("upload attempted")
        .to_string();
    assert!(entries.contains(&format!("store:delete:{}", put)));
}

#[tokio::test]
async fn test_processing_failure_withdraws_job_and_bytes() {
    let pipeline = Pipeline::new(MockJobRepository {
        fail_mark_processing: true,
        ..MockJobRepository::new(new_op_log())
    });

    let outcomes = pipeline
        .importer()
        .import_selection(&ctx(), vec![csv_file("a.csv", 2), csv_file("b.csv", 1)], None)
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 2);
    for outcome in &outcomes {
        assert!(matches!(
            outcome,
            FileImportOutcome::Failed { job_id: None, .. }
        ));
    }

    // 不留下 PENDING 任务或无主的上传字节
    assert!(pipeline.jobs.jobs.lock().unwrap().is_empty());
    assert!(pipeline.store.objects.lock().unwrap().is_empty());
    assert!(pipeline.jobs.finalized.lock().unwrap().is_empty());
}
