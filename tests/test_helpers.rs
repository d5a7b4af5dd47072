// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库/对象存储、测试数据生成、带操作日志的 mock 仓储
// ==========================================

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use invoice_intake::app::AppState;
use invoice_intake::config::{ConfigResult, IntakeConfigReader};
use invoice_intake::db::{init_schema, open_sqlite_connection};
use invoice_intake::domain::{
    DocumentRef, InvoiceFields, InvoiceRecord, JobCompletion, UploadJob, ValidatedRow,
};
use invoice_intake::{Currency, FileKind};
use invoice_intake::repository::{
    InvoiceRecordRepository, RepositoryError, RepositoryResult, UploadJobRepository,
};
use invoice_intake::storage::{ObjectStore, ProgressFn, StorageError, StorageResult, StorageSettings};
use rusqlite::Connection;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};

// ==========================================
// 测试数据
// ==========================================

pub const INVOICE_ID_1: &str = "123e4567-e89b-12d3-a456-426614174000";
pub const INVOICE_ID_2: &str = "223e4567-e89b-42d3-a456-426614174001";
pub const INVOICE_ID_3: &str = "323e4567-e89b-42d3-b456-426614174002";
pub const SELLER_ID: &str = "9b2f4c1e-3d5a-4f6b-8c7d-0e1f2a3b4c5d";
pub const DEBTOR_ID: &str = "6fa459ea-ee8a-3ca4-894e-db77e160355e";

pub const CSV_HEADER: &str =
    "invoice_id,seller_id,debtor_id,currency,amount,product,issue_date,due_date";

/// 生成一行 CSV 数据
pub fn csv_row(invoice_id: &str, currency: &str, amount: &str) -> String {
    format!(
        "{},{},{},{},{},Consulting services,2024-01-15,2024-02-15",
        invoice_id, SELLER_ID, DEBTOR_ID, currency, amount
    )
}

/// 3 行 CSV，第 2 个数据行币种无效
pub fn three_row_csv_with_bad_currency() -> String {
    [
        CSV_HEADER.to_string(),
        csv_row(INVOICE_ID_1, "USD", "100.00"),
        csv_row(INVOICE_ID_2, "XXX", "250.50"),
        csv_row(INVOICE_ID_3, "eur", "75"),
    ]
    .join("\n")
}

/// 生成 n 个有效数据行的 CSV
pub fn valid_csv(rows: usize) -> String {
    let mut lines = vec![CSV_HEADER.to_string()];
    for i in 0..rows {
        let id = format!("123e4567-e89b-42d3-a456-{:012}", i);
        lines.push(csv_row(&id, "USD", "10"));
    }
    lines.join("\n")
}

/// 构造工作记录（有效记录带完整字段）
pub fn working_record(owner_id: &str, job_id: &str, row_number: usize, is_valid: bool) -> InvoiceRecord {
    InvoiceRecord::from_validated(
        owner_id,
        job_id,
        ValidatedRow {
            row_number,
            fields: InvoiceFields {
                invoice_id: format!("123e4567-e89b-42d3-a456-{:012}", row_number),
                seller_id: SELLER_ID.to_string(),
                debtor_id: DEBTOR_ID.to_string(),
                currency: Some(Currency::Usd),
                amount: Some(100.0),
                product: "Consulting services".to_string(),
                issue_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 15),
                due_date: chrono::NaiveDate::from_ymd_opt(2024, 2, 15),
            },
            is_valid,
            validation_errors: if is_valid {
                vec![]
            } else {
                vec![format!("Row {}: amount is required", row_number)]
            },
        },
    )
}

/// 附件引用
pub fn document(key: &str) -> DocumentRef {
    DocumentRef {
        key: key.to_string(),
        file_name: "invoice.pdf".to_string(),
        uploaded_at: Utc::now(),
    }
}

/// 构造上传任务
pub fn upload_job(owner_id: &str, session_id: &str, file_name: &str) -> UploadJob {
    let key = format!("uploads/{}/{}", owner_id, file_name);
    UploadJob::pending(owner_id, session_id, file_name, FileKind::Csv, &key)
}

// ==========================================
// 临时数据库 / 应用状态
// ==========================================

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_string_lossy().to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开共享连接
pub fn shared_connection(db_path: &str) -> Arc<Mutex<Connection>> {
    let conn = open_sqlite_connection(db_path).expect("open db");
    init_schema(&conn).expect("init schema");
    Arc::new(Mutex::new(conn))
}

/// 测试环境（临时文件需保持存活）
pub struct TestEnv {
    pub _db_file: NamedTempFile,
    pub storage_dir: TempDir,
    pub db_path: String,
    pub state: AppState,
}

/// 创建完整应用状态（临时 SQLite + 临时对象存储目录）
pub async fn create_test_env() -> TestEnv {
    let (db_file, db_path) = create_test_db().expect("create test db");
    let storage_dir = tempfile::tempdir().expect("create storage dir");

    // 缩短可见性轮询，保证测试快速
    {
        let config = invoice_intake::config::ConfigManager::new(&db_path).expect("config");
        config
            .set_config_value("refresh_initial_delay_ms", "1")
            .expect("set config");
        config
            .set_config_value("refresh_max_delay_ms", "5")
            .expect("set config");
    }

    let settings = StorageSettings::new(storage_dir.path(), Some("http://files.test".to_string()));
    let state = AppState::with_storage(db_path.clone(), settings)
        .await
        .expect("create app state");

    TestEnv {
        _db_file: db_file,
        storage_dir,
        db_path,
        state,
    }
}

// ==========================================
// 操作日志
// ==========================================

pub type OpLog = Arc<Mutex<Vec<String>>>;

pub fn new_op_log() -> OpLog {
    Arc::new(Mutex::new(Vec::new()))
}

fn push(log: &OpLog, entry: String) {
    log.lock().unwrap().push(entry);
}

// ==========================================
// MockRecordRepository
// ==========================================

/// 工作记录 mock
///
/// - create 会记录 start/end 事件，中间让出一次调度，用于观察批内并发与批间顺序
/// - fail_rows 中的行号 create 失败
/// - fail_deletes 中的 record_id delete 失败
#[derive(Default)]
pub struct MockRecordRepository {
    pub records: Mutex<HashMap<String, InvoiceRecord>>,
    pub log: OpLog,
    pub fail_rows: HashSet<usize>,
    pub fail_deletes: Mutex<HashSet<String>>,
    in_flight: Mutex<usize>,
    pub max_in_flight: Mutex<usize>,
}

impl MockRecordRepository {
    pub fn new(log: OpLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn failing_rows(log: OpLog, rows: impl IntoIterator<Item = usize>) -> Self {
        Self {
            log,
            fail_rows: rows.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn insert(&self, record: InvoiceRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(record.record_id.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl InvoiceRecordRepository for MockRecordRepository {
    async fn create(&self, record: &InvoiceRecord) -> RepositoryResult<()> {
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            *in_flight += 1;
            let mut max = self.max_in_flight.lock().unwrap();
            *max = (*max).max(*in_flight);
        }
        push(&self.log, format!("start:{}", record.row_number));

        tokio::task::yield_now().await;

        push(&self.log, format!("end:{}", record.row_number));
        *self.in_flight.lock().unwrap() -= 1;

        if self.fail_rows.contains(&record.row_number) {
            return Err(RepositoryError::DatabaseQueryError(format!(
                "rejected row {}",
                record.row_number
            )));
        }
        self.insert(record.clone());
        Ok(())
    }

    async fn find_by_id(&self, record_id: &str) -> RepositoryResult<Option<InvoiceRecord>> {
        Ok(self.records.lock().unwrap().get(record_id).cloned())
    }

    async fn list_by_owner(&self, owner_id: &str) -> RepositoryResult<Vec<InvoiceRecord>> {
        let mut list: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        list.sort_by_key(|r| r.row_number);
        Ok(list)
    }

    async fn list_by_job(&self, job_id: &str) -> RepositoryResult<Vec<InvoiceRecord>> {
        let mut list: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.job_id == job_id)
            .cloned()
            .collect();
        list.sort_by_key(|r| r.row_number);
        Ok(list)
    }

    async fn count_by_job(&self, job_id: &str) -> RepositoryResult<usize> {
        Ok(self.list_by_job(job_id).await?.len())
    }

    async fn set_document(
        &self,
        record_id: &str,
        document: Option<&DocumentRef>,
    ) -> RepositoryResult<()> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(record_id)
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "InvoiceRecord".to_string(),
                id: record_id.to_string(),
            })?;
        record.document = document.cloned();
        Ok(())
    }

    async fn delete(&self, record_id: &str) -> RepositoryResult<()> {
        push(&self.log, format!("record:delete:{}", record_id));
        if self.fail_deletes.lock().unwrap().contains(record_id) {
            return Err(RepositoryError::DatabaseQueryError(format!(
                "cannot delete {}",
                record_id
            )));
        }
        self.records.lock().unwrap().remove(record_id);
        Ok(())
    }
}

// ==========================================
// MockJobRepository
// ==========================================
#[derive(Default)]
pub struct MockJobRepository {
    pub jobs: Mutex<HashMap<String, UploadJob>>,
    pub finalized: Mutex<Vec<(String, JobCompletion)>>,
    pub fail_insert: bool,
    pub fail_mark_processing: bool,
    pub fail_finalize: bool,
    pub log: OpLog,
}

impl MockJobRepository {
    pub fn new(log: OpLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn with_job(self, job: UploadJob) -> Self {
        self.jobs.lock().unwrap().insert(job.job_id.clone(), job);
        self
    }
}

#[async_trait]
impl UploadJobRepository for MockJobRepository {
    async fn insert(&self, job: &UploadJob) -> RepositoryResult<()> {
        push(&self.log, format!("job:insert:{}", job.file_name));
        if self.fail_insert {
            return Err(RepositoryError::DatabaseConnectionError(
                "store unavailable".to_string(),
            ));
        }
        self.jobs
            .lock()
            .unwrap()
            .insert(job.job_id.clone(), job.clone());
        Ok(())
    }

    async fn find_by_id(&self, job_id: &str) -> RepositoryResult<Option<UploadJob>> {
        Ok(self.jobs.lock().unwrap().get(job_id).cloned())
    }

    async fn list_by_owner(&self, owner_id: &str) -> RepositoryResult<Vec<UploadJob>> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| j.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn list_by_session(
        &self,
        owner_id: &str,
        session_id: &str,
    ) -> RepositoryResult<Vec<UploadJob>> {
        Ok(self
            .list_by_owner(owner_id)
            .await?
            .into_iter()
            .filter(|j| j.session_id == session_id)
            .collect())
    }

    async fn mark_processing(
        &self,
        job_id: &str,
        started_at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        if self.fail_mark_processing {
            return Err(RepositoryError::DatabaseQueryError("locked".to_string()));
        }
        if let Some(job) = self.jobs.lock().unwrap().get_mut(job_id) {
            job.status = invoice_intake::JobStatus::Processing;
            job.started_at = Some(started_at);
        }
        Ok(())
    }

    async fn finalize(&self, job_id: &str, completion: &JobCompletion) -> RepositoryResult<()> {
        push(&self.log, format!("job:finalize:{}", job_id));
        if self.fail_finalize {
            return Err(RepositoryError::DatabaseConnectionError(
                "store unavailable".to_string(),
            ));
        }
        if let Some(job) = self.jobs.lock().unwrap().get_mut(job_id) {
            job.status = completion.status;
            job.total_invoices = Some(completion.total_invoices);
            job.successful_invoices = Some(completion.successful_invoices);
            job.failed_invoices = Some(completion.failed_invoices);
            job.error_summary = completion.error_summary.clone();
            job.completed_at = Some(completion.completed_at);
        }
        self.finalized
            .lock()
            .unwrap()
            .push((job_id.to_string(), completion.clone()));
        Ok(())
    }

    async fn delete(&self, job_id: &str) -> RepositoryResult<()> {
        push(&self.log, format!("job:delete:{}", job_id));
        self.jobs.lock().unwrap().remove(job_id);
        Ok(())
    }
}

// ==========================================
// MockObjectStore
// ==========================================
/// 对象存储 mock
///
/// - fail_puts 中的文件名：键以 `-<文件名>` 结尾的 put 失败（上传键带时间戳）
/// - fail_deletes 中的键 delete 失败
#[derive(Default)]
pub struct MockObjectStore {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    pub fail_puts: Mutex<HashSet<String>>,
    pub fail_deletes: Mutex<HashSet<String>>,
    pub log: OpLog,
}

impl MockObjectStore {
    pub fn new(log: OpLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn seed(&self, key: &str, bytes: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes.to_vec());
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        progress: Option<ProgressFn>,
    ) -> StorageResult<()> {
        push(&self.log, format!("store:put:{}", key));
        let rejected = self
            .fail_puts
            .lock()
            .unwrap()
            .iter()
            .any(|name| key.ends_with(&format!("-{}", name)));
        if rejected {
            return Err(StorageError::UploadFailed(format!("connection reset: {}", key)));
        }
        self.objects.lock().unwrap().insert(key.to_string(), data);
        if let Some(report) = progress {
            report(100);
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn presigned_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        Ok(format!("mock://{}?ttl={}", key, expires_in.as_secs()))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        push(&self.log, format!("store:delete:{}", key));
        if self.fail_deletes.lock().unwrap().contains(key) {
            return Err(StorageError::DeleteFailed(key.to_string()));
        }
        self.objects
            .lock()
            .unwrap()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }
}

// ==========================================
// FastConfig
// ==========================================

/// 固定配置：默认批大小，轮询 2 次、间隔 1ms
pub struct FastConfig;

#[async_trait]
impl IntakeConfigReader for FastConfig {
    async fn get_import_batch_size(&self) -> ConfigResult<usize> {
        Ok(25)
    }

    async fn get_storage_root(&self) -> ConfigResult<PathBuf> {
        Ok(std::env::temp_dir())
    }

    async fn get_storage_base_url(&self) -> ConfigResult<Option<String>> {
        Ok(None)
    }

    async fn get_attachment_url_ttl_secs(&self) -> ConfigResult<u64> {
        Ok(60)
    }

    async fn get_refresh_max_attempts(&self) -> ConfigResult<u32> {
        Ok(2)
    }

    async fn get_refresh_initial_delay_ms(&self) -> ConfigResult<u64> {
        Ok(1)
    }

    async fn get_refresh_max_delay_ms(&self) -> ConfigResult<u64> {
        Ok(1)
    }
}
