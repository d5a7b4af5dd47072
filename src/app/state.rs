// ==========================================
// 发票导入系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 存储位置在启动时从配置解析一次，之后注入各组件
// ==========================================

use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::api::{FileApi, InvoiceApi, UploadApi};
use crate::config::{ConfigManager, IntakeConfigReader};
use crate::db::{init_schema, open_sqlite_connection};
use crate::engine::{
    AttachmentService, CascadeDeleter, RefreshBus, RefreshPublisher, SubmissionService,
};
use crate::importer::InvoiceImporterImpl;
use crate::repository::{
    InvoiceRecordRepository, InvoiceRecordRepositoryImpl, SubmittedInvoiceRepository,
    SubmittedInvoiceRepositoryImpl, UploadJobRepository, UploadJobRepositoryImpl,
};
use crate::storage::{LocalObjectStore, ObjectStore, StorageSettings};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 启动时解析的存储位置
    pub storage_settings: StorageSettings,

    /// 配置管理器（CLI config 子命令使用）
    pub config_manager: Arc<ConfigManager>,

    /// 刷新事件总线（视图侧订阅）
    pub refresh_bus: RefreshBus,

    /// 上传API
    pub upload_api: Arc<UploadApi>,

    /// 文件API
    pub file_api: Arc<FileApi>,

    /// 发票API
    pub invoice_api: Arc<InvoiceApi>,
}

impl AppState {
    /// 创建新的AppState实例（存储位置从配置读取）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub async fn new(db_path: String) -> Result<Self, String> {
        let (conn, config_manager) = Self::open_shared(&db_path)?;

        let root = config_manager
            .get_storage_root()
            .await
            .map_err(|e| format!("无法读取存储位置: {}", e))?;
        let base_url = config_manager
            .get_storage_base_url()
            .await
            .map_err(|e| format!("无法读取存储地址: {}", e))?;

        Self::build(
            db_path,
            conn,
            config_manager,
            StorageSettings::new(root, base_url),
        )
        .await
    }

    /// 使用显式存储位置创建AppState
    pub async fn with_storage(db_path: String, settings: StorageSettings) -> Result<Self, String> {
        let (conn, config_manager) = Self::open_shared(&db_path)?;
        Self::build(db_path, conn, config_manager, settings).await
    }

    /// 打开共享连接，并在其上创建配置管理器
    fn open_shared(
        db_path: &str,
    ) -> Result<(Arc<Mutex<Connection>>, Arc<ConfigManager>), String> {
        let conn = open_sqlite_connection(db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库初始化失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        Ok((conn, config_manager))
    }

    async fn build(
        db_path: String,
        conn: Arc<Mutex<Connection>>,
        config_manager: Arc<ConfigManager>,
        settings: StorageSettings,
    ) -> Result<Self, String> {
        tracing::info!(
            db_path = %db_path,
            storage_root = %settings.root.display(),
            "初始化AppState"
        );

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let jobs: Arc<dyn UploadJobRepository> = Arc::new(UploadJobRepositoryImpl::new(conn.clone()));
        let records: Arc<dyn InvoiceRecordRepository> =
            Arc::new(InvoiceRecordRepositoryImpl::new(conn.clone()));
        let submitted: Arc<dyn SubmittedInvoiceRepository> =
            Arc::new(SubmittedInvoiceRepositoryImpl::new(conn));

        let url_ttl_secs = config_manager
            .get_attachment_url_ttl_secs()
            .await
            .map_err(|e| format!("无法读取附件链接有效期: {}", e))?;

        // 对象存储
        let store: Arc<dyn ObjectStore> = Arc::new(
            LocalObjectStore::new(settings.clone())
                .await
                .map_err(|e| format!("无法初始化对象存储: {}", e))?,
        );

        // 刷新事件总线
        let refresh_bus = RefreshBus::default();
        let publisher: Arc<dyn RefreshPublisher> = Arc::new(refresh_bus.clone());

        // ==========================================
        // 初始化API层
        // ==========================================
        let importer = Arc::new(InvoiceImporterImpl::new(
            jobs.clone(),
            records.clone(),
            store.clone(),
            config_manager.clone(),
            publisher.clone(),
        ));
        let upload_api = Arc::new(UploadApi::new(importer));

        let file_api = Arc::new(FileApi::new(
            jobs.clone(),
            records.clone(),
            CascadeDeleter::new(jobs.clone(), records.clone(), store.clone()),
            publisher.clone(),
        ));

        let invoice_api = Arc::new(InvoiceApi::new(
            records.clone(),
            submitted.clone(),
            AttachmentService::new(
                records.clone(),
                store.clone(),
                Duration::from_secs(url_ttl_secs),
            ),
            SubmissionService::new(records.clone(), submitted.clone()),
            publisher,
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            storage_settings: settings,
            config_manager,
            refresh_bus,
            upload_api,
            file_api,
            invoice_api,
        })
    }
}

/// 默认数据库路径
///
/// 优先使用环境变量 INVOICE_INTAKE_DB_PATH，否则放在用户数据目录下
pub fn get_default_db_path() -> String {
    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("INVOICE_INTAKE_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./invoice_intake.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("invoice-intake-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("invoice-intake");
        }

        // 确保目录存在
        std::fs::create_dir_all(&path).ok();
        path = path.join("invoice_intake.db");
    }

    path.to_string_lossy().to_string()
}
