// ==========================================
// 发票导入系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + 本地对象存储
// 系统定位: 发票批量导入、校验、审核与提交
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 文档存储
pub mod repository;

// 对象存储层 - 上传文件与附件字节
pub mod storage;

// 导入层 - 接收/解析/校验/分批落库
pub mod importer;

// 引擎层 - 刷新事件/可见性轮询/级联删除/提交/附件
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{Currency, FileKind, JobStatus};

// 领域实体
pub use domain::{
    DocumentRef, FileImportOutcome, ImportSummary, InvoiceRecord, SubmittedInvoiceRecord,
    UploadJob, UserContext,
};

// 导入
pub use importer::{BatchImporter, InvoiceImporter, InvoiceImporterImpl, RowValidator, SelectedFile};

// 引擎
pub use engine::{
    AttachmentService, CascadeDeleter, RefreshBus, RefreshEvent, SubmissionService,
    VisibilityPoller,
};

// API
pub use api::{FileApi, InvoiceApi, UploadApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "发票导入系统";
