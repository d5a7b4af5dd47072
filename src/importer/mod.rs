// ==========================================
// 发票导入系统 - 导入层
// ==========================================
// 职责: 用户文件 → 工作发票记录
// 支持: Excel (.xlsx/.xls), CSV
// 流程: 接收 → 解析 → 行校验 → 分批落库
// ==========================================

// 模块声明
pub mod batch_importer;
pub mod error;
pub mod file_ingestor;
pub mod file_parser;
pub mod invoice_importer_impl;
pub mod invoice_importer_trait;
pub mod row_validator;

// 重导出核心类型
pub use batch_importer::BatchImporter;
pub use error::{ImportError, ImportResult};
pub use file_ingestor::{accepted_extension, filter_selection, AcceptedFile, FileIngestor, SelectedFile};
pub use file_parser::{CsvParser, ExcelParser, UniversalFileParser};
pub use invoice_importer_impl::InvoiceImporterImpl;
pub use row_validator::{is_valid_uuid, normalize_currency, parse_amount, parse_iso_date, RowValidator};

// 重导出 Trait 接口
pub use invoice_importer_trait::{FileParser, InvoiceImporter, RawRow, UploadProgressListener};
