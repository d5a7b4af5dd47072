// ==========================================
// 发票导入系统 - 配置层
// ==========================================
// 职责: 系统配置管理（批大小/存储位置/轮询参数）
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod error;
pub mod intake_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, default_storage_root, defaults, ConfigManager};
pub use error::{ConfigError, ConfigResult};
pub use intake_config_trait::IntakeConfigReader;
