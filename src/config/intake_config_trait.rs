// ==========================================
// 发票导入系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入/存储/刷新所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::error::ConfigResult;
use async_trait::async_trait;
use std::path::PathBuf;

// ==========================================
// IntakeConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait IntakeConfigReader: Send + Sync {
    // ===== 导入配置 =====

    /// 每批并发写入行数
    ///
    /// # 默认值
    /// - 25
    async fn get_import_batch_size(&self) -> ConfigResult<usize>;

    // ===== 存储配置 =====

    /// 对象存储根目录
    ///
    /// # 默认值
    /// - <data_dir>/invoice-intake/objects
    async fn get_storage_root(&self) -> ConfigResult<PathBuf>;

    /// 对象访问 URL 前缀（None 表示使用 file://<root>）
    async fn get_storage_base_url(&self) -> ConfigResult<Option<String>>;

    /// 附件访问链接有效期（秒）
    ///
    /// # 默认值
    /// - 900
    async fn get_attachment_url_ttl_secs(&self) -> ConfigResult<u64>;

    // ===== 可见性轮询配置 =====

    /// 最大轮询次数
    ///
    /// # 默认值
    /// - 5
    async fn get_refresh_max_attempts(&self) -> ConfigResult<u32>;

    /// 首次轮询间隔（毫秒），之后按 2 倍退避
    ///
    /// # 默认值
    /// - 100
    async fn get_refresh_initial_delay_ms(&self) -> ConfigResult<u64>;

    /// 单次轮询间隔上限（毫秒）
    ///
    /// # 默认值
    /// - 2000
    async fn get_refresh_max_delay_ms(&self) -> ConfigResult<u64>;
}
