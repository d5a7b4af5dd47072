// ==========================================
// 发票导入系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::intake_config_trait::IntakeConfigReader;
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        crate::db::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| ConfigError::StoreError(format!("锁获取失败: {}", e)))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ConfigError::StoreError(format!("锁获取失败: {}", e)))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(ConfigError::ReadError {
                key: key.to_string(),
                message: e.to_string(),
            }),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供 CLI 复用）
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        if !config_keys::ALL.contains(&key) {
            return Err(ConfigError::ValueError {
                key: key.to_string(),
                value: value.to_string(),
                message: "未知配置键".to_string(),
            });
        }

        let conn = self
            .conn
            .lock()
            .map_err(|e| ConfigError::StoreError(format!("锁获取失败: {}", e)))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 列出全部 global 配置
    pub fn list_configs(&self) -> ConfigResult<BTreeMap<String, String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ConfigError::StoreError(format!("锁获取失败: {}", e)))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut configs = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            configs.insert(key, value);
        }
        Ok(configs)
    }

    /// 读取并解析数值配置；格式错误时记录告警并回退默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T: FromStr + Copy + std::fmt::Display,
    {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    tracing::warn!(
                        config_key = key,
                        raw_value = %raw,
                        default = %default,
                        "配置值格式错误，使用默认值"
                    );
                    Ok(default)
                }
            },
        }
    }
}

/// 默认对象存储根目录
pub fn default_storage_root() -> PathBuf {
    match dirs::data_dir() {
        Some(data_dir) => data_dir.join("invoice-intake").join("objects"),
        None => PathBuf::from("./invoice_intake_objects"),
    }
}

// ==========================================
// IntakeConfigReader Trait 实现
// ==========================================
#[async_trait]
impl IntakeConfigReader for ConfigManager {
    async fn get_import_batch_size(&self) -> ConfigResult<usize> {
        let size = self.get_parsed_or_default(
            config_keys::IMPORT_BATCH_SIZE,
            defaults::IMPORT_BATCH_SIZE,
        )?;
        Ok(if size == 0 { defaults::IMPORT_BATCH_SIZE } else { size })
    }

    async fn get_storage_root(&self) -> ConfigResult<PathBuf> {
        Ok(self
            .get_config_value(config_keys::STORAGE_ROOT)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_storage_root))
    }

    async fn get_storage_base_url(&self) -> ConfigResult<Option<String>> {
        Ok(self
            .get_config_value(config_keys::STORAGE_BASE_URL)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }

    async fn get_attachment_url_ttl_secs(&self) -> ConfigResult<u64> {
        self.get_parsed_or_default(
            config_keys::ATTACHMENT_URL_TTL_SECS,
            defaults::ATTACHMENT_URL_TTL_SECS,
        )
    }

    async fn get_refresh_max_attempts(&self) -> ConfigResult<u32> {
        self.get_parsed_or_default(
            config_keys::REFRESH_MAX_ATTEMPTS,
            defaults::REFRESH_MAX_ATTEMPTS,
        )
    }

    async fn get_refresh_initial_delay_ms(&self) -> ConfigResult<u64> {
        self.get_parsed_or_default(
            config_keys::REFRESH_INITIAL_DELAY_MS,
            defaults::REFRESH_INITIAL_DELAY_MS,
        )
    }

    async fn get_refresh_max_delay_ms(&self) -> ConfigResult<u64> {
        self.get_parsed_or_default(
            config_keys::REFRESH_MAX_DELAY_MS,
            defaults::REFRESH_MAX_DELAY_MS,
        )
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 导入
    pub const IMPORT_BATCH_SIZE: &str = "import_batch_size";

    // 存储
    pub const STORAGE_ROOT: &str = "storage_root";
    pub const STORAGE_BASE_URL: &str = "storage_base_url";
    pub const ATTACHMENT_URL_TTL_SECS: &str = "attachment_url_ttl_secs";

    // 可见性轮询
    pub const REFRESH_MAX_ATTEMPTS: &str = "refresh_max_attempts";
    pub const REFRESH_INITIAL_DELAY_MS: &str = "refresh_initial_delay_ms";
    pub const REFRESH_MAX_DELAY_MS: &str = "refresh_max_delay_ms";

    pub const ALL: [&str; 7] = [
        IMPORT_BATCH_SIZE,
        STORAGE_ROOT,
        STORAGE_BASE_URL,
        ATTACHMENT_URL_TTL_SECS,
        REFRESH_MAX_ATTEMPTS,
        REFRESH_INITIAL_DELAY_MS,
        REFRESH_MAX_DELAY_MS,
    ];
}

// ==========================================
// 默认值
// ==========================================
pub mod defaults {
    pub const IMPORT_BATCH_SIZE: usize = 25;
    pub const ATTACHMENT_URL_TTL_SECS: u64 = 900;
    pub const REFRESH_MAX_ATTEMPTS: u32 = 5;
    pub const REFRESH_INITIAL_DELAY_MS: u64 = 100;
    pub const REFRESH_MAX_DELAY_MS: u64 = 2_000;
}
