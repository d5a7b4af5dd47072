// ==========================================
// 发票导入系统 - 配置层错误类型
// ==========================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置读取失败 (key: {key}): {message}")]
    ReadError { key: String, message: String },

    #[error("配置值格式错误 (key: {key}, value: {value}): {message}")]
    ValueError {
        key: String,
        value: String,
        message: String,
    },

    #[error("配置存储失败: {0}")]
    StoreError(String),
}

impl From<rusqlite::Error> for ConfigError {
    fn from(err: rusqlite::Error) -> Self {
        ConfigError::StoreError(err.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
