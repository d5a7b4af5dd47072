// ==========================================
// 发票导入系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 统一建表（文档存储的本地实现）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 初始化 schema（幂等）
///
/// 说明：
/// - invoice_record 不对 upload_job 建外键：级联删除由应用层按顺序执行
/// - validation_errors / document 以 JSON 文本存储
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL DEFAULT 'global',
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS upload_job (
            job_id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            session_id TEXT NOT NULL,
            file_name TEXT NOT NULL,
            file_kind TEXT NOT NULL,
            source_key TEXT NOT NULL,
            status TEXT NOT NULL,
            total_invoices INTEGER,
            successful_invoices INTEGER,
            failed_invoices INTEGER,
            error_summary TEXT,
            created_at TEXT NOT NULL,
            started_at TEXT,
            completed_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_upload_job_owner ON upload_job(owner_id);
        CREATE INDEX IF NOT EXISTS idx_upload_job_session ON upload_job(owner_id, session_id);

        CREATE TABLE IF NOT EXISTS invoice_record (
            record_id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            job_id TEXT NOT NULL,
            row_number INTEGER NOT NULL,
            invoice_id TEXT NOT NULL,
            seller_id TEXT NOT NULL,
            debtor_id TEXT NOT NULL,
            currency TEXT,
            amount REAL,
            product TEXT NOT NULL,
            issue_date TEXT,
            due_date TEXT,
            upload_date TEXT NOT NULL,
            is_valid INTEGER NOT NULL,
            validation_errors TEXT NOT NULL,
            document TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_invoice_record_owner ON invoice_record(owner_id);
        CREATE INDEX IF NOT EXISTS idx_invoice_record_job ON invoice_record(job_id);

        CREATE TABLE IF NOT EXISTS submitted_invoice (
            submission_id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            invoice_id TEXT NOT NULL,
            seller_id TEXT NOT NULL,
            debtor_id TEXT NOT NULL,
            currency TEXT,
            amount REAL,
            product TEXT NOT NULL,
            issue_date TEXT,
            due_date TEXT,
            upload_date TEXT NOT NULL,
            document TEXT,
            submitted_at TEXT NOT NULL,
            submitted_by TEXT NOT NULL,
            original_job_id TEXT NOT NULL,
            original_record_id TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_submitted_invoice_owner ON submitted_invoice(owner_id);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
