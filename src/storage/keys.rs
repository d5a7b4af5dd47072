// ==========================================
// 发票导入系统 - 存储键生成
// ==========================================
// 上传文件: uploads/{owner}/{unix_millis}-{name}
// 附件:     attachments/{owner}/{record_id}/{unix_millis}-{name}
// ==========================================

use chrono::{DateTime, Utc};

/// 文件名清洗：去掉路径分隔符与控制字符，空白替换为下划线
pub fn sanitize_file_name(name: &str) -> String {
    let base = name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(name)
        .trim();

    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();

    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// 上传文件的存储键（时间戳前缀防冲突）
pub fn upload_key(owner_id: &str, at: DateTime<Utc>, file_name: &str) -> String {
    format!(
        "uploads/{}/{}-{}",
        owner_id,
        at.timestamp_millis(),
        sanitize_file_name(file_name)
    )
}

/// 附件的存储键
pub fn attachment_key(owner_id: &str, record_id: &str, at: DateTime<Utc>, file_name: &str) -> String {
    format!(
        "attachments/{}/{}/{}-{}",
        owner_id,
        record_id,
        at.timestamp_millis(),
        sanitize_file_name(file_name)
    )
}
