// ==========================================
// 发票导入系统 - 用户会话上下文
// ==========================================
// 说明: 认证由外部负责，这里只携带已认证的身份与会话标识
// 会话归属通过 UploadJob.session_id 显式记录，不做时间窗推断
// ==========================================

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 当前操作用户上下文
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub session_id: String,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }

    /// 为用户开启新会话
    pub fn new_session(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Uuid::new_v4().to_string())
    }
}
