// ==========================================
// 分批导入引擎 - 导入日志
// ==========================================
// 每次批处理尝试一条（成功或失败），关联到会话
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportLogEntry {
    pub log_id: String,
    pub session_id: String,
    pub is_error: bool,
    pub input_file: String,
    pub profile_name: String,
    pub message: String,
    pub created_at: NaiveDateTime,
}
