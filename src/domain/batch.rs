// ==========================================
// 分批导入引擎 - 批处理结果与进度单元
// ==========================================

use crate::domain::types::ImportPass;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 单条记录（字段名 -> 值）
pub type DataRecord = BTreeMap<String, String>;

/// 未处理数据（依赖配置名 -> 记录列表）
pub type UnprocessedData = BTreeMap<String, Vec<DataRecord>>;

// ==========================================
// BatchResult - 单批处理结果
// ==========================================
// 瞬态对象，由导入引擎立即消费，不落库
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub position: u64,            // 本批处理后的位置
    pub adapter: String,          // 使用的适配器（profile_type）
    pub total_count: Option<u64>, // 读取器统计的总数
    pub end_of_input: bool,       // 输入已耗尽
    #[serde(default)]
    pub unprocessed: UnprocessedData,
}

impl BatchResult {
    pub fn has_unprocessed(&self) -> bool {
        self.unprocessed.values().any(|records| !records.is_empty())
    }
}

// ==========================================
// ImportProgress - 进度单元
// ==========================================
// 每批一个，按批次执行顺序交给调用方
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportProgress {
    pub profile_name: String,
    pub position: u64,
    pub session_id: String,
    pub pass: ImportPass,
}
