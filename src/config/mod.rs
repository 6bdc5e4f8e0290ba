// ==========================================
// 分批导入引擎 - 配置层
// ==========================================
// 职责: 导入引擎配置读取（依赖配置顺序、分隔符、批大小）
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod deferred_profile_plan;
pub mod import_config_trait;

// 重导出核心配置类型
pub use config_manager::{config_keys, ConfigManager};
pub use deferred_profile_plan::{DeferredProfile, DeferredProfilePlan, DEFAULT_DEFERRED_BATCH_SIZE};
pub use import_config_trait::{ImportConfigReader, ImportSettings};
