// ==========================================
// 分批导入引擎 - 应用层
// ==========================================
// 职责: 组装仓储、配置与导入服务
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, get_default_upload_dir, AppState};
