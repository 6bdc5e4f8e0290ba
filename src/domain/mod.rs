// ==========================================
// 分批导入引擎 - 领域模型层
// ==========================================
// 职责: 定义会话、请求、映射配置、批结果等领域类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod batch;
pub mod import_log;
pub mod profile;
pub mod request;
pub mod session;
pub mod types;

// 重导出核心类型
pub use batch::{BatchResult, DataRecord, ImportProgress, UnprocessedData};
pub use import_log::ImportLogEntry;
pub use profile::{MappingNode, MappingTree, NodeType, Profile};
pub use request::ImportRequest;
pub use session::Session;
pub use types::{FileFormat, ImportPass, SessionState};
