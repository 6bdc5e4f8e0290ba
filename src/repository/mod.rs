// ==========================================
// 分批导入引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化
// ==========================================

pub mod error;
pub mod import_log_repo;
pub mod profile_repo;
pub mod record_store;
pub mod session_repo;

pub use error::{RepositoryError, RepositoryResult};
pub use import_log_repo::{ImportLogger, SqliteImportLogger};
pub use profile_repo::{ProfileRepository, SqliteProfileRepository};
pub use record_store::{RecordStore, SqliteRecordStore};
pub use session_repo::{SessionRepository, SqliteSessionRepository};
