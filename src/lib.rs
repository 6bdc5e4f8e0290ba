// ==========================================
// 分批导入引擎 - 核心库
// ==========================================
// 主导入逐批推进、可续传；引用未满足的记录写入桶文件，
// 主导入结束后按依赖配置顺序二次导入
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 文件读写层 - CSV / XML
pub mod file_io;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 批处理与编排
pub mod importer;

// 配置层 - 导入配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/表结构）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// 应用层 - 装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    BatchResult, DataRecord, FileFormat, ImportPass, ImportProgress, ImportRequest, MappingTree,
    Profile, Session, SessionState,
};

// 导入
pub use importer::{DataWorkflow, ImportError, ImportResult, ImportRun, ImportService};

// 配置
pub use config::{DeferredProfile, DeferredProfilePlan};

// 应用
pub use app::AppState;

// ==========================================
// 版本信息
// ==========================================

/// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 系统名称
pub const SYSTEM_NAME: &str = "分批导入引擎";
