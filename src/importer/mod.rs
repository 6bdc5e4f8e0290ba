// ==========================================
// 分批导入引擎 - 导入层
// ==========================================
// 职责: 分批处理、未处理数据落盘、主导入与二次导入编排
// ==========================================

pub mod data_workflow;
pub mod entity_adapter;
pub mod error;
pub mod import_service;
pub mod unprocessed;

pub use data_workflow::{DataWorkflow, DataWorkflowImpl};
pub use entity_adapter::{AdapterRegistry, EntityAdapter, ReferenceRule};
pub use error::{ImportError, ImportResult};
pub use import_service::{ImportRun, ImportService};
pub use unprocessed::{BucketUndo, UnprocessedDataWriter, UploadPathProvider};
