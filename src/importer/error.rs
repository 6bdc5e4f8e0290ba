// ==========================================
// 分批导入引擎 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 记录缺少依赖（父实体未落库）不是错误，
//       而是进入未处理数据桶，见 importer::unprocessed
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 格式相关错误 =====
    #[error("文件格式不支持: {0}（仅支持 csv/xml）")]
    UnsupportedFormat(String),

    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("XML 解析失败: {0}")]
    XmlParseError(String),

    // ===== 映射树错误 =====
    #[error("树形格式读取前未设置映射树")]
    MissingMappingTree,

    #[error("映射树无效: {0}")]
    InvalidMappingTree(String),

    // ===== 批处理错误 =====
    #[error("批处理失败: {0}")]
    BatchProcessing(String),

    #[error("数据校验失败 (行 {row}): {message}")]
    Validation { row: u64, message: String },

    #[error("未注册的数据适配器: {0}")]
    UnknownAdapter(String),

    #[error("映射配置不存在: {0}")]
    ProfileNotFound(String),

    // ===== 会话状态错误 =====
    #[error("会话已关闭: {0}")]
    SessionClosed(String),

    #[error("会话位置回退 (会话 {session_id}): 当前 {current}, 新值 {requested}")]
    PositionRegression {
        session_id: String,
        current: u64,
        requested: u64,
    },

    #[error("批大小无效: {0}（必须 >= 1）")]
    InvalidBatchSize(u64),

    // ===== 配置错误 =====
    #[error("配置错误 (key: {key}): {message}")]
    Config { key: String, message: String },

    // ===== 仓储错误 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<quick_xml::Error>
impl From<quick_xml::Error> for ImportError {
    fn from(err: quick_xml::Error) -> Self {
        ImportError::XmlParseError(err.to_string())
    }
}

// 实现 From<quick_xml::events::attributes::AttrError>
impl From<quick_xml::events::attributes::AttrError> for ImportError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        ImportError::XmlParseError(err.to_string())
    }
}

// 实现 From<serde_json::Error>
impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::InvalidMappingTree(err.to_string())
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::Repository(RepositoryError::from(err))
    }
}

impl ImportError {
    /// 是否为格式不支持错误（选择适配器阶段即失败，不重试）
    pub fn is_unsupported_format(&self) -> bool {
        matches!(self, ImportError::UnsupportedFormat(_))
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rusqlite_error_maps_to_repository() {
        let err: ImportError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, ImportError::Repository(RepositoryError::NotFound { .. })));
    }

    #[test]
    fn test_unsupported_format_message() {
        let err = ImportError::UnsupportedFormat("json".to_string());
        assert!(err.is_unsupported_format());
        assert!(err.to_string().contains("json"));
    }
}
