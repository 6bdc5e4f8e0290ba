// ==========================================
// 分批导入引擎 - 领域类型定义
// ==========================================

use crate::importer::error::ImportError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 文件格式 (File Format)
// ==========================================
// 目前仅两种: 分隔文本 csv / 树形 xml
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv, // 分隔文本
    Xml, // 树形结构
}

impl FileFormat {
    /// 格式标签
    pub fn tag(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Xml => "xml",
        }
    }

    /// 是否需要映射树才能读取
    pub fn is_tree_structured(&self) -> bool {
        matches!(self, FileFormat::Xml)
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl FromStr for FileFormat {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(FileFormat::Csv),
            "xml" => Ok(FileFormat::Xml),
            other => Err(ImportError::UnsupportedFormat(other.to_string())),
        }
    }
}

// ==========================================
// 会话状态 (Session State)
// ==========================================
// 只能前进: OPEN -> CLOSED，CLOSED 为终态
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Open,   // 仍有批次待处理
    Closed, // 输入已耗尽
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Open => write!(f, "OPEN"),
            SessionState::Closed => write!(f, "CLOSED"),
        }
    }
}

impl FromStr for SessionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_matches('"') {
            "OPEN" => Ok(SessionState::Open),
            "CLOSED" => Ok(SessionState::Closed),
            other => Err(format!("未知会话状态: {}", other)),
        }
    }
}

// ==========================================
// 导入阶段 (Import Pass)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportPass {
    Primary,  // 主导入
    Deferred, // 依赖数据二次导入
}

impl fmt::Display for ImportPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportPass::Primary => write!(f, "PRIMARY"),
            ImportPass::Deferred => write!(f, "DEFERRED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_format_from_tag() {
        assert_eq!("csv".parse::<FileFormat>().unwrap(), FileFormat::Csv);
        assert_eq!("xml".parse::<FileFormat>().unwrap(), FileFormat::Xml);

        let err = "xlsx".parse::<FileFormat>().unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat(tag) if tag == "xlsx"));
    }

    #[test]
    fn test_file_format_tag_is_case_sensitive() {
        assert!("CSV".parse::<FileFormat>().is_err());
    }

    #[test]
    fn test_session_state_round_trip_text() {
        assert_eq!(SessionState::Open.to_string(), "OPEN");
        assert_eq!("CLOSED".parse::<SessionState>().unwrap(), SessionState::Closed);
        assert!("PAUSED".parse::<SessionState>().is_err());
    }
}
