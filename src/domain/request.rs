// ==========================================
// 分批导入引擎 - 导入请求
// ==========================================
// 构造后不可变；二次导入子任务通过 for_deferred 派生新请求
// ==========================================

use crate::domain::profile::Profile;
use crate::domain::types::FileFormat;
use crate::importer::error::{ImportError, ImportResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ==========================================
// ImportRequest - 导入请求
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRequest {
    format: FileFormat,
    input_file: PathBuf,
    profile: Profile,
    username: String,
    batch_size: u64, // 每批记录数
}

impl ImportRequest {
    /// 创建导入请求
    ///
    /// # 返回
    /// - Err(InvalidBatchSize): batch_size = 0
    pub fn new(
        format: FileFormat,
        input_file: impl Into<PathBuf>,
        profile: Profile,
        username: impl Into<String>,
        batch_size: u64,
    ) -> ImportResult<Self> {
        if batch_size == 0 {
            return Err(ImportError::InvalidBatchSize(batch_size));
        }

        Ok(Self {
            format,
            input_file: input_file.into(),
            profile,
            username: username.into(),
            batch_size,
        })
    }

    /// 派生二次导入子请求
    ///
    /// 格式固定为 csv（未处理数据桶总是分隔文本），用户沿用父请求
    pub fn for_deferred(
        parent: &ImportRequest,
        profile: Profile,
        resolved_file: impl Into<PathBuf>,
        batch_size: u64,
    ) -> ImportResult<Self> {
        Self::new(
            FileFormat::Csv,
            resolved_file,
            profile,
            parent.username.clone(),
            batch_size,
        )
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    pub fn input_file(&self) -> &Path {
        &self.input_file
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }
}
