// ==========================================
// 分批导入引擎 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::deferred_profile_plan::DeferredProfilePlan;
use crate::importer::error::ImportResult;
use async_trait::async_trait;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 获取二次导入的依赖配置顺序
    ///
    /// # 默认值
    /// - [articles(50), articlesImages(1)]
    async fn get_deferred_profile_plan(&self) -> ImportResult<DeferredProfilePlan>;

    /// 获取 CSV 分隔符（单字节）
    ///
    /// # 默认值
    /// - ';'
    async fn get_csv_delimiter(&self) -> ImportResult<u8>;

    /// 获取主导入默认批大小（请求未指定时使用）
    ///
    /// # 默认值
    /// - 50
    async fn get_default_batch_size(&self) -> ImportResult<u64>;
}

// ==========================================
// ImportSettings - 一次性解析后的导入配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSettings {
    pub deferred_plan: DeferredProfilePlan,
    pub csv_delimiter: u8,
    pub default_batch_size: u64,
}

impl ImportSettings {
    /// 从配置读取器加载
    pub async fn load<C: ImportConfigReader + ?Sized>(reader: &C) -> ImportResult<Self> {
        Ok(Self {
            deferred_plan: reader.get_deferred_profile_plan().await?,
            csv_delimiter: reader.get_csv_delimiter().await?,
            default_batch_size: reader.get_default_batch_size().await?,
        })
    }
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            deferred_plan: DeferredProfilePlan::default(),
            csv_delimiter: crate::file_io::DEFAULT_CSV_DELIMITER,
            default_batch_size: crate::config::deferred_profile_plan::DEFAULT_DEFERRED_BATCH_SIZE,
        }
    }
}
