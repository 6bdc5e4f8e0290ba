// ==========================================
// 分批导入引擎 - 依赖数据二次导入顺序
// ==========================================
// 顺序即依赖方向: 被引用实体的配置在前，引用方在后
// 只能通过修改该列表改变顺序，不做动态推断，不并行
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 批大小默认值（依赖不敏感的配置）
pub const DEFAULT_DEFERRED_BATCH_SIZE: u64 = 50;

// ==========================================
// DeferredProfile - 单个依赖配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredProfile {
    pub name: String,    // 依赖配置名（= 隐藏配置的 profile_type）
    pub batch_size: u64, // 二次导入批大小，越小单条坏数据的影响范围越小
}

impl DeferredProfile {
    pub fn new(name: impl Into<String>, batch_size: u64) -> Self {
        Self {
            name: name.into(),
            batch_size,
        }
    }
}

// ==========================================
// DeferredProfilePlan - 有序依赖配置列表
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeferredProfilePlan {
    profiles: Vec<DeferredProfile>,
}

impl DeferredProfilePlan {
    /// 创建并校验
    ///
    /// # 校验
    /// - 名称非空
    /// - 名称不重复
    /// - 批大小 >= 1
    pub fn new(profiles: Vec<DeferredProfile>) -> ImportResult<Self> {
        {
            let mut seen = HashSet::new();
            for profile in &profiles {
                if profile.name.trim().is_empty() {
                    return Err(plan_error("依赖配置名为空"));
                }
                if !seen.insert(profile.name.as_str()) {
                    return Err(plan_error(&format!("依赖配置重复: {}", profile.name)));
                }
                if profile.batch_size == 0 {
                    return Err(ImportError::InvalidBatchSize(0));
                }
            }
        }
        Ok(Self { profiles })
    }

    /// 从 JSON 解析
    pub fn from_json(raw: &str) -> ImportResult<Self> {
        let profiles: Vec<DeferredProfile> =
            serde_json::from_str(raw).map_err(|e| plan_error(&e.to_string()))?;
        Self::new(profiles)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.profiles).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn profiles(&self) -> &[DeferredProfile] {
        &self.profiles
    }

    pub fn get(&self, index: usize) -> Option<&DeferredProfile> {
        self.profiles.get(index)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl Default for DeferredProfilePlan {
    /// 商品在前，商品图片在后；图片对依赖最敏感，逐条导入
    fn default() -> Self {
        Self {
            profiles: vec![
                DeferredProfile::new("articles", DEFAULT_DEFERRED_BATCH_SIZE),
                DeferredProfile::new("articlesImages", 1),
            ],
        }
    }
}

fn plan_error(message: &str) -> ImportError {
    ImportError::Config {
        key: super::config_keys::DEFERRED_PROFILES.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_order() {
        let plan = DeferredProfilePlan::default();
        let names: Vec<&str> = plan.profiles().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["articles", "articlesImages"]);
        assert_eq!(plan.get(1).unwrap().batch_size, 1);
    }

    #[test]
    fn test_json_round_trip_keeps_order() {
        let plan = DeferredProfilePlan::from_json(
            r#"[{"name":"categories","batch_size":10},{"name":"articles","batch_size":50}]"#,
        )
        .unwrap();
        assert_eq!(plan.get(0).unwrap().name, "categories");
        assert_eq!(DeferredProfilePlan::from_json(&plan.to_json()).unwrap(), plan);
    }

    #[test]
    fn test_duplicates_rejected() {
        let err = DeferredProfilePlan::new(vec![
            DeferredProfile::new("articles", 50),
            DeferredProfile::new("articles", 1),
        ])
        .unwrap_err();
        assert!(matches!(err, ImportError::Config { .. }));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let err = DeferredProfilePlan::new(vec![DeferredProfile::new("articles", 0)]).unwrap_err();
        assert!(matches!(err, ImportError::InvalidBatchSize(0)));
    }
}
