// ==========================================
// 分批导入引擎 - 实体适配器
// ==========================================
// 职责: 描述每种配置类型（profile_type）对应的实体、主键字段与引用规则
// 引用规则: 引用字段非空且目标实体尚未落库 -> 记录进入依赖配置的未处理桶
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// ReferenceRule - 引用规则
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRule {
    pub field: String,            // 引用字段
    pub target_entity: String,    // 被引用实体
    pub deferred_profile: String, // 引用未满足时的依赖配置名
}

impl ReferenceRule {
    pub fn new(
        field: impl Into<String>,
        target_entity: impl Into<String>,
        deferred_profile: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            target_entity: target_entity.into(),
            deferred_profile: deferred_profile.into(),
        }
    }
}

// ==========================================
// EntityAdapter - 实体适配器
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityAdapter {
    pub name: String,      // = profile_type
    pub entity: String,    // 落库实体名
    pub key_field: String, // 主键字段
    pub references: Vec<ReferenceRule>,
}

impl EntityAdapter {
    pub fn new(name: impl Into<String>, entity: impl Into<String>, key_field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity: entity.into(),
            key_field: key_field.into(),
            references: Vec::new(),
        }
    }

    pub fn with_reference(mut self, rule: ReferenceRule) -> Self {
        self.references.push(rule);
        self
    }

    /// 引用自身主键视为已满足（主商品的 mainnumber 等于自身 ordernumber）
    pub fn is_self_reference(&self, rule: &ReferenceRule, key: &str, value: &str) -> bool {
        rule.target_entity == self.entity && value == key
    }
}

// ==========================================
// AdapterRegistry - 适配器注册表
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, EntityAdapter>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 内置适配器: 商品、商品图片
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            EntityAdapter::new("articles", "article", "ordernumber")
                .with_reference(ReferenceRule::new("mainnumber", "article", "articles")),
        );
        registry.register(
            EntityAdapter::new("articlesImages", "article_image", "image")
                .with_reference(ReferenceRule::new("ordernumber", "article", "articlesImages")),
        );
        registry
    }

    pub fn register(&mut self, adapter: EntityAdapter) {
        self.adapters.insert(adapter.name.clone(), adapter);
    }

    pub fn get(&self, name: &str) -> ImportResult<&EntityAdapter> {
        self.adapters
            .get(name)
            .ok_or_else(|| ImportError::UnknownAdapter(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_adapters() {
        let registry = AdapterRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["articles", "articlesImages"]);

        let images = registry.get("articlesImages").unwrap();
        assert_eq!(images.entity, "article_image");
        assert_eq!(images.references[0].deferred_profile, "articlesImages");
    }

    #[test]
    fn test_unknown_adapter() {
        let registry = AdapterRegistry::with_defaults();
        assert!(matches!(
            registry.get("orders"),
            Err(ImportError::UnknownAdapter(name)) if name == "orders"
        ));
    }

    #[test]
    fn test_self_reference() {
        let registry = AdapterRegistry::with_defaults();
        let articles = registry.get("articles").unwrap();
        let rule = &articles.references[0];
        assert!(articles.is_self_reference(rule, "SW10001", "SW10001"));
        assert!(!articles.is_self_reference(rule, "SW10001.1", "SW10001"));
    }
}
