// ==========================================
// 分批导入引擎 - 映射配置 (Profile) 与映射树
// ==========================================
// 职责: 映射配置实体 + 树形映射定义的解码
// 红线: 不含配置编辑语义，只负责读取
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// Profile - 映射配置
// ==========================================
// hidden = true 的配置为系统内置，仅用于二次导入，
// 不出现在常规配置列表中
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub name: String,         // 展示名
    pub profile_type: String, // 适配器类型（如 articles / articlesImages）
    pub tree_json: String,    // 映射树 JSON（可为空）
    pub hidden: bool,
}

impl Profile {
    /// 解码映射树
    ///
    /// # 返回
    /// - Ok(None): 未配置映射树（按字段名原样导入）
    /// - Ok(Some(tree)): 解码成功
    /// - Err(InvalidMappingTree): JSON 无效
    pub fn mapping_tree(&self) -> ImportResult<Option<MappingTree>> {
        if self.tree_json.trim().is_empty() {
            return Ok(None);
        }
        let tree: MappingTree = serde_json::from_str(&self.tree_json)?;
        Ok(Some(tree))
    }
}

// ==========================================
// NodeType - 映射树节点类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Node,      // 普通容器元素
    Iteration, // 每条记录对应一个该元素
    Leaf,      // 记录字段（元素文本）
    Attribute, // 记录字段（元素属性）
}

// ==========================================
// MappingNode - 映射树节点
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(rename = "shopwareField", default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MappingNode>,
}

impl MappingNode {
    /// 节点映射到的记录字段名（未配置时取元素名）
    pub fn field_name(&self) -> &str {
        self.field.as_deref().unwrap_or(&self.name)
    }
}

// ==========================================
// MappingTree - 映射树
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingTree {
    pub root: MappingNode,
}

impl MappingTree {
    pub fn new(root: MappingNode) -> Self {
        Self { root }
    }

    /// 从 JSON 解码
    pub fn from_json(raw: &str) -> ImportResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// 从根到 iteration 节点的元素名路径（含根与 iteration 自身）
    pub fn iteration_path(&self) -> ImportResult<Vec<String>> {
        let mut path = Vec::new();
        if find_iteration(&self.root, &mut path) {
            Ok(path)
        } else {
            Err(ImportError::InvalidMappingTree(
                "映射树中没有 iteration 节点".to_string(),
            ))
        }
    }

    /// iteration 节点
    pub fn iteration_node(&self) -> ImportResult<&MappingNode> {
        let path = self.iteration_path()?;
        let mut node = &self.root;
        for name in path.iter().skip(1) {
            node = node
                .children
                .iter()
                .find(|c| &c.name == name)
                .ok_or_else(|| ImportError::InvalidMappingTree(format!("节点缺失: {}", name)))?;
        }
        Ok(node)
    }

    /// 元素/列名 -> 字段名
    pub fn field_map(&self) -> ImportResult<BTreeMap<String, String>> {
        let iteration = self.iteration_node()?;
        Ok(iteration
            .children
            .iter()
            .filter(|c| matches!(c.node_type, NodeType::Leaf | NodeType::Attribute))
            .map(|c| (c.name.clone(), c.field_name().to_string()))
            .collect())
    }
}

fn find_iteration(node: &MappingNode, path: &mut Vec<String>) -> bool {
    path.push(node.name.clone());
    if node.node_type == NodeType::Iteration {
        return true;
    }
    for child in &node.children {
        if find_iteration(child, path) {
            return true;
        }
    }
    path.pop();
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREE: &str = r#"{
        "id": "root", "name": "Root", "type": "node",
        "children": [{
            "name": "articles", "type": "node",
            "children": [{
                "name": "article", "type": "iteration",
                "children": [
                    {"name": "id", "type": "attribute", "shopwareField": "articleId"},
                    {"name": "number", "type": "leaf", "shopwareField": "ordernumber"},
                    {"name": "name", "type": "leaf"}
                ]
            }]
        }]
    }"#;

    #[test]
    fn test_iteration_path() {
        let tree = MappingTree::from_json(TREE).unwrap();
        assert_eq!(tree.iteration_path().unwrap(), vec!["Root", "articles", "article"]);
    }

    #[test]
    fn test_field_map_defaults_to_element_name() {
        let tree = MappingTree::from_json(TREE).unwrap();
        let map = tree.field_map().unwrap();
        assert_eq!(map.get("id").map(String::as_str), Some("articleId"));
        assert_eq!(map.get("number").map(String::as_str), Some("ordernumber"));
        assert_eq!(map.get("name").map(String::as_str), Some("name"));
    }

    #[test]
    fn test_tree_without_iteration_is_invalid() {
        let tree = MappingTree::from_json(r#"{"name": "Root", "type": "node"}"#).unwrap();
        assert!(matches!(
            tree.iteration_path(),
            Err(ImportError::InvalidMappingTree(_))
        ));
    }

    #[test]
    fn test_profile_without_tree() {
        let profile = Profile {
            id: 1,
            name: "default_articles".to_string(),
            profile_type: "articles".to_string(),
            tree_json: "  ".to_string(),
            hidden: false,
        };
        assert!(profile.mapping_tree().unwrap().is_none());
    }
}
