// ==========================================
// 分批导入引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、写入
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::deferred_profile_plan::{DeferredProfilePlan, DEFAULT_DEFERRED_BATCH_SIZE};
use crate::config::import_config_trait::ImportConfigReader;
use crate::file_io::DEFAULT_CSV_DELIMITER;
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::error::RepositoryError;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

/// 配置键
pub mod config_keys {
    pub const DEFERRED_PROFILES: &str = "import/deferred_profiles";
    pub const CSV_DELIMITER: &str = "import/csv_delimiter";
    pub const DEFAULT_BATCH_SIZE: &str = "import/default_batch_size";
}

const GLOBAL_SCOPE: &str = "global";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> ImportResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![GLOBAL_SCOPE, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入配置值（global scope）
    pub fn set_config_value(&self, key: &str, value: &str) -> ImportResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![GLOBAL_SCOPE, key, value],
        )?;
        Ok(())
    }

    fn config_error(key: &str, value: &str, message: &str) -> ImportError {
        ImportError::Config {
            key: key.to_string(),
            message: format!("{} (value: {})", message, value),
        }
    }
}

#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_deferred_profile_plan(&self) -> ImportResult<DeferredProfilePlan> {
        match self.get_config_value(config_keys::DEFERRED_PROFILES)? {
            Some(raw) => DeferredProfilePlan::from_json(&raw),
            None => Ok(DeferredProfilePlan::default()),
        }
    }

    async fn get_csv_delimiter(&self) -> ImportResult<u8> {
        let raw = match self.get_config_value(config_keys::CSV_DELIMITER)? {
            Some(raw) => raw,
            None => return Ok(DEFAULT_CSV_DELIMITER),
        };

        // "\t" 允许写成转义形式
        let normalized = if raw == "\\t" { "\t" } else { raw.as_str() };
        match normalized.as_bytes() {
            [b] => Ok(*b),
            _ => Err(Self::config_error(
                config_keys::CSV_DELIMITER,
                &raw,
                "分隔符必须是单个 ASCII 字符",
            )),
        }
    }

    async fn get_default_batch_size(&self) -> ImportResult<u64> {
        let raw = match self.get_config_value(config_keys::DEFAULT_BATCH_SIZE)? {
            Some(raw) => raw,
            None => return Ok(DEFAULT_DEFERRED_BATCH_SIZE),
        };

        match raw.trim().parse::<u64>() {
            Ok(0) => Err(ImportError::InvalidBatchSize(0)),
            Ok(size) => Ok(size),
            Err(e) => Err(Self::config_error(
                config_keys::DEFAULT_BATCH_SIZE,
                &raw,
                &e.to_string(),
            )),
        }
    }
}
