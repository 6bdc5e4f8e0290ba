// ==========================================
// 分批导入引擎 - 记录持久化
// ==========================================
// 职责: 落库记录、判定被引用实体是否已存在
// 说明: 存在性查询带标识缓存（identity cache），
//       clear_working_set 清空缓存，在两轮导入之间调用一次
// ==========================================

use crate::domain::DataRecord;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

// ==========================================
// RecordStore Trait
// ==========================================
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// 实体是否已落库
    async fn exists(&self, entity: &str, key: &str) -> RepositoryResult<bool>;

    /// 插入或覆盖记录
    async fn upsert(&self, entity: &str, key: &str, record: &DataRecord) -> RepositoryResult<()>;

    /// 清空工作集（标识缓存）
    async fn clear_working_set(&self) -> RepositoryResult<()>;
}

// ==========================================
// SqliteRecordStore
// ==========================================
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
    identity: Mutex<HashSet<(String, String)>>, // 已确认存在的 (entity, key)
}

impl SqliteRecordStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            conn,
            identity: Mutex::new(HashSet::new()),
        }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn identity(&self) -> RepositoryResult<MutexGuard<'_, HashSet<(String, String)>>> {
        self.identity
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 工作集大小
    pub fn working_set_len(&self) -> RepositoryResult<usize> {
        Ok(self.identity()?.len())
    }

    /// 读取已落库记录
    pub fn find(&self, entity: &str, key: &str) -> RepositoryResult<Option<DataRecord>> {
        let conn = self.get_conn()?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload_json FROM entity_record WHERE entity = ?1 AND record_key = ?2",
                params![entity, key],
                |row| row.get(0),
            )
            .optional()?;

        match payload {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// 统计实体记录数
    pub fn count(&self, entity: &str) -> RepositoryResult<u64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entity_record WHERE entity = ?1",
            params![entity],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn exists(&self, entity: &str, key: &str) -> RepositoryResult<bool> {
        let cache_key = (entity.to_string(), key.to_string());
        if self.identity()?.contains(&cache_key) {
            return Ok(true);
        }

        let found = {
            let conn = self.get_conn()?;
            conn.query_row(
                "SELECT 1 FROM entity_record WHERE entity = ?1 AND record_key = ?2",
                params![entity, key],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false)
        };

        // 只缓存“存在”，不存在的键之后可能被写入
        if found {
            self.identity()?.insert(cache_key);
        }
        Ok(found)
    }

    async fn upsert(&self, entity: &str, key: &str, record: &DataRecord) -> RepositoryResult<()> {
        let payload = serde_json::to_string(record)?;
        {
            let conn = self.get_conn()?;
            conn.execute(
                r#"
                INSERT INTO entity_record (entity, record_key, payload_json, updated_at)
                VALUES (?1, ?2, ?3, datetime('now'))
                ON CONFLICT(entity, record_key) DO UPDATE SET
                    payload_json = excluded.payload_json,
                    updated_at = excluded.updated_at
                "#,
                params![entity, key, payload],
            )?;
        }
        self.identity()?.insert((entity.to_string(), key.to_string()));
        Ok(())
    }

    async fn clear_working_set(&self) -> RepositoryResult<()> {
        let mut identity = self.identity()?;
        debug!(cached = identity.len(), "清空工作集");
        identity.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn store() -> SqliteRecordStore {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        SqliteRecordStore::new(Arc::new(Mutex::new(conn)))
    }

    fn record(number: &str) -> DataRecord {
        let mut record = DataRecord::new();
        record.insert("ordernumber".to_string(), number.to_string());
        record
    }

    #[tokio::test]
    async fn test_upsert_then_exists() {
        let store = store();
        assert!(!store.exists("article", "SW10001").await.unwrap());

        store.upsert("article", "SW10001", &record("SW10001")).await.unwrap();
        assert!(store.exists("article", "SW10001").await.unwrap());
        assert_eq!(store.count("article").unwrap(), 1);
        assert_eq!(store.find("article", "SW10001").unwrap(), Some(record("SW10001")));
    }

    #[tokio::test]
    async fn test_clear_working_set_keeps_committed_rows() {
        let store = store();
        store.upsert("article", "SW10001", &record("SW10001")).await.unwrap();
        assert_eq!(store.working_set_len().unwrap(), 1);

        store.clear_working_set().await.unwrap();
        assert_eq!(store.working_set_len().unwrap(), 0);
        // 清缓存不影响已提交数据
        assert!(store.exists("article", "SW10001").await.unwrap());
    }
}
