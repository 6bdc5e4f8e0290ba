// ==========================================
// 分批导入引擎 - 导入日志仓储
// ==========================================
// 红线: 每次批处理尝试（成功或失败）都必须记录
// ==========================================

use crate::domain::{ImportLogEntry, Session};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{Local, NaiveDateTime};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

// ==========================================
// ImportLogger Trait
// ==========================================
pub trait ImportLogger: Send + Sync {
    /// 记录一次批处理结果
    fn log_processing(
        &self,
        is_error: bool,
        input_file: &str,
        profile_name: &str,
        message: &str,
        session: &Session,
    ) -> RepositoryResult<()>;

    /// 查询会话的全部日志（按写入顺序）
    fn list_by_session(&self, session_id: &str) -> RepositoryResult<Vec<ImportLogEntry>>;
}

// ==========================================
// SqliteImportLogger
// ==========================================
pub struct SqliteImportLogger {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteImportLogger {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

impl ImportLogger for SqliteImportLogger {
    fn log_processing(
        &self,
        is_error: bool,
        input_file: &str,
        profile_name: &str,
        message: &str,
        session: &Session,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO import_log (
                log_id, session_id, is_error, input_file, profile_name, message, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                Uuid::new_v4().to_string(),
                session.session_id,
                is_error as i32,
                input_file,
                profile_name,
                message,
                Local::now().naive_local().format(TS_FORMAT).to_string(),
            ],
        )?;
        Ok(())
    }

    fn list_by_session(&self, session_id: &str) -> RepositoryResult<Vec<ImportLogEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT log_id, session_id, is_error, input_file, profile_name, message, created_at
            FROM import_log
            WHERE session_id = ?1
            ORDER BY rowid
            "#,
        )?;

        let rows = stmt.query_map(params![session_id], |row| {
            let created_at: String = row.get(6)?;
            Ok(ImportLogEntry {
                log_id: row.get(0)?,
                session_id: row.get(1)?,
                is_error: row.get::<_, i64>(2)? != 0,
                input_file: row.get(3)?,
                profile_name: row.get(4)?,
                message: row.get(5)?,
                created_at: NaiveDateTime::parse_from_str(&created_at, TS_FORMAT).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        6,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}
