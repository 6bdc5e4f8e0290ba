// ==========================================
// 分批导入引擎 - 导入会话仓储
// ==========================================
// 会话在批次之间持久化，支持中断后续传
// ==========================================

use crate::domain::{Session, SessionState};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// SessionRepository Trait
// ==========================================
pub trait SessionRepository: Send + Sync {
    /// 创建并持久化一个新会话（OPEN, position = 0）
    fn create_session(&self) -> RepositoryResult<Session>;

    /// 保存会话当前状态（不存在则插入）
    fn save(&self, session: &Session) -> RepositoryResult<()>;

    fn find(&self, session_id: &str) -> RepositoryResult<Option<Session>>;
}

// ==========================================
// SqliteSessionRepository
// ==========================================
pub struct SqliteSessionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSessionRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Session> {
        let state: String = row.get(1)?;
        let state = state
            .parse::<SessionState>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, e.into()))?;

        Ok(Session {
            session_id: row.get(0)?,
            state,
            position: row.get::<_, i64>(2)? as u64,
            total_count: row.get::<_, Option<i64>>(3)?.map(|v| v as u64),
            created_at: parse_ts(row, 4)?,
            updated_at: parse_ts(row, 5)?,
        })
    }
}

fn parse_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl SessionRepository for SqliteSessionRepository {
    fn create_session(&self) -> RepositoryResult<Session> {
        let session = Session::new();
        self.save(&session)?;
        Ok(session)
    }

    fn save(&self, session: &Session) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO import_session (
                session_id, state, position, total_count, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(session_id) DO UPDATE SET
                state = excluded.state,
                position = excluded.position,
                total_count = excluded.total_count,
                updated_at = excluded.updated_at
            "#,
            params![
                session.session_id,
                session.state.to_string(),
                session.position as i64,
                session.total_count.map(|v| v as i64),
                session.created_at.to_rfc3339(),
                session.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn find(&self, session_id: &str) -> RepositoryResult<Option<Session>> {
        let conn = self.get_conn()?;
        let session = conn
            .query_row(
                r#"
                SELECT session_id, state, position, total_count, created_at, updated_at
                FROM import_session WHERE session_id = ?1
                "#,
                params![session_id],
                Self::map_row,
            )
            .optional()?;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn repo() -> SqliteSessionRepository {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        SqliteSessionRepository::new(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_create_and_resume_session() {
        let repo = repo();
        let mut session = repo.create_session().unwrap();
        assert!(session.is_open());

        session.set_total_count(120);
        session.advance(50, false).unwrap();
        repo.save(&session).unwrap();

        let loaded = repo.find(&session.session_id).unwrap().unwrap();
        assert_eq!(loaded.position, 50);
        assert_eq!(loaded.total_count, Some(120));
        assert_eq!(loaded.state, SessionState::Open);

        session.advance(120, true).unwrap();
        repo.save(&session).unwrap();
        let loaded = repo.find(&session.session_id).unwrap().unwrap();
        assert_eq!(loaded.state, SessionState::Closed);
    }

    #[test]
    fn test_find_missing_session() {
        assert!(repo().find("missing").unwrap().is_none());
    }
}
