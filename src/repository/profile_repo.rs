// ==========================================
// 分批导入引擎 - 映射配置仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
// 说明: hidden = 1 的配置为系统内置，只供二次导入加载，
//       不出现在 list_visible 中
// ==========================================

use crate::domain::Profile;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// ProfileRepository Trait
// ==========================================
pub trait ProfileRepository: Send + Sync {
    /// 按名称加载（可见与隐藏配置均可）
    fn find_by_name(&self, name: &str) -> RepositoryResult<Profile>;

    /// 加载指定类型的隐藏配置
    fn load_hidden_profile(&self, profile_type: &str) -> RepositoryResult<Profile>;

    /// 列出用户可见的配置
    fn list_visible(&self) -> RepositoryResult<Vec<Profile>>;

    /// 插入配置（同名已存在时返回已有 id）
    fn ensure(&self, profile: &Profile) -> RepositoryResult<i64>;
}

// ==========================================
// SqliteProfileRepository
// ==========================================
pub struct SqliteProfileRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteProfileRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
        Ok(Profile {
            id: row.get(0)?,
            name: row.get(1)?,
            profile_type: row.get(2)?,
            tree_json: row.get(3)?,
            hidden: row.get::<_, i64>(4)? != 0,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT profile_id, name, profile_type, tree_json, hidden FROM import_profile";

impl ProfileRepository for SqliteProfileRepository {
    fn find_by_name(&self, name: &str) -> RepositoryResult<Profile> {
        let conn = self.get_conn()?;
        conn.query_row(
            &format!("{} WHERE name = ?1", SELECT_COLUMNS),
            params![name],
            Self::map_row,
        )
        .optional()?
        .ok_or_else(|| RepositoryError::NotFound {
            entity: "import_profile".to_string(),
            id: name.to_string(),
        })
    }

    fn load_hidden_profile(&self, profile_type: &str) -> RepositoryResult<Profile> {
        let conn = self.get_conn()?;
        conn.query_row(
            &format!(
                "{} WHERE profile_type = ?1 AND hidden = 1 ORDER BY profile_id LIMIT 1",
                SELECT_COLUMNS
            ),
            params![profile_type],
            Self::map_row,
        )
        .optional()?
        .ok_or_else(|| RepositoryError::NotFound {
            entity: "import_profile(hidden)".to_string(),
            id: profile_type.to_string(),
        })
    }

    fn list_visible(&self) -> RepositoryResult<Vec<Profile>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!("{} WHERE hidden = 0 ORDER BY name", SELECT_COLUMNS))?;
        let rows = stmt.query_map([], Self::map_row)?;

        let mut profiles = Vec::new();
        for row in rows {
            profiles.push(row?);
        }
        Ok(profiles)
    }

    fn ensure(&self, profile: &Profile) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR IGNORE INTO import_profile (name, profile_type, tree_json, hidden)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                profile.name,
                profile.profile_type,
                profile.tree_json,
                profile.hidden as i32,
            ],
        )?;

        let id: i64 = conn.query_row(
            "SELECT profile_id FROM import_profile WHERE name = ?1",
            params![profile.name],
            |row| row.get(0),
        )?;
        Ok(id)
    }
}
