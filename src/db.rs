// ==========================================
// 分批导入引擎 - SQLite 基础设施
// ==========================================
// 所有连接经 open_sqlite_connection 打开，逐连接开启外键并设置 busy 等待；
// init_schema 建表（应用启动、测试共用）
// ==========================================

use rusqlite::{Connection, OptionalExtension};
use std::time::Duration;

/// 写锁等待上限（毫秒）
pub const BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前 schema 版本
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 逐连接设置: 外键约束（import_log -> import_session）与 busy 等待
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))
}

pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 初始化 schema（幂等）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS import_profile (
            profile_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            profile_type TEXT NOT NULL,
            tree_json TEXT NOT NULL DEFAULT '',
            hidden INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS import_session (
            session_id TEXT PRIMARY KEY,
            state TEXT NOT NULL,
            position INTEGER NOT NULL DEFAULT 0,
            total_count INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS import_log (
            log_id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES import_session(session_id),
            is_error INTEGER NOT NULL,
            input_file TEXT NOT NULL,
            profile_name TEXT NOT NULL,
            message TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_import_log_session ON import_log(session_id);

        CREATE TABLE IF NOT EXISTS entity_record (
            entity TEXT NOT NULL,
            record_key TEXT NOT NULL,
            payload_json TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (entity, record_key)
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 已应用的 schema 版本，未建表时为 None
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let exists = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()?
        .is_some();

    if exists {
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
    } else {
        Ok(None)
    }
}
