// ==========================================
// 分批导入引擎 - 应用状态
// ==========================================
// 职责: 打开数据库、加载配置、装配导入服务
// ==========================================

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::config::{ConfigManager, ImportSettings};
use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::{FileFormat, ImportRequest, Profile};
use crate::file_io::FileIoProvider;
use crate::importer::{
    AdapterRegistry, DataWorkflowImpl, ImportResult, ImportService, UnprocessedDataWriter,
    UploadPathProvider,
};
use crate::repository::{
    ProfileRepository, SqliteImportLogger, SqliteProfileRepository, SqliteRecordStore,
    SqliteSessionRepository,
};

/// 应用状态
///
/// 持有共享连接上的所有仓储与导入服务
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 上传目录（未处理数据桶所在目录）
    pub upload_dir: PathBuf,

    /// 启动时解析的导入配置
    pub settings: ImportSettings,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 映射配置仓储
    pub profile_repo: Arc<SqliteProfileRepository>,

    /// 会话仓储
    pub session_repo: Arc<SqliteSessionRepository>,

    /// 导入日志
    pub import_logger: Arc<SqliteImportLogger>,

    /// 记录存储
    pub record_store: Arc<SqliteRecordStore>,

    /// 导入服务
    pub import_service: ImportService,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    /// - upload_dir: 上传目录
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库并初始化表结构
    /// 2. 从 config_kv 加载导入配置
    /// 3. 写入内置映射配置（可见配置 + 二次导入用隐藏配置）
    /// 4. 装配 ImportService
    pub async fn new(db_path: String, upload_dir: impl Into<PathBuf>) -> Result<Self, String> {
        let upload_dir = upload_dir.into();
        tracing::info!(db_path = %db_path, upload_dir = %upload_dir.display(), "初始化AppState");

        std::fs::create_dir_all(&upload_dir)
            .map_err(|e| format!("无法创建上传目录 {}: {}", upload_dir.display(), e))?;

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库表结构初始化失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 配置
        // ==========================================
        let config_manager = Arc::new(ConfigManager::from_connection(conn.clone()));
        let settings = ImportSettings::load(config_manager.as_ref())
            .await
            .map_err(|e| format!("导入配置加载失败: {}", e))?;

        // ==========================================
        // Repository
        // ==========================================
        let profile_repo = Arc::new(SqliteProfileRepository::new(conn.clone()));
        let session_repo = Arc::new(SqliteSessionRepository::new(conn.clone()));
        let import_logger = Arc::new(SqliteImportLogger::new(conn.clone()));
        let record_store = Arc::new(SqliteRecordStore::new(conn.clone()));

        let registry = AdapterRegistry::with_defaults();
        seed_builtin_profiles(profile_repo.as_ref(), &registry, &settings)
            .map_err(|e| format!("内置映射配置写入失败: {}", e))?;

        // ==========================================
        // 导入服务
        // ==========================================
        let io = FileIoProvider::with_csv_delimiter(settings.csv_delimiter);
        let workflow = Arc::new(DataWorkflowImpl::new(io, record_store.clone(), registry));
        let buckets = UnprocessedDataWriter::new(UploadPathProvider::new(upload_dir.clone()), io);

        let import_service = ImportService::new(
            io,
            workflow,
            profile_repo.clone(),
            session_repo.clone(),
            import_logger.clone(),
            record_store.clone(),
            buckets,
            settings.deferred_plan.clone(),
        );

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            upload_dir,
            settings,
            config_manager,
            profile_repo,
            session_repo,
            import_logger,
            record_store,
            import_service,
        })
    }

    /// 按配置名构建导入请求，格式由文件扩展名决定
    ///
    /// batch_size 缺省时使用配置的默认批大小
    pub fn build_request(
        &self,
        input_file: &Path,
        profile_name: &str,
        username: &str,
        batch_size: Option<u64>,
    ) -> ImportResult<ImportRequest> {
        let tag = input_file
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let format: FileFormat = tag.parse()?;
        let profile = self.profile_repo.find_by_name(profile_name)?;
        ImportRequest::new(
            format,
            input_file,
            profile,
            username,
            batch_size.unwrap_or(self.settings.default_batch_size),
        )
    }
}

/// 可见配置 default_<类型>，隐藏配置 <类型>_deferred
fn seed_builtin_profiles(
    repo: &dyn ProfileRepository,
    registry: &AdapterRegistry,
    settings: &ImportSettings,
) -> ImportResult<()> {
    for name in registry.names() {
        repo.ensure(&Profile {
            id: 0,
            name: format!("default_{}", name),
            profile_type: name.to_string(),
            tree_json: String::new(),
            hidden: false,
        })?;
    }

    for entry in settings.deferred_plan.profiles() {
        repo.ensure(&Profile {
            id: 0,
            name: format!("{}_deferred", entry.name),
            profile_type: entry.name.clone(),
            tree_json: String::new(),
            hidden: true,
        })?;
    }
    Ok(())
}

/// 获取默认数据库路径
///
/// 优先读取环境变量 BATCH_IMPORT_DB_PATH，否则使用用户数据目录
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var("BATCH_IMPORT_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./batch_import.db");
    if let Some(dir) = app_data_dir() {
        std::fs::create_dir_all(&dir).ok();
        path = dir.join("batch_import.db");
    }
    path.to_string_lossy().to_string()
}

/// 获取默认上传目录
///
/// 优先读取环境变量 BATCH_IMPORT_UPLOAD_DIR，否则使用 <数据目录>/uploads
pub fn get_default_upload_dir() -> PathBuf {
    if let Ok(path) = std::env::var("BATCH_IMPORT_UPLOAD_DIR") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    app_data_dir()
        .map(|dir| dir.join("uploads"))
        .unwrap_or_else(|| PathBuf::from("./uploads"))
}

fn app_data_dir() -> Option<PathBuf> {
    // 开发环境使用独立目录，避免污染生产数据
    let name = if cfg!(debug_assertions) {
        "batch-import-dev"
    } else {
        "batch-import"
    };
    dirs::data_dir().map(|dir| dir.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_app_state_seeds_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("app.db").to_string_lossy().to_string();
        let state = AppState::new(db_path, dir.path().join("uploads")).await.unwrap();

        let visible: Vec<String> = state
            .profile_repo
            .list_visible()
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(visible, vec!["default_articles", "default_articlesImages"]);

        let hidden = state.profile_repo.load_hidden_profile("articlesImages").unwrap();
        assert!(hidden.hidden);
        assert!(state.upload_dir.exists());
    }

    #[tokio::test]
    async fn test_build_request_uses_extension_and_default_batch() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("app.db").to_string_lossy().to_string();
        let state = AppState::new(db_path, dir.path().join("uploads")).await.unwrap();

        let request = state
            .build_request(Path::new("/tmp/products.CSV"), "default_articles", "admin", None)
            .unwrap();
        assert_eq!(request.format(), FileFormat::Csv);
        assert_eq!(request.batch_size(), 50);

        let err = state
            .build_request(Path::new("/tmp/products.xlsx"), "default_articles", "admin", None)
            .unwrap_err();
        assert!(err.is_unsupported_format());
    }
}
