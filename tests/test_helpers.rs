// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时环境（数据库 + 上传目录）、输入文件生成、
//       可注入故障的批处理器与可观测的记录存储
// ==========================================

#![allow(dead_code)]

use async_trait::async_trait;
use batch_import::app::AppState;
use batch_import::config::DeferredProfilePlan;
use batch_import::domain::{BatchResult, DataRecord, ImportRequest, Session, UnprocessedData};
use batch_import::file_io::FileIoProvider;
use batch_import::importer::{
    DataWorkflow, ImportError, ImportResult, ImportService, UnprocessedDataWriter,
    UploadPathProvider,
};
use batch_import::repository::{
    RecordStore, RepositoryError, RepositoryResult, SessionRepository, SqliteRecordStore,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ==========================================
// TestEnv - 临时数据库 + 上传目录 + 输入目录
// ==========================================
pub struct TestEnv {
    pub dir: TempDir,
    pub upload_dir: PathBuf,
    pub input_dir: PathBuf,
    pub state: AppState,
}

impl TestEnv {
    pub async fn new() -> TestEnv {
        let dir = tempfile::tempdir().expect("无法创建临时目录");
        let db_path = dir.path().join("import.db").to_string_lossy().to_string();
        let upload_dir = dir.path().join("uploads");
        let input_dir = dir.path().join("input");
        std::fs::create_dir_all(&input_dir).expect("无法创建输入目录");

        let state = AppState::new(db_path, upload_dir.clone())
            .await
            .expect("无法初始化AppState");

        TestEnv {
            dir,
            upload_dir,
            input_dir,
            state,
        }
    }

    /// 写入输入文件
    pub fn write_input(&self, name: &str, content: &str) -> PathBuf {
        let path = self.input_dir.join(name);
        std::fs::write(&path, content).expect("无法写入输入文件");
        path
    }

    /// 上传目录中的文件名（排序后）
    /// 上传目录中某个文件的内容
    pub fn read_upload(&self, name: &str) -> String {
        std::fs::read_to_string(self.upload_dir.join(name)).expect("无法读取上传文件")
    }

    pub fn upload_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.upload_dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    /// 用自定义批处理器/存储/顺序组装导入服务，仓储沿用 AppState
    pub fn service_with(
        &self,
        workflow: Arc<dyn DataWorkflow>,
        store: Arc<dyn RecordStore>,
        plan: DeferredProfilePlan,
    ) -> ImportService {
        self.service_with_sessions(workflow, store, plan, self.state.session_repo.clone())
    }

    /// 同 service_with，另外替换会话仓储
    pub fn service_with_sessions(
        &self,
        workflow: Arc<dyn DataWorkflow>,
        store: Arc<dyn RecordStore>,
        plan: DeferredProfilePlan,
        sessions: Arc<dyn SessionRepository>,
    ) -> ImportService {
        let io = FileIoProvider::new();
        ImportService::new(
            io,
            workflow,
            self.state.profile_repo.clone(),
            sessions,
            self.state.import_logger.clone(),
            store,
            UnprocessedDataWriter::new(UploadPathProvider::new(self.upload_dir.clone()), io),
            plan,
        )
    }
}

/// 无引用的商品 CSV: SW1..SWn，mainnumber 为空
pub fn articles_csv(count: usize) -> String {
    let mut content = String::from("ordernumber;mainnumber\n");
    for i in 1..=count {
        content.push_str(&format!("SW{};\n", i));
    }
    content
}

pub fn record(pairs: &[(&str, &str)]) -> DataRecord {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ==========================================
// EventLog - 跨组件的调用顺序记录
// ==========================================
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| *e == event).count()
    }
}

// ==========================================
// ObservedStore - 记录 clear_working_set 调用
// ==========================================
pub struct ObservedStore {
    pub inner: Arc<SqliteRecordStore>,
    pub events: EventLog,
}

#[async_trait]
impl RecordStore for ObservedStore {
    async fn exists(&self, entity: &str, key: &str) -> RepositoryResult<bool> {
        self.inner.exists(entity, key).await
    }

    async fn upsert(&self, entity: &str, key: &str, record: &DataRecord) -> RepositoryResult<()> {
        self.inner.upsert(entity, key, record).await
    }

    async fn clear_working_set(&self) -> RepositoryResult<()> {
        self.events.push("clear");
        self.inner.clear_working_set().await
    }
}

// ==========================================
// FlakySessions - 第 fail_on 次 save 失败
// ==========================================
pub struct FlakySessions {
    pub inner: Arc<dyn SessionRepository>,
    pub fail_on: usize,
    pub saves: AtomicUsize,
}

impl FlakySessions {
    pub fn new(inner: Arc<dyn SessionRepository>, fail_on: usize) -> Self {
        Self {
            inner,
            fail_on,
            saves: AtomicUsize::new(0),
        }
    }
}

impl SessionRepository for FlakySessions {
    fn create_session(&self) -> RepositoryResult<Session> {
        self.inner.create_session()
    }

    fn save(&self, session: &Session) -> RepositoryResult<()> {
        let call = self.saves.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(RepositoryError::LockError("注入故障".to_string()));
        }
        self.inner.save(session)
    }

    fn find(&self, session_id: &str) -> RepositoryResult<Option<Session>> {
        self.inner.find(session_id)
    }
}

// ==========================================
// FailingWorkflow - 第 fail_on 次调用失败
// ==========================================
pub struct FailingWorkflow {
    pub inner: Arc<dyn DataWorkflow>,
    pub fail_on: usize,
    pub calls: AtomicUsize,
}

impl FailingWorkflow {
    pub fn new(inner: Arc<dyn DataWorkflow>, fail_on: usize) -> Self {
        Self {
            inner,
            fail_on,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DataWorkflow for FailingWorkflow {
    async fn import(&self, request: &ImportRequest, session: &Session) -> ImportResult<BatchResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(ImportError::BatchProcessing(format!("注入故障: 第 {} 批", call)));
        }
        self.inner.import(request, session).await
    }
}

// ==========================================
// ScriptedWorkflow - 主导入一批结束并产出指定未处理数据，
//                    子导入一批读完桶文件
// ==========================================
pub struct ScriptedWorkflow {
    pub unprocessed: UnprocessedData,
    pub events: EventLog,
}

#[async_trait]
impl DataWorkflow for ScriptedWorkflow {
    async fn import(&self, request: &ImportRequest, _session: &Session) -> ImportResult<BatchResult> {
        let profile = request.profile();
        self.events.push(format!("batch:{}", profile.name));

        if profile.hidden {
            let total = FileIoProvider::new()
                .get_reader(request.format())
                .get_total_count(request.input_file())?;
            return Ok(BatchResult {
                position: total,
                adapter: profile.profile_type.clone(),
                total_count: Some(total),
                end_of_input: true,
                unprocessed: UnprocessedData::new(),
            });
        }

        Ok(BatchResult {
            position: 1,
            adapter: profile.profile_type.clone(),
            total_count: Some(1),
            end_of_input: true,
            unprocessed: self.unprocessed.clone(),
        })
    }
}

pub fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().to_string()
}
