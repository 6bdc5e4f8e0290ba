// ==========================================
// 分批导入引擎 - 批处理器
// ==========================================
// 职责: 从会话位置读取一批记录 -> 字段映射 -> 引用检查 -> 落库
// 引用未满足的记录按依赖配置名归集到 unprocessed，由引擎写入桶文件
// 红线: 不修改会话（会话推进只由引擎在批成功后执行）
// ==========================================

use crate::domain::{BatchResult, DataRecord, FileFormat, ImportRequest, Session, UnprocessedData};
use crate::file_io::{FileIoProvider, FileReader};
use crate::importer::entity_adapter::{AdapterRegistry, EntityAdapter, ReferenceRule};
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::RecordStore;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument};

// ==========================================
// DataWorkflow Trait
// ==========================================
#[async_trait]
pub trait DataWorkflow: Send + Sync {
    /// 处理会话当前位置开始的一批记录
    ///
    /// # 返回
    /// - position: 本批处理后的位置（>= 会话位置）
    /// - end_of_input: 输入是否已耗尽
    /// - unprocessed: 依赖配置名 -> 延后记录
    async fn import(&self, request: &ImportRequest, session: &Session) -> ImportResult<BatchResult>;
}

// ==========================================
// DataWorkflowImpl
// ==========================================
pub struct DataWorkflowImpl {
    io: FileIoProvider,
    store: Arc<dyn RecordStore>,
    registry: AdapterRegistry,
}

impl DataWorkflowImpl {
    pub fn new(io: FileIoProvider, store: Arc<dyn RecordStore>, registry: AdapterRegistry) -> Self {
        Self { io, store, registry }
    }

    fn reader_for(&self, request: &ImportRequest) -> ImportResult<Box<dyn FileReader>> {
        let mut reader = self.io.get_reader(request.format());
        if request.format().is_tree_structured() {
            let tree = request
                .profile()
                .mapping_tree()?
                .ok_or(ImportError::MissingMappingTree)?;
            reader.set_tree(tree);
        }
        Ok(reader)
    }

    /// CSV 列名 -> 实体字段名（XML 读取器已按映射树输出字段名）
    fn field_map(&self, request: &ImportRequest) -> ImportResult<Option<BTreeMap<String, String>>> {
        if request.format() != FileFormat::Csv {
            return Ok(None);
        }
        match request.profile().mapping_tree()? {
            Some(tree) => Ok(Some(tree.field_map()?)),
            None => Ok(None),
        }
    }

    /// 第一个未满足的引用规则
    async fn unresolved_reference<'a>(
        &self,
        adapter: &'a EntityAdapter,
        key: &str,
        record: &DataRecord,
    ) -> ImportResult<Option<&'a ReferenceRule>> {
        for rule in &adapter.references {
            let value = match record.get(&rule.field).map(|v| v.trim()) {
                Some(v) if !v.is_empty() => v,
                _ => continue,
            };
            if adapter.is_self_reference(rule, key, value) {
                continue;
            }

            let exists = self
                .store
                .exists(&rule.target_entity, value)
                .await
                .map_err(|e| ImportError::BatchProcessing(e.to_string()))?;
            if !exists {
                return Ok(Some(rule));
            }
        }
        Ok(None)
    }
}

fn apply_field_map(record: DataRecord, field_map: Option<&BTreeMap<String, String>>) -> DataRecord {
    match field_map {
        Some(map) => record
            .into_iter()
            .map(|(column, value)| match map.get(&column) {
                Some(field) => (field.clone(), value),
                None => (column, value),
            })
            .collect(),
        None => record,
    }
}

#[async_trait]
impl DataWorkflow for DataWorkflowImpl {
    #[instrument(skip(self, request, session), fields(
        session_id = %session.session_id,
        profile = %request.profile().name,
        start = session.position
    ))]
    async fn import(&self, request: &ImportRequest, session: &Session) -> ImportResult<BatchResult> {
        if session.is_closed() {
            return Err(ImportError::SessionClosed(session.session_id.clone()));
        }

        let adapter = self.registry.get(&request.profile().profile_type)?;
        let reader = self.reader_for(request)?;
        let field_map = self.field_map(request)?;
        let input = request.input_file();

        let total = match session.total_count {
            Some(total) => total,
            None => reader.get_total_count(input)?,
        };

        let start = session.position;
        let records = reader.read_records(input, start, request.batch_size())?;
        let consumed = records.len() as u64;

        let mut unprocessed = UnprocessedData::new();
        let mut stored = 0usize;
        for (offset, raw) in records.into_iter().enumerate() {
            let row = start + offset as u64 + 1;
            let record = apply_field_map(raw, field_map.as_ref());

            let key = match record.get(&adapter.key_field).map(|v| v.trim()) {
                Some(key) if !key.is_empty() => key.to_string(),
                _ => {
                    return Err(ImportError::Validation {
                        row,
                        message: format!("主键字段 {} 为空", adapter.key_field),
                    })
                }
            };

            if let Some(rule) = self.unresolved_reference(adapter, &key, &record).await? {
                debug!(row, key = %key, field = %rule.field, deferred = %rule.deferred_profile, "引用未满足，延后处理");
                unprocessed
                    .entry(rule.deferred_profile.clone())
                    .or_default()
                    .push(record);
                continue;
            }

            self.store
                .upsert(&adapter.entity, &key, &record)
                .await
                .map_err(|e| ImportError::BatchProcessing(format!("行 {}: {}", row, e)))?;
            stored += 1;
        }

        let position = start + consumed;
        let end_of_input = position >= total || consumed < request.batch_size();
        debug!(position, total, stored, end_of_input, "批处理完成");

        Ok(BatchResult {
            position,
            adapter: adapter.name.clone(),
            total_count: Some(total),
            end_of_input,
            unprocessed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::domain::Profile;
    use crate::repository::SqliteRecordStore;
    use rusqlite::Connection;
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;

    const ARTICLES_TREE: &str = r#"{
        "name": "root", "type": "node", "children": [
            {"name": "articles", "type": "node", "children": [
                {"name": "article", "type": "iteration", "children": [
                    {"name": "Nummer", "type": "leaf", "shopwareField": "ordernumber"},
                    {"name": "Hauptnummer", "type": "leaf", "shopwareField": "mainnumber"}
                ]}
            ]}
        ]
    }"#;

    fn setup() -> (DataWorkflowImpl, Arc<SqliteRecordStore>) {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let store = Arc::new(SqliteRecordStore::new(Arc::new(Mutex::new(conn))));
        let workflow = DataWorkflowImpl::new(
            FileIoProvider::new(),
            store.clone(),
            AdapterRegistry::with_defaults(),
        );
        (workflow, store)
    }

    fn profile(profile_type: &str, tree_json: &str) -> Profile {
        Profile {
            id: 1,
            name: format!("default_{}", profile_type),
            profile_type: profile_type.to_string(),
            tree_json: tree_json.to_string(),
            hidden: false,
        }
    }

    fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_batch_window_and_deferral() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(
            dir.path(),
            "articles.csv",
            "ordernumber;mainnumber\nSW1.1;SW1\nSW1;SW1\nSW2;\n",
        );
        let (workflow, store) = setup();
        let request = ImportRequest::new(FileFormat::Csv, &input, profile("articles", ""), "admin", 2).unwrap();

        let session = Session::new();
        let first = workflow.import(&request, &session).await.unwrap();
        assert_eq!(first.position, 2);
        assert_eq!(first.total_count, Some(3));
        assert!(!first.end_of_input);
        // SW1.1 引用的 SW1 尚未落库
        assert_eq!(first.unprocessed["articles"].len(), 1);
        assert_eq!(first.unprocessed["articles"][0]["ordernumber"], "SW1.1");
        assert_eq!(store.count("article").unwrap(), 1);

        let mut next = session.clone();
        next.advance(first.position, first.end_of_input).unwrap();
        next.set_total_count(3);
        let second = workflow.import(&request, &next).await.unwrap();
        assert_eq!(second.position, 3);
        assert!(second.end_of_input);
        assert!(!second.has_unprocessed());
        assert_eq!(store.count("article").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_csv_columns_renamed_through_tree() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(dir.path(), "artikel.csv", "Nummer;Hauptnummer\nSW5;SW5\n");
        let (workflow, store) = setup();
        let request =
            ImportRequest::new(FileFormat::Csv, &input, profile("articles", ARTICLES_TREE), "admin", 10).unwrap();

        let result = workflow.import(&request, &Session::new()).await.unwrap();
        assert!(result.end_of_input);
        let stored = store.find("article", "SW5").unwrap().unwrap();
        assert_eq!(stored["mainnumber"], "SW5");
    }

    #[tokio::test]
    async fn test_empty_key_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(dir.path(), "broken.csv", "ordernumber;mainnumber\n;SW1\n");
        let (workflow, _store) = setup();
        let request = ImportRequest::new(FileFormat::Csv, &input, profile("articles", ""), "admin", 10).unwrap();

        let err = workflow.import(&request, &Session::new()).await.unwrap_err();
        assert!(matches!(err, ImportError::Validation { row: 1, .. }));
    }

    #[tokio::test]
    async fn test_unknown_adapter() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(dir.path(), "orders.csv", "id\n1\n");
        let (workflow, _store) = setup();
        let request = ImportRequest::new(FileFormat::Csv, &input, profile("orders", ""), "admin", 10).unwrap();

        let err = workflow.import(&request, &Session::new()).await.unwrap_err();
        assert!(matches!(err, ImportError::UnknownAdapter(_)));
    }

    #[tokio::test]
    async fn test_xml_without_tree() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(dir.path(), "articles.xml", "<root/>");
        let (workflow, _store) = setup();
        let request = ImportRequest::new(FileFormat::Xml, &input, profile("articles", ""), "admin", 10).unwrap();

        let err = workflow.import(&request, &Session::new()).await.unwrap_err();
        assert!(matches!(err, ImportError::MissingMappingTree));
    }
}
