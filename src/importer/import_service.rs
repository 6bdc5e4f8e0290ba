// ==========================================
// 分批导入引擎 - 导入服务
// ==========================================
// 流程: 主导入（逐批） -> 清空工作集（一次） -> 按依赖配置顺序二次导入
// 驱动方式: 调用方逐次拉取 ImportRun::next()，每次推进一批，
//           停止拉取即停止工作，会话保存在已完成的位置上，可续传
// 失败: 撤销本批桶写入 -> 记录失败日志 -> 返回错误 -> 结束本次运行（不重试）
// ==========================================

use crate::config::DeferredProfilePlan;
use crate::domain::{ImportPass, ImportProgress, ImportRequest, Session, UnprocessedData};
use crate::file_io::FileIoProvider;
use crate::i18n::batch_success_message;
use crate::importer::data_workflow::DataWorkflow;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::unprocessed::{BucketUndo, UnprocessedDataWriter};
use crate::repository::{ImportLogger, ProfileRepository, RecordStore, RepositoryError, SessionRepository};
use futures::stream::{self, Stream};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

// ==========================================
// ImportService - 导入服务
// ==========================================
#[derive(Clone)]
pub struct ImportService {
    io: FileIoProvider,
    workflow: Arc<dyn DataWorkflow>,
    profiles: Arc<dyn ProfileRepository>,
    sessions: Arc<dyn SessionRepository>,
    logger: Arc<dyn ImportLogger>,
    store: Arc<dyn RecordStore>,
    buckets: UnprocessedDataWriter,
    deferred_plan: DeferredProfilePlan,
}

impl ImportService {
    /// 创建新的 ImportService 实例
    ///
    /// # 参数
    /// - io: 文件读写工厂
    /// - workflow: 批处理器
    /// - profiles: 映射配置仓储（加载隐藏配置）
    /// - sessions: 会话仓储
    /// - logger: 导入日志
    /// - store: 记录存储（两轮之间清空工作集）
    /// - buckets: 未处理数据桶
    /// - deferred_plan: 二次导入顺序
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        io: FileIoProvider,
        workflow: Arc<dyn DataWorkflow>,
        profiles: Arc<dyn ProfileRepository>,
        sessions: Arc<dyn SessionRepository>,
        logger: Arc<dyn ImportLogger>,
        store: Arc<dyn RecordStore>,
        buckets: UnprocessedDataWriter,
        deferred_plan: DeferredProfilePlan,
    ) -> Self {
        Self {
            io,
            workflow,
            profiles,
            sessions,
            logger,
            store,
            buckets,
            deferred_plan,
        }
    }

    /// 导入前统计记录总数（仅用于进度展示）
    pub fn prepare_import(&self, request: &ImportRequest) -> ImportResult<u64> {
        let mut reader = self.io.get_reader(request.format());
        if request.format().is_tree_structured() {
            let tree = request
                .profile()
                .mapping_tree()?
                .ok_or(ImportError::MissingMappingTree)?;
            reader.set_tree(tree);
        }

        let total = reader.get_total_count(request.input_file())?;
        debug!(file = %request.input_file().display(), total, "导入前统计完成");
        Ok(total)
    }

    /// 开始（或续传）导入
    ///
    /// 返回惰性运行器，不拉取则不做任何批处理
    pub fn import(&self, request: ImportRequest, session: Session) -> ImportResult<ImportRun> {
        if session.is_closed() {
            return Err(ImportError::SessionClosed(session.session_id));
        }

        // 日志表外键引用会话
        self.sessions.save(&session)?;
        info!(
            session_id = %session.session_id,
            profile = %request.profile().name,
            file = %request.input_file().display(),
            position = session.position,
            "导入开始"
        );

        Ok(ImportRun {
            service: self.clone(),
            primary: ImportJob {
                request,
                session,
                pass: ImportPass::Primary,
            },
            deferred: None,
            next_profile: 0,
            phase: RunPhase::Primary,
        })
    }

    /// 按会话 ID 续传
    pub fn resume(&self, request: ImportRequest, session_id: &str) -> ImportResult<ImportRun> {
        let session = self.sessions.find(session_id)?.ok_or_else(|| {
            ImportError::Repository(RepositoryError::NotFound {
                entity: "ImportSession".to_string(),
                id: session_id.to_string(),
            })
        })?;
        self.import(request, session)
    }

    /// 执行一批，失败时写失败日志
    async fn run_batch(&self, job: &mut ImportJob) -> ImportResult<ImportProgress> {
        match self.process_batch(job).await {
            Ok(progress) => Ok(progress),
            Err(e) => {
                error!(
                    session_id = %job.session.session_id,
                    profile = %job.request.profile().name,
                    position = job.session.position,
                    error = %e,
                    "批处理失败"
                );
                if let Err(log_err) = self.logger.log_processing(
                    true,
                    &job.input_label(),
                    &job.request.profile().name,
                    &e.to_string(),
                    &job.session,
                ) {
                    warn!(error = %log_err, "失败日志写入失败");
                }
                Err(e)
            }
        }
    }

    async fn process_batch(&self, job: &mut ImportJob) -> ImportResult<ImportProgress> {
        let result = self.workflow.import(&job.request, &job.session).await?;

        let mut next = job.session.clone();
        if let Some(total) = result.total_count {
            next.set_total_count(total);
        }
        next.advance(result.position, result.end_of_input)?;

        // 桶写入与会话保存一起确认；任一步失败则撤销本批已写入的桶，
        // 续传重做这一批时记录不会重复
        let mut written = Vec::new();
        let applied = self.write_buckets(job, &result.unprocessed, &mut written).and_then(|()| {
            self.sessions.save(&next)?;
            Ok(())
        });
        if let Err(e) = applied {
            for undo in written.into_iter().rev() {
                if let Err(undo_err) = self.buckets.rollback(undo) {
                    warn!(error = %undo_err, "桶文件撤销失败");
                }
            }
            return Err(e);
        }
        for undo in written {
            if let Err(commit_err) = self.buckets.commit(undo) {
                warn!(error = %commit_err, "桶文件备份清理失败");
            }
        }
        job.session = next;

        let message = batch_success_message(result.position, &result.adapter);
        self.logger.log_processing(
            false,
            &job.input_label(),
            &job.request.profile().name,
            &message,
            &job.session,
        )?;
        info!(
            session_id = %job.session.session_id,
            profile = %job.request.profile().name,
            position = job.session.position,
            closed = job.session.is_closed(),
            "批处理完成"
        );

        Ok(ImportProgress {
            profile_name: job.request.profile().name.clone(),
            position: job.session.position,
            session_id: job.session.session_id.clone(),
            pass: job.pass,
        })
    }

    fn write_buckets(
        &self,
        job: &ImportJob,
        unprocessed: &UnprocessedData,
        written: &mut Vec<BucketUndo>,
    ) -> ImportResult<()> {
        for (profile_name, records) in unprocessed {
            if records.is_empty() {
                continue;
            }
            let output = self.buckets.bucket_path(job.request.input_file(), profile_name);
            if job.pass == ImportPass::Deferred {
                // 子导入产生的桶以 -resolved 文件命名，本次运行不会再导入
                warn!(
                    profile = %profile_name,
                    file = %output.display(),
                    count = records.len(),
                    "二次导入中仍有未满足的引用，记录保留在桶文件中"
                );
            }
            written.push(self.buckets.append(profile_name, records, &output)?);
        }
        Ok(())
    }

    async fn clear_working_set(&self) -> ImportResult<()> {
        self.store.clear_working_set().await?;
        info!("主导入完成，工作集已清空");
        Ok(())
    }

    /// 顺序查找下一个有待处理桶的依赖配置
    fn next_deferred_job(&self, parent: &ImportRequest, cursor: &mut usize) -> ImportResult<Option<ImportJob>> {
        while let Some(entry) = self.deferred_plan.get(*cursor) {
            *cursor += 1;

            let tmp_path = self.buckets.bucket_path(parent.input_file(), &entry.name);
            if !tmp_path.exists() {
                debug!(profile = %entry.name, "无未处理数据，跳过");
                continue;
            }

            // 先加载配置，配置缺失时桶文件保持未晋升
            let profile = self
                .profiles
                .load_hidden_profile(&entry.name)
                .map_err(|e| match e {
                    RepositoryError::NotFound { .. } => ImportError::ProfileNotFound(entry.name.clone()),
                    other => ImportError::Repository(other),
                })?;

            let resolved = match self.buckets.promote(parent.input_file(), &entry.name)? {
                Some(resolved) => resolved,
                None => continue,
            };

            let session = self.sessions.create_session()?;
            let request = ImportRequest::for_deferred(parent, profile, resolved, entry.batch_size)?;
            info!(
                profile = %entry.name,
                session_id = %session.session_id,
                file = %request.input_file().display(),
                batch_size = entry.batch_size,
                "开始二次导入"
            );

            return Ok(Some(ImportJob {
                request,
                session,
                pass: ImportPass::Deferred,
            }));
        }
        Ok(None)
    }
}

// ==========================================
// ImportJob - 一次（子）导入的请求与会话
// ==========================================
struct ImportJob {
    request: ImportRequest,
    session: Session,
    pass: ImportPass,
}

impl ImportJob {
    fn input_label(&self) -> String {
        self.request.input_file().display().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunPhase {
    Primary,
    Barrier,
    Deferred,
    Finished,
}

// ==========================================
// ImportRun - 惰性导入运行器
// ==========================================
pub struct ImportRun {
    service: ImportService,
    primary: ImportJob,
    deferred: Option<ImportJob>,
    next_profile: usize,
    phase: RunPhase,
}

impl ImportRun {
    /// 推进一批
    ///
    /// # 返回
    /// - Some(Ok(progress)): 一批成功
    /// - Some(Err(e)): 一批失败，之后返回 None
    /// - None: 全部完成
    pub async fn next(&mut self) -> Option<ImportResult<ImportProgress>> {
        loop {
            match self.phase {
                RunPhase::Primary => {
                    let outcome = self.service.run_batch(&mut self.primary).await;
                    if outcome.is_err() {
                        self.phase = RunPhase::Finished;
                    } else if self.primary.session.is_closed() {
                        self.phase = RunPhase::Barrier;
                    }
                    return Some(outcome);
                }
                RunPhase::Barrier => {
                    if let Err(e) = self.service.clear_working_set().await {
                        self.phase = RunPhase::Finished;
                        return Some(Err(e));
                    }
                    self.phase = RunPhase::Deferred;
                }
                RunPhase::Deferred => {
                    if let Some(job) = self.deferred.as_mut() {
                        let outcome = self.service.run_batch(job).await;
                        if outcome.is_err() {
                            self.phase = RunPhase::Finished;
                        } else if job.session.is_closed() {
                            self.deferred = None;
                        }
                        return Some(outcome);
                    }

                    match self
                        .service
                        .next_deferred_job(&self.primary.request, &mut self.next_profile)
                    {
                        Ok(Some(job)) => self.deferred = Some(job),
                        Ok(None) => {
                            self.phase = RunPhase::Finished;
                            info!(session_id = %self.primary.session.session_id, "导入全部完成");
                            return None;
                        }
                        Err(e) => {
                            error!(error = %e, "二次导入准备失败");
                            self.phase = RunPhase::Finished;
                            return Some(Err(e));
                        }
                    }
                }
                RunPhase::Finished => return None,
            }
        }
    }

    /// 主导入会话
    pub fn session(&self) -> &Session {
        &self.primary.session
    }

    /// 当前正在推进的会话（二次导入期间为子会话）
    pub fn current_session(&self) -> &Session {
        match &self.deferred {
            Some(job) => &job.session,
            None => &self.primary.session,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.phase == RunPhase::Finished
    }

    /// 驱动到结束，遇到第一个错误即返回
    pub async fn run_to_end(mut self) -> ImportResult<Vec<ImportProgress>> {
        let mut progress = Vec::new();
        while let Some(item) = self.next().await {
            progress.push(item?);
        }
        Ok(progress)
    }

    /// 转为异步流
    pub fn into_stream(self) -> impl Stream<Item = ImportResult<ImportProgress>> {
        stream::unfold(self, |mut run| async move {
            let item = run.next().await?;
            Some((item, run))
        })
    }
}
