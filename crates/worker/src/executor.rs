use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use pipeline_core::{
    config::ExecutorConfig, models::TIMEOUT_REASON, JobContext, JobDefinition, JobHandler, JobRun,
    PipelineError, PipelineResult, StateKeys, StateStore,
};
use pipeline_infrastructure::{JobRunStore, MetricsRegistry};

use crate::handlers::HandlerRegistry;

/// 一次提交的结果
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// 本进程执行完毕（成功或失败）
    Completed(JobRun),
    /// 已有运行实例持有锁，本次提交不执行
    AlreadyRunning,
}

impl SubmitOutcome {
    pub fn run(&self) -> Option<&JobRun> {
        match self {
            SubmitOutcome::Completed(run) => Some(run),
            SubmitOutcome::AlreadyRunning => None,
        }
    }
}

struct ResolvedJob {
    handler: Arc<dyn JobHandler>,
    max_duration: Duration,
}

/// 当前进程的标识，写入锁和运行记录
pub fn default_owner() -> String {
    let host = hostname::get()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());
    format!("{}-{}", host, std::process::id())
}

/// 任务执行器
pub struct JobExecutor {
    jobs: HashMap<String, ResolvedJob>,
    store: Arc<dyn StateStore>,
    runs: JobRunStore,
    keys: StateKeys,
    metrics: Arc<MetricsRegistry>,
    owner: String,
    lock_ttl_margin: Duration,
}

impl JobExecutor {
    /// 创建执行器，所有任务的处理器必须已在注册表中
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        definitions: &[JobDefinition],
        handlers: &HandlerRegistry,
        config: &ExecutorConfig,
        store: Arc<dyn StateStore>,
        runs: JobRunStore,
        keys: StateKeys,
        metrics: Arc<MetricsRegistry>,
        owner: impl Into<String>,
    ) -> PipelineResult<Self> {
        let mut jobs = HashMap::with_capacity(definitions.len());
        for definition in definitions {
            let handler = handlers.resolve(&definition.handler)?;
            let max_duration = Duration::from_secs(
                definition
                    .max_duration_seconds
                    .unwrap_or(config.default_max_duration_seconds),
            );
            jobs.insert(
                definition.name.clone(),
                ResolvedJob {
                    handler,
                    max_duration,
                },
            );
        }

        Ok(Self {
            jobs,
            store,
            runs,
            keys,
            metrics,
            owner: owner.into(),
            lock_ttl_margin: Duration::from_secs(config.lock_ttl_margin_seconds),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// 提交一次任务运行
    ///
    /// 单飞锁被占用时直接返回 [`SubmitOutcome::AlreadyRunning`]。
    /// 状态存储不可用时按“未在运行”处理，继续执行。
    #[instrument(skip(self), fields(owner = %self.owner))]
    pub async fn submit(&self, job_name: &str) -> PipelineResult<SubmitOutcome> {
        let job = self
            .jobs
            .get(job_name)
            .ok_or_else(|| PipelineError::JobNotFound {
                name: job_name.to_string(),
            })?;

        let mut run = JobRun::pending(job_name, &self.owner);
        let lock_key = self.keys.job_lock(job_name);
        let lock_ttl = job.max_duration + self.lock_ttl_margin;

        let lock_held = match self
            .store
            .set_if_absent(&lock_key, &run.run_id, lock_ttl)
            .await
        {
            Ok(true) => true,
            Ok(false) => {
                info!("任务 {} 已有运行实例，跳过本次提交", job_name);
                self.metrics.record_submission_skipped(job_name);
                return Ok(SubmitOutcome::AlreadyRunning);
            }
            Err(e) => {
                warn!("获取任务锁失败，按无锁继续执行: {}", e);
                self.metrics.record_store_error("set_if_absent");
                false
            }
        };

        run.start();
        self.save_run(&run).await;
        self.metrics.job_started();
        info!(run_id = %run.run_id, "任务开始执行: {}", job_name);

        let started = tokio::time::Instant::now();
        let ctx = JobContext {
            job_name: job_name.to_string(),
            run_id: run.run_id.clone(),
            started_at: run.started_at,
        };
        let handler = Arc::clone(&job.handler);
        let mut task = tokio::spawn(async move { handler.run(&ctx).await });

        match tokio::time::timeout(job.max_duration, &mut task).await {
            Ok(Ok(Ok(()))) => run.succeed(),
            Ok(Ok(Err(e))) => {
                error!(run_id = %run.run_id, "任务执行失败: {}", e);
                run.fail(e.to_string());
            }
            Ok(Err(join_error)) => {
                let reason = if join_error.is_panic() {
                    "handler panicked".to_string()
                } else {
                    format!("handler aborted: {join_error}")
                };
                error!(run_id = %run.run_id, "任务执行异常: {}", reason);
                run.fail(reason);
            }
            Err(_) => {
                task.abort();
                warn!(
                    run_id = %run.run_id,
                    "任务执行超时 ({}s)，已中止",
                    job.max_duration.as_secs()
                );
                run.fail(TIMEOUT_REASON);
            }
        }

        let elapsed = started.elapsed().as_secs_f64();
        self.save_run(&run).await;
        if lock_held {
            self.release_lock(&lock_key, &run.run_id).await;
        }
        self.metrics
            .record_job_run(job_name, run.status.as_label(), elapsed);
        self.metrics.job_finished();

        info!(
            run_id = %run.run_id,
            status = run.status.as_label(),
            duration_seconds = elapsed,
            "任务执行结束: {}",
            job_name
        );
        Ok(SubmitOutcome::Completed(run))
    }

    async fn save_run(&self, run: &JobRun) {
        if let Err(e) = self.runs.save(run).await {
            warn!(run_id = %run.run_id, "保存运行记录失败: {}", e);
            self.metrics.record_store_error("set");
        }
    }

    async fn release_lock(&self, key: &str, run_id: &str) {
        match self.store.delete_if_equals(key, run_id).await {
            Ok(true) => debug!("已释放任务锁 {}", key),
            Ok(false) => warn!("任务锁 {} 已过期或被其他实例持有", key),
            Err(e) => {
                warn!("释放任务锁失败: {}", e);
                self.metrics.record_store_error("delete_if_equals");
            }
        }
    }
}
