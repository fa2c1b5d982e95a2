use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use pipeline_alerting::{
    AlertRouter, ChannelSnapshot, HttpNotifier, LoggingNotifier, RetryPolicy, RuleSet,
};
use pipeline_api::AppState;
use pipeline_core::{AlertChannelSource, AppConfig, Notifier, StateKeys, StateStore};
use pipeline_dispatcher::{JobScheduler, SchedulerLoop, SharedScheduler};
use pipeline_infrastructure::{
    connect_pool, create_state_store, spawn_expiry_sweeper, JobRunStore, MetricsRegistry,
    SqliteAlertChannelSource, SqliteHealthEventSource,
};
use pipeline_worker::{
    default_owner, CleanupStaleDataJob, HandlerRegistry, JobExecutor, ProcessHealthDataJob,
    WorkerPool,
};

/// 主应用程序
///
/// 启动时一次性构建状态存储、指标注册表、调度器和告警路由，通过 `Arc` 共享，
/// 关闭时按订阅的信号逐一停止。
pub struct Application {
    config: AppConfig,
    store: Arc<dyn StateStore>,
    keys: StateKeys,
    metrics: Arc<MetricsRegistry>,
    scheduler: SharedScheduler,
    executor: Arc<JobExecutor>,
    job_runs: JobRunStore,
    channels: Arc<ChannelSnapshot>,
    channel_source: Arc<dyn AlertChannelSource>,
}

impl Application {
    /// 创建新的应用实例，任何配置错误都在这里失败
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("初始化应用程序");

        let store = create_state_store(&config.state_store)
            .await
            .with_context(|| format!("创建状态存储失败: {}", config.state_store.backend))?;
        let keys = StateKeys::new(config.state_store.key_prefix.clone());
        let metrics = Arc::new(MetricsRegistry::new().context("创建指标注册表失败")?);
        if let Err(e) = store.ping().await {
            warn!("状态存储暂不可达，降级运行直到恢复: {}", e);
            metrics.record_store_error("ping");
        }

        let pool = connect_pool(&config.database)
            .await
            .context("创建数据库连接池失败")?;
        let channel_source: Arc<dyn AlertChannelSource> =
            Arc::new(SqliteAlertChannelSource::new(pool.clone()));
        let event_source = Arc::new(SqliteHealthEventSource::new(pool));

        let channels = Arc::new(ChannelSnapshot::default());
        match channels.refresh(channel_source.as_ref()).await {
            Ok(count) => info!("已加载 {} 个告警通道", count),
            Err(e) => warn!("加载告警通道失败，等待下次刷新: {}", e),
        }

        let notifier: Arc<dyn Notifier> = match &config.alerting.endpoint {
            Some(endpoint) => Arc::new(
                HttpNotifier::new(
                    endpoint.clone(),
                    Duration::from_secs(config.alerting.request_timeout_seconds),
                )
                .context("创建告警通知客户端失败")?,
            ),
            None => {
                warn!("未配置消息服务地址，告警只写入日志");
                Arc::new(LoggingNotifier)
            }
        };
        let router = Arc::new(AlertRouter::new(
            Arc::clone(&store),
            notifier,
            Arc::clone(&metrics),
            Arc::new(RuleSet::new(config.alerting.rules.clone())),
            keys.clone(),
            RetryPolicy::from(&config.alerting),
        ));

        let mut handlers = HandlerRegistry::new();
        handlers.register(Arc::new(ProcessHealthDataJob::new(
            event_source.clone(),
            router,
            Arc::clone(&channels),
            Arc::clone(&store),
            keys.clone(),
            &config.processing,
        )))?;
        handlers.register(Arc::new(CleanupStaleDataJob::new(
            event_source,
            config.processing.retention_days,
        )))?;

        let scheduler = JobScheduler::from_config(&config.scheduler)
            .context("注册定时任务失败")?
            .into_shared();
        let job_runs = JobRunStore::new(
            Arc::clone(&store),
            keys.clone(),
            Duration::from_secs(config.executor.run_retention_seconds),
        );
        let executor = Arc::new(
            JobExecutor::new(
                &config.scheduler.jobs,
                &handlers,
                &config.executor,
                Arc::clone(&store),
                job_runs.clone(),
                keys.clone(),
                Arc::clone(&metrics),
                default_owner(),
            )
            .context("创建任务执行器失败")?,
        );
        info!("执行器标识: {}", executor.owner());

        Ok(Self {
            config,
            store,
            keys,
            metrics,
            scheduler,
            executor,
            job_runs,
            channels,
            channel_source,
        })
    }

    pub fn metrics(&self) -> Arc<MetricsRegistry> {
        Arc::clone(&self.metrics)
    }

    /// 运行所有组件直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("启动所有组件");
        let listener = if self.config.api.enabled {
            Some(
                TcpListener::bind(&self.config.api.bind_address)
                    .await
                    .with_context(|| format!("绑定地址失败: {}", self.config.api.bind_address))?,
            )
        } else {
            None
        };

        let mut handles: Vec<JoinHandle<()>> = Vec::new();

        let (queue_tx, queue_rx) = mpsc::channel(self.config.scheduler.queue_capacity);

        let timer = SchedulerLoop::new(
            Arc::clone(&self.scheduler),
            queue_tx,
            Arc::clone(&self.store),
            self.keys.clone(),
            Arc::clone(&self.metrics),
            Duration::from_millis(self.config.scheduler.tick_interval_ms),
        );
        timer.restore_history().await;
        handles.push(timer.spawn(shutdown_rx.resubscribe()));

        handles.extend(
            WorkerPool::new(
                Arc::clone(&self.executor),
                queue_rx,
                Arc::clone(&self.metrics),
                self.config.executor.worker_count,
            )
            .spawn(shutdown_rx.resubscribe()),
        );

        if self.config.state_store.backend == "memory" {
            handles.push(spawn_expiry_sweeper(
                Arc::clone(&self.store),
                Duration::from_secs(self.config.state_store.sweep_interval_seconds),
                shutdown_rx.resubscribe(),
            ));
        }

        handles.push(Arc::clone(&self.channels).spawn_refresher(
            Arc::clone(&self.channel_source),
            Duration::from_secs(self.config.alerting.refresh_interval_seconds),
            shutdown_rx.resubscribe(),
        ));

        if let Some(listener) = listener {
            let state = AppState {
                metrics: Arc::clone(&self.metrics),
                store: Arc::clone(&self.store),
                job_runs: self.job_runs.clone(),
                scheduler: Arc::clone(&self.scheduler),
            };
            let api_shutdown = shutdown_rx.resubscribe();
            handles.push(tokio::spawn(async move {
                if let Err(e) = pipeline_api::serve(listener, state, api_shutdown).await {
                    error!("API服务器运行失败: {}", e);
                }
            }));
        }

        let _ = shutdown_rx.recv().await;
        info!("收到关闭信号，等待组件停止");

        for handle in handles {
            if let Err(e) = handle.await {
                error!("组件退出异常: {}", e);
            }
        }

        info!("所有组件已停止");
        Ok(())
    }
}
