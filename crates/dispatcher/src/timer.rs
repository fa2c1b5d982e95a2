use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use pipeline_core::{StateKeys, StateStore};
use pipeline_infrastructure::MetricsRegistry;

use crate::scheduler::SharedScheduler;

/// 触发记录在状态存储中的保留时间
const LAST_FIRED_TTL: Duration = Duration::from_secs(30 * 24 * 3600);

/// 调度定时循环
///
/// 单独的 tokio 任务按固定节拍调用 [`JobScheduler::tick`](crate::JobScheduler::tick)，
/// 把到期任务名放入有界执行队列。队列已满时丢弃本次触发，不积压。
pub struct SchedulerLoop {
    scheduler: SharedScheduler,
    queue: mpsc::Sender<String>,
    store: Arc<dyn StateStore>,
    keys: StateKeys,
    metrics: Arc<MetricsRegistry>,
    tick_interval: Duration,
}

impl SchedulerLoop {
    pub fn new(
        scheduler: SharedScheduler,
        queue: mpsc::Sender<String>,
        store: Arc<dyn StateStore>,
        keys: StateKeys,
        metrics: Arc<MetricsRegistry>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            scheduler,
            queue,
            store,
            keys,
            metrics,
            tick_interval,
        }
    }

    /// 从状态存储恢复各任务的上次触发时间，返回恢复的任务数
    pub async fn restore_history(&self) -> usize {
        let names: Vec<String> = {
            let scheduler = self.scheduler.read().await;
            scheduler
                .jobs(Utc::now())
                .into_iter()
                .map(|job| job.definition.name)
                .collect()
        };

        let mut restored = 0;
        for name in names {
            let value = match self.store.get(&self.keys.last_fired(&name)).await {
                Ok(Some(value)) => value,
                Ok(None) => continue,
                Err(e) => {
                    warn!("读取任务 {} 的触发记录失败: {}", name, e);
                    self.metrics.record_store_error("get");
                    continue;
                }
            };
            let Ok(at) = DateTime::parse_from_rfc3339(&value) else {
                warn!("任务 {} 的触发记录格式无效: {}", name, value);
                continue;
            };

            let mut scheduler = self.scheduler.write().await;
            if scheduler
                .restore_last_fired(&name, at.with_timezone(&Utc))
                .is_ok()
            {
                restored += 1;
            }
        }

        if restored > 0 {
            info!("已恢复 {} 个任务的触发记录", restored);
        }
        restored
    }

    /// 执行一次调度，返回成功入队的任务名
    pub async fn tick_once(&self, now: DateTime<Utc>) -> Vec<String> {
        let due = self.scheduler.write().await.tick(now);
        let mut enqueued = Vec::with_capacity(due.len());

        for name in due {
            self.persist_last_fired(&name, now).await;

            match self.queue.try_send(name.clone()) {
                Ok(()) => {
                    self.metrics.job_enqueued();
                    debug!(job = %name, "任务已入队");
                    enqueued.push(name);
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(job = %name, "执行队列已满，丢弃本次触发");
                    self.metrics.record_submission_skipped(&name);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    error!(job = %name, "执行队列已关闭");
                }
            }
        }

        enqueued
    }

    async fn persist_last_fired(&self, name: &str, at: DateTime<Utc>) {
        if let Err(e) = self
            .store
            .set(&self.keys.last_fired(name), &at.to_rfc3339(), LAST_FIRED_TTL)
            .await
        {
            warn!("保存任务 {} 的触发记录失败: {}", name, e);
            self.metrics.record_store_error("set");
        }
    }

    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            "调度循环启动，节拍: {}ms",
            self.tick_interval.as_millis()
        );
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick_once(Utc::now()).await;
                }
                _ = shutdown_rx.recv() => {
                    info!("收到关闭信号，调度循环停止");
                    break;
                }
            }
        }
    }

    pub fn spawn(self, shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown_rx))
    }
}
