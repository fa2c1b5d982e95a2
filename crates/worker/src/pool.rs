use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

use pipeline_infrastructure::MetricsRegistry;

use crate::executor::{JobExecutor, SubmitOutcome};

/// 工作协程池
///
/// 所有 worker 共享同一个任务队列接收端。收到关闭信号后，
/// 正在执行的任务会先完成，worker 再退出。
pub struct WorkerPool {
    executor: Arc<JobExecutor>,
    queue: Arc<Mutex<mpsc::Receiver<String>>>,
    metrics: Arc<MetricsRegistry>,
    worker_count: usize,
}

impl WorkerPool {
    pub fn new(
        executor: Arc<JobExecutor>,
        queue: mpsc::Receiver<String>,
        metrics: Arc<MetricsRegistry>,
        worker_count: usize,
    ) -> Self {
        Self {
            executor,
            queue: Arc::new(Mutex::new(queue)),
            metrics,
            worker_count: worker_count.max(1),
        }
    }

    pub fn spawn(self, shutdown_rx: broadcast::Receiver<()>) -> Vec<JoinHandle<()>> {
        info!("启动 {} 个任务 worker", self.worker_count);
        (0..self.worker_count)
            .map(|worker_id| {
                let executor = Arc::clone(&self.executor);
                let queue = Arc::clone(&self.queue);
                let metrics = Arc::clone(&self.metrics);
                let shutdown_rx = shutdown_rx.resubscribe();
                tokio::spawn(run_worker(worker_id, executor, queue, metrics, shutdown_rx))
            })
            .collect()
    }
}

async fn run_worker(
    worker_id: usize,
    executor: Arc<JobExecutor>,
    queue: Arc<Mutex<mpsc::Receiver<String>>>,
    metrics: Arc<MetricsRegistry>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
                info!(worker_id, "收到关闭信号，worker 退出");
                break;
            }
            next = async { queue.lock().await.recv().await } => next,
        };

        let Some(job_name) = next else {
            info!(worker_id, "任务队列已关闭，worker 退出");
            break;
        };
        metrics.job_dequeued();

        match executor.submit(&job_name).await {
            Ok(SubmitOutcome::Completed(_)) | Ok(SubmitOutcome::AlreadyRunning) => {}
            Err(e) => error!(worker_id, "提交任务 {} 失败: {}", job_name, e),
        }
    }
}
