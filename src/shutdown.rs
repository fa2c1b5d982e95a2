use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 等待应用任务退出的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    Completed,
    /// 任务 panic 或被取消
    Failed,
    TimedOut,
}

/// 关闭信号广播
///
/// 调度循环、worker、通道刷新任务和 API 服务各自订阅一个接收端。
/// 发送端被取走即视为已经关闭。
#[derive(Clone)]
pub struct ShutdownManager {
    sender: Arc<Mutex<Option<broadcast::Sender<()>>>>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self {
            sender: Arc::new(Mutex::new(Some(tx))),
        }
    }

    pub async fn subscribe(&self) -> broadcast::Receiver<()> {
        match self.sender.lock().await.as_ref() {
            Some(tx) => tx.subscribe(),
            None => {
                // 关闭之后订阅的接收端立即收到信号
                let (tx, rx) = broadcast::channel(1);
                let _ = tx.send(());
                rx
            }
        }
    }

    /// 广播关闭信号，重复调用无效果
    pub async fn shutdown(&self) {
        let Some(tx) = self.sender.lock().await.take() else {
            debug!("重复的关闭请求，忽略");
            return;
        };
        info!("广播关闭信号，订阅者 {} 个", tx.receiver_count());
        let _ = tx.send(());
    }

    pub async fn is_shutdown(&self) -> bool {
        self.sender.lock().await.is_none()
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

/// 等待应用任务退出，超过 `grace` 后放弃等待
pub async fn drain(handle: JoinHandle<()>, grace: Duration) -> DrainOutcome {
    match tokio::time::timeout(grace, handle).await {
        Ok(Ok(())) => DrainOutcome::Completed,
        Ok(Err(e)) => {
            warn!("应用任务异常退出: {}", e);
            DrainOutcome::Failed
        }
        Err(_) => {
            warn!("等待应用退出超过 {:?}，放弃等待", grace);
            DrainOutcome::TimedOut
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_all_subscribers_receive_signal() {
        let manager = ShutdownManager::new();
        let mut timer_rx = manager.subscribe().await;
        let mut worker_rx = manager.clone().subscribe().await;

        manager.shutdown().await;

        assert!(timer_rx.recv().await.is_ok());
        assert!(worker_rx.recv().await.is_ok());
        assert!(manager.is_shutdown().await);
    }

    #[tokio::test]
    async fn test_subscribe_after_shutdown_fires_immediately() {
        let manager = ShutdownManager::default();
        manager.shutdown().await;
        manager.shutdown().await;

        let mut rx = manager.subscribe().await;
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_outcomes() {
        let done = tokio::spawn(async {});
        assert_eq!(drain(done, Duration::from_secs(1)).await, DrainOutcome::Completed);

        let panicked = tokio::spawn(async { panic!("worker crashed") });
        assert_eq!(drain(panicked, Duration::from_secs(1)).await, DrainOutcome::Failed);

        let stuck = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        assert_eq!(drain(stuck, Duration::from_secs(30)).await, DrainOutcome::TimedOut);
    }
}
