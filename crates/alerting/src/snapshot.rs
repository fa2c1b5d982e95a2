use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use pipeline_core::{AlertChannel, AlertChannelSource, PipelineResult};

/// 告警通道配置快照
///
/// 读取方拿到的是整份不可变快照，一次处理过程中不会看到中途更新。刷新失败时保留旧快照。
#[derive(Debug)]
pub struct ChannelSnapshot {
    current: RwLock<Arc<[AlertChannel]>>,
}

impl Default for ChannelSnapshot {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ChannelSnapshot {
    pub fn new(channels: Vec<AlertChannel>) -> Self {
        Self {
            current: RwLock::new(channels.into()),
        }
    }

    pub async fn current(&self) -> Arc<[AlertChannel]> {
        self.current.read().await.clone()
    }

    pub async fn replace(&self, channels: Vec<AlertChannel>) {
        *self.current.write().await = channels.into();
    }

    /// 从配置来源重新加载，返回通道数量
    pub async fn refresh(&self, source: &dyn AlertChannelSource) -> PipelineResult<usize> {
        let channels = source.load_channels().await?;
        let count = channels.len();
        self.replace(channels).await;
        debug!("告警通道快照已刷新，共 {} 个通道", count);
        Ok(count)
    }

    /// 启动后台刷新任务，收到关闭信号后退出
    pub fn spawn_refresher(
        self: Arc<Self>,
        source: Arc<dyn AlertChannelSource>,
        interval: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // 第一次 tick 立即返回，启动时已经加载过
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.refresh(source.as_ref()).await {
                            warn!("刷新告警通道配置失败，继续使用旧快照: {}", e);
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("告警通道刷新任务收到关闭信号");
                        break;
                    }
                }
            }
        })
    }
}
