//! 状态存储实现
//!
//! - [`RedisStateStore`]：多进程/多主机部署使用，基于 `SET NX PX` 与 Lua 比较删除
//! - [`InMemoryStateStore`]：单进程嵌入式部署与测试使用
//! - [`JobRunStore`]：在任意状态存储之上读写任务运行记录

pub mod job_runs;
pub mod memory;
pub mod redis_store;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use pipeline_core::{config::StateStoreConfig, PipelineError, PipelineResult, StateStore};

pub use job_runs::JobRunStore;
pub use memory::InMemoryStateStore;
pub use redis_store::RedisStateStore;

/// 根据配置创建状态存储
pub async fn create_state_store(config: &StateStoreConfig) -> PipelineResult<Arc<dyn StateStore>> {
    match config.backend.as_str() {
        "redis" => Ok(Arc::new(RedisStateStore::connect(config).await?)),
        "memory" => Ok(Arc::new(InMemoryStateStore::new())),
        other => Err(PipelineError::Configuration(format!(
            "不支持的状态存储类型: {other}"
        ))),
    }
}

/// 定期清理过期键，收到关闭信号后退出
pub fn spawn_expiry_sweeper(
    store: Arc<dyn StateStore>,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = store.purge_expired().await {
                        warn!("清理过期键失败: {}", e);
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("过期键清理任务收到关闭信号");
                    break;
                }
            }
        }
    })
}
