use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    models::{AlertChannel, HealthEvent},
    PipelineResult,
};

/// 告警通道配置来源
#[async_trait]
pub trait AlertChannelSource: Send + Sync {
    /// 按配置插入顺序返回全部通道
    async fn load_channels(&self) -> PipelineResult<Vec<AlertChannel>>;
}

/// 健康数据来源
#[async_trait]
pub trait HealthEventSource: Send + Sync {
    /// 返回 `id > after_id` 的事件，按 id 升序，最多 `limit` 条
    async fn fetch_after(&self, after_id: i64, limit: usize) -> PipelineResult<Vec<HealthEvent>>;

    /// 删除早于 `cutoff` 的事件，返回删除条数
    async fn prune_before(&self, cutoff: DateTime<Utc>) -> PipelineResult<u64>;
}
